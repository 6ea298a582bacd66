//! The per-layer tag shape (§3 "Tag", §9 "Dynamic tags").
//!
//! Every entry in a given layer carries the *same* tag shape — chosen once
//! per strategy/layer. Only the index-vector shape needs a `Tag` wrapper:
//! it is the one shape `merge` manipulates generically across strategies.
//! The index-pointer and untagged shapes are simple enough that their
//! strategies carry them directly (`Vec<(u32, u32)>`, `Vec<Uint256>`)
//! instead of paying for a variant nothing else would construct.
use crate::bigint::Uint256;
use crate::bitpack::PackedIndices;

/// One list entry: the remaining hash bits plus its tag.
#[derive(Clone, Debug)]
pub struct Entry {
    pub value: Uint256,
    pub tag: Tag,
}

/// The tag shape for one layer's list.
///
/// Only the index-vector shape is represented here: the index-pointer
/// strategies (`plain_ip`, `ip_pr`, `ip_em`) track `(left, right)` pairs in a
/// parallel `Vec<(u32, u32)>` alongside the untagged hash values instead of
/// wrapping them in this enum, and XOR-removal layers carry plain `Uint256`
/// lists with no tag at all.
#[derive(Clone, Debug)]
pub enum Tag {
    /// Full or trimmed sequence of leaf indices (IV).
    IndexVector(PackedIndices),
}

impl Tag {
    /// Concatenate two index-vector tags, `first` then `second` — the
    /// canonical orientation used when retaining a newly merged entry (E4).
    pub fn concat_index_vectors(first: &PackedIndices, second: &PackedIndices) -> PackedIndices {
        let mut out = PackedIndices::new(first.width());
        out.extend(first);
        out.extend(second);
        out
    }

    pub fn as_index_vector(&self) -> Option<&PackedIndices> {
        match self {
            Tag::IndexVector(v) => Some(v),
        }
    }
}

pub type List = Vec<Entry>;
