//! C3: the bucketed self-join merge kernel, and its two edge-case policies.
//!
//! Ported from `single_chain_algorithm.py`'s `hash_merge_index_vector` /
//! `hash_merge_index_pointer` / `hash_merge_pure_vals` / `hash_merge_pure_ips`
//! / `hash_merge_external_ip`, and `k_tree_algorithm.py`'s `hash_merge`.
//!
//! Every variant buckets entries by their low `collide_bits` bits in a hash
//! table keyed on those bits; each incoming entry is matched against every
//! prior entry already in its bucket, then joins the bucket itself so later
//! entries can still collide with it (§4.3 "Algorithm").
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

use crate::bigint::Uint256;
use crate::bitpack::PackedIndices;
use crate::tag::{Entry, Tag};

/// A set of trimmed, per-layer index vectors accepted in constraint mode (E3).
pub type CheckTable = HashSet<Vec<u32>>;

/// Mask every index in `packed` to its low `t` bits.
pub fn trim_indices(packed: &PackedIndices, t: u32) -> Vec<u32> {
    let mask: u32 = if t >= 32 { u32::MAX } else { (1u32 << t) - 1 };
    packed.iter().map(|v| v & mask).collect()
}

fn low_key(value: Uint256, collide_bits: u32) -> Vec<u8> {
    value.low_mask(collide_bits).to_be_bytes_trunc(collide_bits)
}

/// Merge a list of index-vector-tagged entries, colliding `collide_bits` bits.
///
/// `final_layer` selects E2 (keep zero-XOR, detect triple collisions) instead
/// of E1 (drop zero-XOR outright); pass `true` only for the final 2ℓ-bit
/// self-merge. `check_table`, if present, runs constraint mode (E3): a
/// candidate is kept only if its trimmed tag (to `index_bit` bits) is a
/// member of the layer's check table.
pub fn merge_index_vector(
    list: &[Entry],
    collide_bits: u32,
    final_layer: bool,
    index_bit: Option<u32>,
    check_table: Option<&CheckTable>,
) -> Vec<Entry> {
    tracing::debug!(
        input_len = list.len(),
        collide_bits,
        final_layer,
        constrained = check_table.is_some(),
        "merging index-vector layer"
    );
    let discard_zero = !final_layer;
    let mut buckets: HashMap<Vec<u8>, Vec<(Uint256, PackedIndices)>> = HashMap::new();
    let mut merged: Vec<(Uint256, PackedIndices)> = Vec::new();

    for entry in list {
        let iv = entry
            .tag
            .as_index_vector()
            .expect("merge_index_vector requires IndexVector tags")
            .clone();
        let high = entry.value.shr(collide_bits);
        let bucket = buckets.entry(low_key(entry.value, collide_bits)).or_default();

        if discard_zero {
            // E1: drop the candidate and do not retain it either.
            if bucket.iter().any(|(h, _)| h.xor(high).is_zero()) {
                continue;
            }
        } else if bucket.len() > 1 {
            // E2: a third bucket arrival. Un-emit the pair from entries 0/1 of
            // this bucket if (and only if) it was actually emitted earlier.
            let (h_first, idx_first) = &bucket[0];
            let (h_second, idx_second) = &bucket[1];
            let canon = Tag::concat_index_vectors(idx_second, idx_first);
            let canon_key = match index_bit {
                Some(t) => trim_indices(&canon, t),
                None => canon.to_vec(),
            };
            let hit = merged.iter().position(|(_, tag)| {
                let cmp = match index_bit {
                    Some(t) => trim_indices(tag, t),
                    None => tag.to_vec(),
                };
                cmp == canon_key
            });
            if let Some(pos) = hit {
                debug_assert!(h_first.xor(*h_second).is_zero());
                merged.remove(pos);
            }
            continue;
        }

        for (h2, idx2) in bucket.iter() {
            let xor = h2.xor(high);
            // E4: retaining new into a bucket that already had prior entries
            // orders the tag as new (tag1) then prior (tag2).
            let merged_tag = Tag::concat_index_vectors(&iv, idx2);
            match check_table {
                None => merged.push((xor, merged_tag)),
                Some(table) => {
                    let t = index_bit.expect("check_table requires index_bit");
                    if table.contains(&trim_indices(&merged_tag, t)) {
                        merged.push((xor, merged_tag));
                    }
                }
            }
        }
        bucket.push((high, iv));
    }

    let out: Vec<Entry> = merged
        .into_iter()
        .map(|(value, tag)| Entry {
            value,
            tag: Tag::IndexVector(tag),
        })
        .collect();
    tracing::debug!(output_len = out.len(), "index-vector layer merged");
    out
}

/// Merge a list of plain hash values, tagging each merged entry with a
/// pointer `(left, right)` back into positions of `values`.
///
/// `left` is always the incoming entry's position, `right` the position of
/// the prior bucket entry it collided with (matches the reference's
/// `merged_index.append((i, j))`).
pub fn merge_index_pointer(
    values: &[Uint256],
    collide_bits: u32,
    final_layer: bool,
) -> (Vec<Uint256>, Vec<(u32, u32)>) {
    tracing::debug!(input_len = values.len(), collide_bits, final_layer, "merging index-pointer layer");
    let discard_zero = !final_layer;
    let mut buckets: HashMap<Vec<u8>, Vec<(Uint256, u32)>> = HashMap::new();
    let mut merged_values = Vec::new();
    let mut merged_index: Vec<(u32, u32)> = Vec::new();

    for (i, &x1) in values.iter().enumerate() {
        let i = i as u32;
        let high = x1.shr(collide_bits);
        let bucket = buckets.entry(low_key(x1, collide_bits)).or_default();

        if discard_zero {
            if bucket.iter().any(|(h, _)| h.xor(high).is_zero()) {
                continue;
            }
        } else if bucket.len() > 1 {
            let (h_first, idx_first) = bucket[0];
            let (h_second, idx_second) = bucket[1];
            let canon = (idx_second, idx_first);
            if let Some(pos) = merged_index.iter().position(|p| *p == canon) {
                debug_assert!(h_first.xor(h_second).is_zero());
                merged_values.remove(pos);
                merged_index.remove(pos);
            }
            continue;
        }

        for &(h2, j) in bucket.iter() {
            merged_values.push(h2.xor(high));
            merged_index.push((i, j));
        }
        bucket.push((high, i));
    }

    (merged_values, merged_index)
}

/// Merge plain hash values with no tag at all (XOR-removal layers). Never
/// called for the final 2ℓ-bit self-merge: at that point a trivial
/// collision must be detected, not silently discarded.
pub fn merge_untagged(values: &[Uint256], collide_bits: u32) -> Vec<Uint256> {
    let mut buckets: HashMap<Vec<u8>, Vec<Uint256>> = HashMap::new();
    let mut merged = Vec::new();
    for &x1 in values {
        let high = x1.shr(collide_bits);
        let bucket = buckets.entry(low_key(x1, collide_bits)).or_default();
        if bucket.iter().any(|h| h.xor(high).is_zero()) {
            continue;
        }
        for &h2 in bucket.iter() {
            merged.push(h2.xor(high));
        }
        bucket.push(high);
    }
    merged
}

/// As [`merge_index_pointer`], but serializes every `(left, right)` pair to
/// `writer` as it is produced instead of keeping it in memory (IP-EM).
/// Never called for the final self-merge, matching the reference's assert.
pub fn merge_external_ip<W: Write>(
    values: &[Uint256],
    collide_bits: u32,
    record_width_bytes: usize,
    writer: &mut W,
) -> io::Result<Vec<Uint256>> {
    tracing::debug!(input_len = values.len(), collide_bits, "streaming external-memory layer");
    let mut buckets: HashMap<Vec<u8>, Vec<(Uint256, u32)>> = HashMap::new();
    let mut merged = Vec::new();
    for (i, &x1) in values.iter().enumerate() {
        let i = i as u32;
        let high = x1.shr(collide_bits);
        let bucket = buckets.entry(low_key(x1, collide_bits)).or_default();
        if bucket.iter().any(|(h, _)| h.xor(high).is_zero()) {
            continue;
        }
        for &(h2, j) in bucket.iter() {
            merged.push(h2.xor(high));
            write_record(writer, i, j, record_width_bytes)?;
        }
        bucket.push((high, i));
    }
    Ok(merged)
}

fn write_record<W: Write>(w: &mut W, left: u32, right: u32, width: usize) -> io::Result<()> {
    w.write_all(&left.to_be_bytes()[4 - width..])?;
    w.write_all(&right.to_be_bytes()[4 - width..])?;
    Ok(())
}

/// Binary hash-join merge used by the strict k-Tree driver: two distinct
/// lists, each entry tagged with its accumulated leaf index vector.
pub fn merge_two_lists(
    left: &[Entry],
    right: &[Entry],
    collide_bits: u32,
) -> Vec<Entry> {
    tracing::debug!(left_len = left.len(), right_len = right.len(), collide_bits, "merging two k-tree lists");
    let mut by_key: HashMap<Vec<u8>, Vec<(Uint256, &PackedIndices)>> = HashMap::new();
    for entry in left {
        let iv = entry
            .tag
            .as_index_vector()
            .expect("merge_two_lists requires IndexVector tags");
        by_key
            .entry(low_key(entry.value, collide_bits))
            .or_default()
            .push((entry.value.shr(collide_bits), iv));
    }

    let mut merged = Vec::new();
    for entry in right {
        let key = low_key(entry.value, collide_bits);
        if let Some(colls) = by_key.get(&key) {
            let iv_right = entry
                .tag
                .as_index_vector()
                .expect("merge_two_lists requires IndexVector tags");
            let high_right = entry.value.shr(collide_bits);
            for (high_left, iv_left) in colls {
                merged.push(Entry {
                    value: high_left.xor(high_right),
                    tag: Tag::IndexVector(Tag::concat_index_vectors(iv_left, iv_right)),
                });
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitpack::PackedIndices;

    fn iv_entry(value: u64, width: u32, idx: u32) -> Entry {
        Entry {
            value: Uint256::from_be_bytes(&value.to_be_bytes()),
            tag: Tag::IndexVector(PackedIndices::from_indices(width, [idx])),
        }
    }

    #[test]
    fn merges_two_entries_that_collide() {
        // low 8 bits equal (0x00), high bits 0x01 vs 0x02 -> xor 0x03
        let list = vec![iv_entry(0x0100, 8, 0), iv_entry(0x0200, 8, 1)];
        let out = merge_index_vector(&list, 8, false, None, None);
        assert_eq!(out.len(), 1);
        assert!(!out[0].value.is_zero());
        assert_eq!(out[0].tag.as_index_vector().unwrap().to_vec(), vec![1, 0]);
    }

    #[test]
    fn e1_drops_zero_xor_pre_final() {
        let list = vec![iv_entry(0x0100, 8, 0), iv_entry(0x0100, 8, 1)];
        let out = merge_index_vector(&list, 8, false, None, None);
        assert!(out.is_empty());
    }

    #[test]
    fn e2_keeps_zero_xor_at_final_layer() {
        let list = vec![iv_entry(0x0100, 8, 0), iv_entry(0x0100, 8, 1)];
        let out = merge_index_vector(&list, 8, true, None, None);
        assert_eq!(out.len(), 1);
        assert!(out[0].value.is_zero());
    }

    #[test]
    fn e2_un_emits_trivial_pair_on_third_collision() {
        let list = vec![
            iv_entry(0x0100, 8, 0),
            iv_entry(0x0100, 8, 1),
            iv_entry(0x0100, 8, 2),
        ];
        let out = merge_index_vector(&list, 8, true, None, None);
        assert!(out.is_empty());
    }

    #[test]
    fn constraint_mode_filters_by_check_table() {
        let list = vec![iv_entry(0x0100, 8, 0), iv_entry(0x0200, 8, 1)];
        let mut table = CheckTable::new();
        table.insert(vec![1, 0]);
        let out = merge_index_vector(&list, 8, false, Some(1), Some(&table));
        assert_eq!(out.len(), 1);

        let mut empty_table = CheckTable::new();
        empty_table.insert(vec![9, 9]);
        let out_empty = merge_index_vector(&list, 8, false, Some(1), Some(&empty_table));
        assert!(out_empty.is_empty());
    }

    #[test]
    fn index_pointer_merge_produces_positional_pairs() {
        let values = vec![
            Uint256::from_be_bytes(&0x0100u64.to_be_bytes()),
            Uint256::from_be_bytes(&0x0200u64.to_be_bytes()),
        ];
        let (merged, idx) = merge_index_pointer(&values, 8, false);
        assert_eq!(merged.len(), 1);
        assert_eq!(idx, vec![(1, 0)]);
    }
}
