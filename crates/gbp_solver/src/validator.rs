//! C5: classify raw merge-tree output into perfect/secondary/trivial
//! solutions, deduplicate, and verify the XOR invariant.
//!
//! Ported from `single_chain_algorithm.py`'s `_check_valid_index_vector`,
//! `check_index_vectors`, and `verify_results`.
use std::collections::BTreeSet;

use crate::bigint::Uint256;
use crate::hash_oracle::HashOracle;
use crate::params::Variant;

/// Outcome of classifying one candidate index vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// All `2^k` leaf indices are distinct.
    Perfect(Vec<u32>),
    /// Indices cancel in pairs down to a smaller, still-valid solution for
    /// LGBP(n, k'), k' < k. Carries the mod-2-reduced surviving index set.
    Secondary(Vec<u32>),
    /// Every index cancels; not a solution at all.
    Trivial,
}

/// Classify one raw index vector (§9 "secondary-solution policy": dedupe by
/// the mod-2-reduced multiplicity set, uniform across IV and IP strategies).
pub fn classify(index_vector: &[u32]) -> Classification {
    let distinct: BTreeSet<u32> = index_vector.iter().copied().collect();
    if distinct.len() == index_vector.len() {
        return Classification::Perfect(index_vector.to_vec());
    }
    let mut parity: std::collections::HashMap<u32, u8> = std::collections::HashMap::new();
    for &idx in index_vector {
        let e = parity.entry(idx).or_insert(0);
        *e = (*e + 1) % 2;
    }
    let surviving: Vec<u32> = parity
        .into_iter()
        .filter(|&(_, v)| v == 1)
        .map(|(idx, _)| idx)
        .collect();
    if surviving.is_empty() {
        Classification::Trivial
    } else {
        Classification::Secondary(surviving)
    }
}

/// Classify every candidate and deduplicate by mod-2-reduced index set,
/// dropping trivial solutions. Preserves first-seen order, matching the
/// reference's `if set(real_tuple) not in sols: sols.append(...)`.
pub fn check_index_vectors(candidates: &[Vec<u32>]) -> Vec<Vec<u32>> {
    let mut sols: Vec<BTreeSet<u32>> = Vec::new();
    for candidate in candidates {
        match classify(candidate) {
            Classification::Trivial => {}
            Classification::Perfect(v) | Classification::Secondary(v) => {
                let set: BTreeSet<u32> = v.into_iter().collect();
                if !sols.contains(&set) {
                    sols.push(set);
                }
            }
        }
    }
    sols.into_iter().map(|s| s.into_iter().collect()).collect()
}

/// Verify that the XOR of the hash values named by every index in every
/// solution is exactly zero. A failure here means the merge kernel has a
/// bug, not that the input had no solution.
///
/// For [`Variant::Loose`] every index names a position in the single shared
/// list (`list_id` is always 0); for [`Variant::Strict`] the `i`-th index in
/// a solution names a position in the `i`-th of `K` distinct lists.
pub fn verify_results(oracle: &dyn HashOracle, variant: Variant, solutions: &[Vec<u32>]) -> Result<(), usize> {
    for (pos, indices) in solutions.iter().enumerate() {
        let mut acc = Uint256::ZERO;
        for (list_id, &idx) in indices.iter().enumerate() {
            let list_id = if variant == Variant::Strict { list_id as u32 } else { 0 };
            acc = acc.xor(oracle.compute(list_id, idx as u64));
        }
        if !acc.is_zero() {
            return Err(pos);
        }
    }
    Ok(())
}
