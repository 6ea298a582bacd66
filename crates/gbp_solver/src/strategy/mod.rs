//! C4: the eight strategy drivers, one submodule per family.
//!
//! `single_chain` holds the six loose-variant (LGBP) strategies; `k_tree`
//! holds the strict-variant (RGBP) binary merge tree. The `hybrid`
//! combined-transform accounting lives in [`crate::estimator`] only, since it
//! is never exposed as a selectable end-user strategy.
pub mod k_tree;
pub mod single_chain;

pub use k_tree::KTree;
pub use single_chain::SingleChain;

use std::path::Path;

use crate::error::SolverError;
use crate::hash_oracle::HashOracle;
use crate::params::{Params, Variant};
use crate::validator::verify_results;

/// One of the six loose-variant strategies plus the strict k-Tree driver,
/// selectable by name from the CLI surface (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    PlainIv,
    PlainIp,
    IpPr,
    IpEm,
    IvIt,
    IvItStar,
    KTree,
}

impl Strategy {
    /// Which [`Variant`] this strategy targets; the CLI uses this to pick
    /// the oracle's list-indexing behavior without asking the caller twice.
    pub fn variant(self) -> Variant {
        match self {
            Strategy::KTree => Variant::Strict,
            _ => Variant::Loose,
        }
    }
}

/// Run `strategy` to completion against `params`/`oracle`, verify every
/// returned candidate's XOR invariant (§4.5 step 3), and return the solution
/// sets. `scratch_path` is only read for [`Strategy::IpEm`]. `seed` is
/// carried only to annotate a [`SolverError::VerificationFailure`] should the
/// merge kernel ever produce a candidate that fails verification — it is not
/// itself used to compute anything here.
pub fn solve(
    strategy: Strategy,
    params: &Params,
    oracle: &dyn HashOracle,
    scratch_path: Option<&Path>,
    seed: &[u8],
) -> Result<Vec<Vec<u32>>, SolverError> {
    let solutions = match strategy {
        Strategy::PlainIv => SingleChain::new(params, oracle).solve_plain_iv(),
        Strategy::PlainIp => SingleChain::new(params, oracle).solve_plain_ip(),
        Strategy::IpPr => SingleChain::new(params, oracle).solve_ip_pr(),
        Strategy::IvIt => SingleChain::new(params, oracle).solve_iv_it(),
        Strategy::IvItStar => SingleChain::new(params, oracle).solve_iv_it_star(),
        Strategy::IpEm => {
            let path = scratch_path.ok_or_else(|| SolverError::ExternalMemoryIo {
                path: std::path::PathBuf::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "ip_em requires a scratch path"),
            })?;
            SingleChain::new(params, oracle).solve_ip_em(path)?
        }
        Strategy::KTree => KTree::new(params, oracle).solve(),
    };

    if let Err(pos) = verify_results(oracle, strategy.variant(), &solutions) {
        return Err(SolverError::VerificationFailure {
            seed: seed_array(seed),
            layer_sizes: solutions.iter().map(|s| s.len()).collect(),
            detail: format!("solution at position {pos} does not XOR to zero"),
        });
    }
    Ok(solutions)
}

fn seed_array(seed: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    let n = seed.len().min(16);
    out[..n].copy_from_slice(&seed[..n]);
    out
}
