//! Wagner's algorithm for the Generalized Birthday Problem.
//!
//! Given a hash oracle with `n`-bit outputs and an exponent `k`, find `2^k`
//! inputs whose outputs XOR to zero, with partial-collision structure
//! enforced at every merge level (Equihash's proof-of-work construction).
//! Two variants are supported: the strict k-Tree (`K = 2^k` distinct input
//! lists) and the loose single-chain (one shared list, trivial repeats
//! rejected).
//!
//! ```no_run
//! use gbp_solver::{HashOracle, Params, PlainOracle, Strategy, Variant, solve};
//!
//! let params = Params::new(96, 3, Variant::Loose).unwrap();
//! let oracle = PlainOracle::new(&params, b"0123456789abcdef", Variant::Loose);
//! let solutions = solve(Strategy::PlainIv, &params, &oracle, None, b"0123456789abcdef").unwrap();
//! ```
pub mod bigint;
pub mod bitpack;
pub mod error;
pub mod estimator;
pub mod hash_oracle;
pub mod merge;
pub mod params;
pub mod strategy;
pub mod tag;
pub mod validator;

pub use error::{ParamError, SolverError};
pub use estimator::{Cost, Estimator, Plan};
pub use hash_oracle::{HashOracle, PlainOracle, ZcashOracle};
pub use params::{Params, Variant};
pub use strategy::{solve, Strategy};
pub use validator::{check_index_vectors, classify, verify_results, Classification};

/// The outcome of a full solve: every deduplicated, XOR-verified solution
/// found, alongside the plan the caller (or the estimator) chose to run it
/// with. "No solution found" is `Ok` with an empty `solutions`, never an
/// `Err` — only parameter and I/O failures are errors (§7 of the design).
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub solutions: Vec<Vec<u32>>,
    pub plan: Option<Plan>,
}
