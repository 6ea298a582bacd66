//! Error kinds for the solver, one variant per failure mode in the design's
//! error-handling table. Manual `Display`/`std::error::Error` impls, matching
//! the style used throughout this workspace's library crates.
use core::fmt;
use std::path::PathBuf;

/// Why `Params::new` or a strategy invocation refused to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// `n` is not a multiple of 8.
    NNotByteAligned { n: u32 },
    /// `k` is not `>= 2` or not representable as `log2(K)`.
    InvalidK { k: u32 },
    /// `(k + 1)` does not divide `n`.
    NotDivisible { n: u32, k: u32 },
    /// `k` exceeds the single-chain correctness bound `floor(sqrt(n/2 + 1))`
    /// and the loose variant was requested.
    AboveSingleChainBound { k: u32, bound: u32 },
    /// A requested trimmed length is outside `1..=ell`.
    InvalidTrimLength { t: u32, ell: u32 },
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::NNotByteAligned { n } => write!(f, "n = {n} is not a multiple of 8"),
            ParamError::InvalidK { k } => write!(f, "k = {k} must be >= 2"),
            ParamError::NotDivisible { n, k } => {
                write!(f, "(k+1) = {} does not divide n = {n}", k + 1)
            }
            ParamError::AboveSingleChainBound { k, bound } => write!(
                f,
                "k = {k} exceeds the single-chain correctness bound {bound}"
            ),
            ParamError::InvalidTrimLength { t, ell } => {
                write!(f, "trimmed length t = {t} is outside 1..={ell}")
            }
        }
    }
}

impl std::error::Error for ParamError {}

/// Failure surfaced while running a strategy or validating its output.
#[derive(Debug)]
pub enum SolverError {
    /// Parameter validation failed before any allocation (§7: "Fail early in C1").
    Params(ParamError),
    /// A returned candidate failed XOR verification: a kernel bug, not a
    /// property of the input, so it is surfaced with enough context to debug.
    VerificationFailure {
        seed: [u8; 16],
        layer_sizes: Vec<usize>,
        detail: String,
    },
    /// The IP-EM scratch file could not be written or read.
    ExternalMemoryIo { path: PathBuf, source: std::io::Error },
    /// A layer allocation failed (or would exceed the caller-specified memory
    /// budget, when one is checked).
    ResourceExhausted { layer: usize, requested_bits: u128 },
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::Params(e) => write!(f, "invalid parameters: {e}"),
            SolverError::VerificationFailure {
                seed,
                layer_sizes,
                detail,
            } => write!(
                f,
                "solution failed XOR verification (seed={}, layer_sizes={layer_sizes:?}): {detail}",
                hex_encode(seed)
            ),
            SolverError::ExternalMemoryIo { path, source } => {
                write!(f, "external-memory I/O failed at {}: {source}", path.display())
            }
            SolverError::ResourceExhausted {
                layer,
                requested_bits,
            } => write!(
                f,
                "allocation of layer {layer} failed (requested {requested_bits} bits)"
            ),
        }
    }
}

impl std::error::Error for SolverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SolverError::ExternalMemoryIo { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ParamError> for SolverError {
    fn from(e: ParamError) -> Self {
        SolverError::Params(e)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
