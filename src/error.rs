//! Error type shared by every fallible operation in the crate.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Everything that can go wrong outside of a programming error.
///
/// Violations of invariants that the caller controls directly (for example a
/// tensor literal whose shape does not match its data) panic instead, the
/// same way indexing out of bounds does.
#[derive(Debug, Error)]
pub enum Error {
    /// Two shapes that must agree did not.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        /// The shape the operation required.
        expected: Vec<usize>,
        /// The shape it was given.
        found: Vec<usize>,
    },

    /// A gradient was written into a variable that does not track gradients.
    #[error("variable does not require gradients")]
    GradientNotTracked,

    /// A bounded history was requested with room for zero states.
    #[error("history capacity must be at least 1")]
    InvalidCapacity,

    /// A device name that is not `cpu`, `wgpu` or `cuda`.
    #[error("unknown device `{0}`")]
    UnknownDevice(String),

    /// The file does not start with the `bpat` magic.
    #[error("invalid magic header")]
    InvalidMagic,

    /// The `.bpat` header counts tensors in a single byte.
    #[error("cannot store {0} tensors in one file (limit is 255)")]
    TooManyTensors(usize),

    /// Decoded tensor data failed validation.
    #[error("corrupted tensor data")]
    Validation,

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
