//! Error taxonomy shared by every public operation of the codec.
//!
//! All failures are synchronous return values; the codec never panics on bad
//! input and never logs. On any surfaced error the caller's output buffers
//! are left untouched.

/// The `Error` enum defines the possible errors that this crate can occur.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// DivByZero: a Galois-field division or inverse was requested with a
    /// zero divisor. Recovered locally during matrix inversion (treated as
    /// singular) and never surfaces from the codec paths.
    #[error("division by zero in GF(16)")]
    DivByZero,
    /// Singular: the matrix has no inverse over GF(16). Surfaces only while
    /// building the erasure-pattern table, where it marks the entry invalid.
    #[error("matrix is singular over GF(16)")]
    Singular,
    /// TooManyErasures: the number of erased positions is larger than the
    /// maximum allowed, and the lost data cannot be recovered.
    #[error("too many erased positions: {0} erased, up to {1} allowed")]
    TooManyErasures(usize, usize),
    /// PatternMissing: the erasure-pattern table has no valid entry for the
    /// requested erasure set.
    #[error("erasure pattern not present in the pattern table")]
    PatternMissing,
    /// BadLength: a buffer or count does not match the contract.
    #[error("bad length: {0}")]
    BadLength(String),
    /// OutOfRange: an index or symbol is outside its valid range.
    #[error("out of range: {0}")]
    OutOfRange(String),
}

impl Error {
    pub(crate) fn too_many_erasures(erasures: usize, max_erasures: usize) -> Self {
        Self::TooManyErasures(erasures, max_erasures)
    }

    pub(crate) fn bad_length(msg: impl Into<String>) -> Self {
        Self::BadLength(msg.into())
    }

    pub(crate) fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
