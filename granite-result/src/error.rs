use std::{fmt, io};
use thiserror::Error;

/// Unified error type for all Granite operations.
///
/// Errors propagate upward through the call stack with `?`. At API
/// boundaries they are formatted for the user; internal code matches on
/// specific variants when it needs fine-grained handling.
///
/// `Error` is `Send + Sync`, so failures can cross thread boundaries when
/// worker streams are driven concurrently.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file or disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Arrow library error during columnar data operations.
    ///
    /// Raised while slicing, filtering, or concatenating record batches, or
    /// when a projection does not match the schema of a block.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A numeric query parameter is outside its legal domain.
    ///
    /// The canonical case is a non-positive sample size.
    #[error("argument out of bound: {0}")]
    ArgumentOutOfBound(String),

    /// The table's sampling column is not an unsigned 8/16/32/64-bit
    /// integer, so no deterministic value limit can be derived for it.
    #[error("unsupported sampling column: {0}")]
    UnsupportedSamplingColumn(String),

    /// Sampling was requested but the sampling column is not part of the
    /// primary key, so the index cannot be consulted for it.
    #[error("sampling column not in primary key: {0}")]
    SamplingColumnNotInKey(String),

    /// A requested projection column does not exist in the table schema.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// Malformed input that is not covered by a more specific variant:
    /// an empty projection, a zero worker count, a sparse index whose
    /// length is not a multiple of the key size.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Violated internal invariant.
    ///
    /// This should never occur during normal operation; it indicates a bug
    /// in the planner (for example parts left over after work distribution)
    /// and is not user-recoverable.
    #[error("logical error: {0}")]
    LogicalError(String),
}

impl Error {
    /// Create a [`Error::LogicalError`] from any displayable value.
    #[inline]
    pub fn logical<E: fmt::Display>(err: E) -> Self {
        Error::LogicalError(err.to_string())
    }

    /// Create a [`Error::InvalidArgument`] from any displayable value.
    #[inline]
    pub fn invalid_argument<E: fmt::Display>(err: E) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}
