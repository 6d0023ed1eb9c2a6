use crate::error::Error;

/// Result alias used across the Granite crates.
pub type Result<T, E = Error> = std::result::Result<T, E>;
