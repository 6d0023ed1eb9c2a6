//! Error types and result definitions for the Granite storage engine.
//!
//! This crate provides a unified error type ([`Error`]) and result type alias
//! ([`Result<T>`]) used throughout the Granite crates. All operations that
//! could fail return `Result<T>`, where the error variant carries enough
//! detail to tell user mistakes apart from planner bugs.
//!
//! # Error Categories
//!
//! - **I/O errors** ([`Error::Io`]): disk and file access
//! - **Data format errors** ([`Error::Arrow`]): Arrow array and schema issues
//! - **User input errors** ([`Error::UnknownColumn`],
//!   [`Error::ArgumentOutOfBound`], [`Error::InvalidArgument`]): bad query
//!   parameters
//! - **Sampling errors** ([`Error::UnsupportedSamplingColumn`],
//!   [`Error::SamplingColumnNotInKey`]): table configuration incompatible
//!   with the requested sample
//! - **Internal errors** ([`Error::LogicalError`]): violated invariants;
//!   these indicate bugs, not recoverable conditions

pub mod error;
pub mod result;

pub use error::Error;
pub use result::Result;
