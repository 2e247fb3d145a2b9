//! Error types for the filter crate.

use thiserror::Error;

/// Errors raised while building or decoding a filter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Constructor arguments out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Serialized filter could not be decoded.
    #[error("corrupt filter data: {0}")]
    CorruptData(String),
}

/// Result type for filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;
