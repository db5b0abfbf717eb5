//! Query engine errors.

use thiserror::Error;

/// Errors raised while validating or executing a list query.
///
/// The whole request is rejected on the first error; nothing is partially
/// applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// Bad paging or sort-order parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed payload, unknown field or operator, or a value that does
    /// not coerce to the field's type.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid sort field: {0}")]
    InvalidSortField(String),

    /// The backing store failed. Never retried at this layer.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
}
