//! Model Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction, the same shape as every other crate in the workspace.

use derive_more::{Display, Error};

/// A model error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The locator cannot be reduced to a host and path.
    #[display("invalid source locator: {_0}")]
    InvalidSource(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // A locator is either parseable or it isn't.
        false
    }
}
