//! Configuration Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Sources could not be read or merged (unreadable file, bad TOML, wrong types).
    #[display("could not load configuration")]
    Load,
    /// Configuration loaded but a value is out of range.
    #[display("invalid configuration value for '{_0}'")]
    Invalid(#[error(not(source))] &'static str),
    /// Dotted key does not address anything in the configuration.
    #[display("unknown setting: {_0}")]
    UnknownKey(#[error(not(source))] String),
    /// Value does not fit the setting it was assigned to.
    #[display("value does not fit setting: {_0}")]
    InvalidValue(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
