//! Adapter Error Types
//!
//! Two families live here. Contract violations (`NotImplemented`,
//! `InvalidToken`, `UnknownAdapter`, `Unclaimed`) mean the caller used an
//! adapter wrongly and must never be retried. Everything else describes a
//! page that could not be fetched or understood this time.

use derive_more::{Display, Error};

/// An adapter error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("adapter '{adapter}' does not implement {capability}")]
    NotImplemented { capability: &'static str, adapter: String },
    /// A token was handed to an adapter that did not produce it.
    #[display("adapter '{adapter}' received a token it did not create")]
    InvalidToken { adapter: String },
    #[display("no adapter named '{_0}'")]
    UnknownAdapter(#[error(not(source))] String),
    #[display("no loaded adapter claims {_0}")]
    Unclaimed(#[error(not(source))] String),
    /// The adapter factory failed.
    #[display("could not load adapter '{_0}'")]
    Load(#[error(not(source))] String),
    #[display("could not fetch {_0}")]
    Fetch(#[error(not(source))] String),
    /// The page was fetched but does not look the way the adapter expects.
    #[display("missing {field} on {url}")]
    MissingField { field: &'static str, url: String },
    #[display("invalid locator {_0}")]
    InvalidLocator(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            // Truncated or rate-limited pages often parse fine the next time.
            Self::Fetch(_) | Self::MissingField { .. } => true,
            _ => false,
        }
    }

    /// Misuse of the adapter contract rather than a failure of the site.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::NotImplemented { .. } | Self::InvalidToken { .. } | Self::UnknownAdapter(_) | Self::Unclaimed(_)
        )
    }
}
