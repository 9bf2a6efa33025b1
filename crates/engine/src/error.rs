//! Engine Error Types
//!
//! Adapter failures are split in two: `Contract` (the adapter cannot do what
//! was asked, never retried) and `Adapter` (the site misbehaved this time).

use derive_more::{Display, Error};
use exn::ResultExt;

/// An engine error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("adapter '{_0}' failed")]
    Adapter(#[error(not(source))] String),
    #[display("adapter contract violated")]
    Contract,
    #[display("adapter '{_0}' is not loaded")]
    AdapterNotLoaded(#[error(not(source))] String),
    #[display("invalid book url {_0}")]
    InvalidUrl(#[error(not(source))] String),
    #[display("storage error")]
    Store,
    #[display("export error")]
    Export,
    #[display("could not start the engine")]
    Setup,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Adapter(_))
    }
}

/// Wrap an adapter failure, keeping contract violations recognisable.
pub(crate) fn from_adapter<T>(result: tome_adapter::error::Result<T>, adapter: &str) -> Result<T> {
    let kind = match &result {
        Err(err) if err.is_contract_violation() => ErrorKind::Contract,
        _ => ErrorKind::Adapter(adapter.to_string()),
    };
    result.or_raise(|| kind)
}
