//! Fetch Error Types
//!
//! Transient transport failures never leave this crate: they are retried.
//! What callers see is either a definitive answer from the server
//! ([`ErrorKind::Status`]) or the end of the retry budget
//! ([`ErrorKind::MaxRetriesExceeded`]).

use crate::Method;
use derive_more::{Display, Error};

/// A fetch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Every attempt failed with a transport error or a server error.
    #[display("{method} {url} failed after {attempts} attempts")]
    MaxRetriesExceeded {
        method: Method,
        url: String,
        params: Vec<(String, String)>,
        headers: Vec<(String, String)>,
        attempts: u32,
    },
    /// The server answered with a status that retrying will not change.
    #[display("{url} answered with status {status}")]
    Status { status: u16, url: String },
    /// The HTTP client could not be constructed.
    #[display("could not build HTTP client")]
    Client,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            // The whole budget was spent, but the remote might recover later.
            Self::MaxRetriesExceeded { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status == 408,
            Self::Client => false,
        }
    }
}
