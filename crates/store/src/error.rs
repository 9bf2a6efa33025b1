//! Store Error Types
//!
//! Consistency failures (`BookNotFound`, `ChapterNotFound`, `Constraint`,
//! `UnsupportedFilter`) are typed so callers can react to them. Everything
//! else the database reports collapses into `Database`.

use derive_more::{Display, Error};
use tome_model::BookId;

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    #[display("book {_0} not found")]
    BookNotFound(#[error(not(source))] BookId),
    #[display("chapter {index} of book {book} not found")]
    ChapterNotFound { book: BookId, index: u32 },
    /// A uniqueness or foreign key rule was violated.
    #[display("constraint violated: {_0}")]
    Constraint(#[error(not(source))] String),
    #[display("cannot filter books on {_0}")]
    UnsupportedFilter(#[error(not(source))] String),
    /// A stored value (or a value about to be stored) does not fit its model.
    #[display("invalid stored data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // Another writer holding the file lock beyond the busy timeout.
        matches!(self, Self::Database)
    }
}

/// Wrap a sqlx failure, surfacing constraint violations as such.
pub(crate) fn raise<T>(result: sqlx::Result<T>) -> Result<T> {
    use exn::ResultExt;

    let kind = match &result {
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() || db.is_foreign_key_violation() => {
            ErrorKind::Constraint(db.message().to_string())
        },
        _ => ErrorKind::Database,
    };
    result.or_raise(|| kind)
}
