//! SQLite storage for harvested books.
//!
//! Two tables: `books`, keyed by the canonical source locator, and
//! `chapters`, keyed by `(book_id, chapter_index)`. All access goes through
//! [`Repository`], which serializes operations behind one async lock and
//! wraps each of them in a transaction ([`Session`]).

mod db;
pub mod error;
mod models;
mod query;
mod repo;

pub use crate::db::Database;
pub use crate::query::{BookQuery, Filter};
pub use crate::repo::{Repository, Session};
