//! Books, chapters and the two ingestion rules every other crate relies on:
//! source canonicalization and date parsing.

mod book;
mod chapter;
mod date;
pub mod error;
mod source;

pub use crate::book::{Book, BookId, Cover, UNKNOWN_AUTHOR};
pub use crate::chapter::Chapter;
pub use crate::date::{format_date, parse_date};
pub use crate::source::{Source, canonicalize};
