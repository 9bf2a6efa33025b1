use crate::{Chapter, Source};
use std::fmt::{Display, Formatter, Result as FmtResult};
use time::Date;

/// Storage-assigned identifier of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BookId(pub i64);

impl Display for BookId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for BookId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Cover image as downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cover {
    pub bytes: Vec<u8>,
    /// File extension without the leading dot (`jpg`, `png`).
    pub format: String,
}

/// A serialized book.
///
/// Identity is the [`Source`]: a book fetched twice from the same locator is
/// the same book. `id` is `None` until the book has been persisted once.
/// `chapters` is only populated when a caller asks for it (acquisition,
/// export); listings leave it empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: Option<BookId>,
    pub title: String,
    pub author: String,
    pub source: Source,
    /// Name of the adapter that produced this book.
    pub adapter: String,
    pub description: String,
    pub style: String,
    pub cover: Option<Cover>,
    /// `true` once the author has finished the book.
    pub completed: bool,
    pub published: Option<Date>,
    pub updated: Option<Date>,
    pub chapter_count: u32,
    pub chapters: Vec<Chapter>,
}

pub const UNKNOWN_AUTHOR: &str = "Unknown";

impl Book {
    /// Empty, unsaved book for the given source. Adapters fill in the rest.
    pub fn new(source: Source) -> Self {
        Self {
            id: None,
            title: String::new(),
            author: UNKNOWN_AUTHOR.to_string(),
            source,
            adapter: String::new(),
            description: String::new(),
            style: String::new(),
            cover: None,
            completed: false,
            published: None,
            updated: None,
            chapter_count: 0,
            chapters: Vec::new(),
        }
    }

    /// Catalog entry: only the title and source are known.
    pub fn stub(title: impl Into<String>, source: Source) -> Self {
        Self {
            title: title.into(),
            ..Self::new(source)
        }
    }

    pub fn whole_url(&self) -> String {
        self.source.whole_url()
    }

    /// Whether this (stored) book is at least as current as `fetched`.
    ///
    /// A book without a known update date is never current. A fetched book
    /// without one is older than any stored date.
    pub fn is_current_with(&self, fetched: &Book) -> bool {
        self.updated.is_some() && self.updated >= fetched.updated
    }

    /// Sort chapters by index and make the count agree with them.
    pub fn seal_chapters(&mut self, menu_len: u32) {
        self.chapters.sort_by_key(|c| c.index);
        self.chapter_count = menu_len;
    }
}

impl Display for Book {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.id {
            Some(id) => write!(f, "[{id}] {} ({}) <{}>", self.title, self.author, self.source),
            None => write!(f, "{} ({}) <{}>", self.title, self.author, self.source),
        }
    }
}
