use crate::BookId;

/// One chapter of a [`Book`](crate::Book).
///
/// `index` is unique within the owning book and defines reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub book_id: Option<BookId>,
    pub index: u32,
    pub title: String,
    pub content: String,
}

impl Chapter {
    /// Menu slot allocated but not yet fetched.
    pub fn pending(index: u32) -> Self {
        Self {
            book_id: None,
            index,
            title: String::new(),
            content: String::new(),
        }
    }

    pub fn with_book(mut self, book_id: BookId) -> Self {
        self.book_id = Some(book_id);
        self
    }
}
