use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use futures::Stream;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::pin::Pin;
use std::sync::Arc;
use tome_model::{Book, Chapter};

/// Free-form, adapter-specific parameters passed through every call.
pub type Params = BTreeMap<String, String>;

/// Lazy catalog enumeration. Not restartable: a second call starts over.
pub type BookStream<'a> = Pin<Box<dyn Stream<Item = Result<Book>> + Send + 'a>>;

/// Opaque value an adapter hands out and later receives back unchanged.
///
/// The engine never looks inside; it only stores and forwards tokens.
/// Cloning is cheap, so a chapter token can be reused when a chapter is
/// fetched again after a failure.
#[derive(Clone)]
pub struct Token(Arc<dyn Any + Send + Sync>);

impl Token {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Recover the adapter's own value. Fails with
    /// [`ErrorKind::InvalidToken`] when the token came from somewhere else.
    pub fn downcast<T: Any>(&self, adapter: &str) -> Result<&T> {
        match self.0.downcast_ref::<T>() {
            Some(value) => Ok(value),
            None => exn::bail!(ErrorKind::InvalidToken {
                adapter: adapter.to_string()
            }),
        }
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("Token(..)")
    }
}

/// One menu slot: where the chapter sits in the book and how to fetch it.
#[derive(Debug, Clone)]
pub struct MenuEntry {
    pub index: u32,
    pub token: Token,
}

impl MenuEntry {
    pub fn new(index: u32, token: Token) -> Self {
        Self { index, token }
    }
}

fn not_implemented<T>(adapter: &str, capability: &'static str) -> Result<T> {
    exn::bail!(ErrorKind::NotImplemented {
        capability,
        adapter: adapter.to_string(),
    })
}

/// Everything the engine needs from a site.
///
/// Only [`name`](Self::name) and [`check_url`](Self::check_url) are required.
/// Every other capability defaults to [`ErrorKind::NotImplemented`], which
/// callers treat as a contract violation and never retry.
///
/// Acquisition calls the capabilities in a fixed order:
/// 1. [`get_book_info`](Self::get_book_info) fills the book's metadata and
///    returns a menu token,
/// 2. [`get_book_menu`](Self::get_book_menu) turns that token into indexed
///    chapter tokens,
/// 3. [`get_chapter_content`](Self::get_chapter_content) is called once per
///    chapter, possibly more than once for the same token.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Unique name; also recorded on every book the adapter produces.
    fn name(&self) -> &str;

    /// Whether this adapter handles `url`. Pure: no network access.
    fn check_url(&self, url: &str) -> bool;

    /// Fill `book` (whose `source` is already set) with metadata.
    async fn get_book_info(&self, book: &mut Book, params: &Params) -> Result<Token> {
        let _ = (book, params);
        not_implemented(self.name(), "get_book_info")
    }

    async fn get_book_menu(&self, menu: Token, params: &Params) -> Result<Vec<MenuEntry>> {
        let _ = (menu, params);
        not_implemented(self.name(), "get_book_menu")
    }

    /// Return `chapter` with its title and content filled in.
    async fn get_chapter_content(&self, chapter: Chapter, token: &Token, params: &Params) -> Result<Chapter> {
        let _ = (chapter, token, params);
        not_implemented(self.name(), "get_chapter_content")
    }

    /// Enumerate the site's catalog as book stubs (title and source only).
    fn get_all_book<'a>(&'a self, params: &'a Params) -> BookStream<'a> {
        let _ = params;
        let result = not_implemented(self.name(), "get_all_book");
        Box::pin(futures::stream::once(async move { result }))
    }

    async fn search_book(
        &self,
        keyword: &str,
        author: Option<&str>,
        style: Option<&str>,
        params: &Params,
    ) -> Result<Vec<Book>> {
        let _ = (keyword, author, style, params);
        not_implemented(self.name(), "search_book")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tome_model::Source;

    struct Bare;

    #[async_trait]
    impl Adapter for Bare {
        fn name(&self) -> &str {
            "bare"
        }

        fn check_url(&self, url: &str) -> bool {
            url.contains("bare.test")
        }
    }

    fn assert_not_implemented<T: Debug>(result: Result<T>, expected: &'static str) {
        let err = result.unwrap_err();
        match &*err {
            ErrorKind::NotImplemented { capability, adapter } => {
                assert_eq!(*capability, expected);
                assert_eq!(adapter, "bare");
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_contract_violation());
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unimplemented_capabilities() {
        let adapter = Bare;
        let params = Params::new();
        let mut book = Book::new(Source::parse("bare.test/1").unwrap());
        assert_not_implemented(adapter.get_book_info(&mut book, &params).await, "get_book_info");
        assert_not_implemented(adapter.get_book_menu(Token::new(()), &params).await, "get_book_menu");
        assert_not_implemented(
            adapter.get_chapter_content(Chapter::pending(0), &Token::new(()), &params).await,
            "get_chapter_content",
        );
        assert_not_implemented(adapter.search_book("x", None, None, &params).await, "search_book");
        let mut stream = adapter.get_all_book(&params);
        assert_not_implemented(stream.next().await.unwrap(), "get_all_book");
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_token_downcast() {
        let token = Token::new(vec!["a".to_string()]);
        assert_eq!(token.clone().downcast::<Vec<String>>("bare").unwrap(), &vec!["a".to_string()]);
        let err = token.downcast::<u32>("bare").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidToken { .. }));
    }
}
