//! Acquisition of a single book.
//!
//! `FetchingMetadata -> DecidingFreshness -> (Skip | FetchingMenu ->
//! FetchingChapters -> Retrying* -> Persisting)`. A book whose chapters still
//! fail after the last retry round is abandoned: nothing is written and the
//! caller gets `None`.

use crate::Engine;
use crate::error::{ErrorKind, Result, from_adapter};
use exn::ResultExt;
use futures::future::join_all;
use tome_adapter::{Adapter, MenuEntry, Params, Token};
use tome_model::{Book, Chapter, Source};
use tracing::instrument;

enum Fetched {
    Done(Chapter),
    Failed(MenuEntry),
    Fatal(tome_adapter::error::Error),
}

async fn fetch_chapter(adapter: &dyn Adapter, entry: MenuEntry, params: &Params) -> Fetched {
    match adapter.get_chapter_content(Chapter::pending(entry.index), &entry.token, params).await {
        Ok(mut chapter) => {
            chapter.index = entry.index;
            Fetched::Done(chapter)
        },
        Err(err) if err.is_contract_violation() => Fetched::Fatal(err),
        Err(err) => {
            tracing::warn!(chapter = entry.index, error = ?err, "Could not fetch chapter");
            Fetched::Failed(entry)
        },
    }
}

impl Engine {
    /// Bring the stored copy of the book at `source` up to date.
    ///
    /// Returns the stored record untouched when it is already current, the
    /// freshly persisted book otherwise, or `None` when some chapters could
    /// not be fetched within the retry budget.
    #[instrument(skip_all, fields(adapter = adapter.name(), source = %source))]
    pub async fn acquire(&self, adapter: &dyn Adapter, source: Source, params: &Params) -> Result<Option<Book>> {
        let name = adapter.name();
        let mut book = Book::new(source);
        book.adapter = name.to_string();
        let menu_token: Token = from_adapter(adapter.get_book_info(&mut book, params).await, name)?;
        tracing::info!(title = %book.title, author = %book.author, "Fetched book info");

        let mut known = 0;
        if let Some(stored) = self.repo.find_book(&book.source).await.or_raise(|| ErrorKind::Store)? {
            if stored.is_current_with(&book) {
                tracing::info!(title = %stored.title, "Book is already the latest");
                return Ok(Some(stored));
            }
            book.id = stored.id;
            known = stored.chapter_count;
        }

        let menu = from_adapter(adapter.get_book_menu(menu_token, params).await, name)?;
        let menu_len = u32::try_from(menu.len()).unwrap_or(u32::MAX);
        let mut pending: Vec<MenuEntry> = menu.into_iter().filter(|entry| entry.index >= known).collect();
        tracing::info!(chapters = menu_len, new = pending.len(), "Fetched menu");

        let max_retry = self.settings.current().engine.max_retry;
        let mut chapters = Vec::with_capacity(pending.len());
        let mut round = 0;
        loop {
            let results = join_all(pending.drain(..).map(|entry| fetch_chapter(adapter, entry, params))).await;
            for result in results {
                match result {
                    Fetched::Done(chapter) => chapters.push(chapter),
                    Fetched::Failed(entry) => pending.push(entry),
                    Fetched::Fatal(err) => return Err(err).or_raise(|| ErrorKind::Contract),
                }
            }
            if pending.is_empty() {
                break;
            }
            if round == max_retry {
                let url = book.whole_url();
                tracing::error!(title = %book.title, url = %url, failed = pending.len(), "Giving up on book");
                return Ok(None);
            }
            round += 1;
            tracing::info!(round, failed = pending.len(), "Retrying failed chapters");
        }

        book.chapters = chapters;
        book.seal_chapters(menu_len);
        let id = self.repo.save_book(&mut book).await.or_raise(|| ErrorKind::Store)?;
        tracing::info!(book_id = %id, title = %book.title, saved = book.chapters.len(), "Book saved");
        Ok(Some(book))
    }
}
