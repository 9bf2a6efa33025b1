//! Whole-catalog and whole-library runs.
//!
//! Each book gets its own bounded retry loop with a fixed pause between
//! attempts. A book that keeps failing is logged and skipped; only a
//! contract violation stops the run.

use crate::Engine;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use futures::StreamExt;
use std::time::Duration;
use tome_adapter::{Adapter, Params};
use tome_model::{Book, BookId};
use tome_store::{BookQuery, Filter};
use tracing::instrument;

impl Engine {
    /// Whether a catalog entry is worth acquiring: the store does not know
    /// it, the entry carries no update date, or the stored copy is older.
    pub async fn needs_update(&self, stub: &Book) -> Result<bool> {
        let stored = self.repo.find_book(&stub.source).await.or_raise(|| ErrorKind::Store)?;
        Ok(match stored {
            None => true,
            Some(_) if stub.updated.is_none() => true,
            Some(stored) => !stored.is_current_with(stub),
        })
    }

    /// Acquire `book` (a stub or a stored record), retrying failed attempts.
    async fn acquire_retrying(&self, adapter: &dyn Adapter, book: &Book, params: &Params) -> Result<Option<BookId>> {
        let engine = self.settings.current().engine;
        let attempts = engine.max_retry.max(1);
        for attempt in 1..=attempts {
            match self.acquire(adapter, book.source.clone(), params).await {
                Ok(acquired) => return Ok(acquired.and_then(|b| b.id)),
                Err(err) if matches!(&*err, ErrorKind::Contract) => return Err(err),
                Err(err) => {
                    let url = book.whole_url();
                    tracing::warn!(attempt, title = %book.title, url = %url, error = ?err, "Could not acquire book");
                },
            }
            if attempt < attempts {
                tokio::time::sleep(Duration::from_millis(engine.backoff_ms)).await;
            }
        }
        tracing::error!(title = %book.title, url = %book.whole_url(), attempts, "Giving up on book");
        Ok(None)
    }

    async fn acquire_stub(
        &self,
        adapter: &dyn Adapter,
        stub: tome_adapter::error::Result<Book>,
        params: &Params,
    ) -> Result<Option<BookId>> {
        let stub = match stub {
            Ok(stub) => stub,
            Err(err) if err.is_contract_violation() => return Err(err).or_raise(|| ErrorKind::Contract),
            Err(err) => {
                tracing::error!(adapter = adapter.name(), error = ?err, "Catalog enumeration failed");
                return Ok(None);
            },
        };
        match self.needs_update(&stub).await {
            Ok(true) => self.acquire_retrying(adapter, &stub, params).await,
            Ok(false) => {
                tracing::info!(title = %stub.title, "Book is already the latest");
                Ok(None)
            },
            Err(err) => {
                tracing::error!(title = %stub.title, error = ?err, "Could not look up catalog entry");
                Ok(None)
            },
        }
    }

    /// Walk the catalog of the adapter called `adapter`, acquiring every
    /// entry that needs it, `engine.workers` at a time. Returns the ids of
    /// the books that were (re)acquired.
    #[instrument(skip(self, params))]
    pub async fn crawl(&self, adapter: &str, params: &Params) -> Result<Vec<BookId>> {
        let adapter = self.adapter(adapter)?;
        let workers = self.settings.current().engine.workers.max(1);
        let mut outcomes = adapter
            .get_all_book(params)
            .map(|stub| self.acquire_stub(adapter.as_ref(), stub, params))
            .buffer_unordered(workers);
        let mut ids = Vec::new();
        while let Some(outcome) = outcomes.next().await {
            if let Some(id) = outcome? {
                ids.push(id);
            }
        }
        tracing::info!(acquired = ids.len(), "Catalog crawl finished");
        Ok(ids)
    }

    /// Re-acquire every stored book that is not completed yet. Books whose
    /// adapter is not loaded are skipped.
    #[instrument(skip_all)]
    pub async fn check_all_books(&self, params: &Params) -> Result<Vec<BookId>> {
        let unfinished = self
            .repo
            .query_books(&BookQuery::new().filter("status", Filter::Flag(false)))
            .await
            .or_raise(|| ErrorKind::Store)?;
        let mut ids = Vec::new();
        for book in unfinished {
            let adapter = match self.adapter(&book.adapter) {
                Ok(adapter) => adapter,
                Err(err) => {
                    tracing::warn!(title = %book.title, error = ?err, "Skipping book");
                    continue;
                },
            };
            tracing::info!(title = %book.title, "Checking book");
            if let Some(id) = self.acquire_retrying(adapter.as_ref(), &book, params).await? {
                ids.push(id);
            }
        }
        tracing::info!(checked = ids.len(), "Checked all books");
        Ok(ids)
    }
}
