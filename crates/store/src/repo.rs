//! Books and their chapters, persisted together.
//!
//! Every operation runs inside a [`Session`]: the store lock is taken, a
//! transaction is opened, and nothing becomes visible until
//! [`commit`](Session::commit). The one-shot methods on [`Repository`] wrap a
//! single operation in its own session; callers that need several steps to
//! succeed or fail together open one with [`Repository::begin`].

use crate::Database;
use crate::error::{ErrorKind, Result, raise};
use crate::models::{BookRow, BookValues, ChapterRow};
use crate::query::BookQuery;
use exn::OptionExt;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, Transaction};
use tokio::sync::OwnedMutexGuard;
use tome_model::{Book, BookId, Chapter, Source};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_book<'q>(query: SqliteQuery<'q>, values: &BookValues<'q>) -> SqliteQuery<'q> {
    query
        .bind(values.title)
        .bind(values.author)
        .bind(values.description)
        .bind(values.style)
        .bind(values.cover)
        .bind(values.cover_format)
        .bind(values.chapter_count)
        .bind(values.source)
        .bind(values.adapter)
        .bind(values.status)
        .bind(values.publish_date.clone())
        .bind(values.update_date.clone())
}

/// An open transaction holding the store lock.
///
/// Dropping a session without committing rolls everything back. Do not call
/// [`Repository`] methods while a session is alive: they wait for the same
/// lock.
pub struct Session {
    // Declared before the guard: the rollback is queued before the lock is
    // released.
    tx: Transaction<'static, Sqlite>,
    _lock: OwnedMutexGuard<()>,
}

impl Session {
    pub async fn commit(self) -> Result<()> {
        raise(self.tx.commit().await)
    }

    pub async fn rollback(self) -> Result<()> {
        raise(self.tx.rollback().await)
    }

    pub async fn get_book(&mut self, id: BookId) -> Result<Book> {
        let row: Option<BookRow> = raise(
            sqlx::query_as(include_str!("../queries/get_book.sql"))
                .bind(id.0)
                .fetch_optional(&mut *self.tx)
                .await,
        )?;
        match row {
            Some(row) => row.try_into(),
            None => exn::bail!(ErrorKind::BookNotFound(id)),
        }
    }

    pub async fn find_book(&mut self, source: &Source) -> Result<Option<Book>> {
        let row: Option<BookRow> = raise(
            sqlx::query_as(include_str!("../queries/get_book_by_source.sql"))
                .bind(source.as_str())
                .fetch_optional(&mut *self.tx)
                .await,
        )?;
        row.map(Book::try_from).transpose()
    }

    /// Insert `book` when it has no id yet, otherwise overwrite every scalar
    /// field of the stored row with that id. The assigned id is written back
    /// into `book`.
    ///
    /// Chapters are not touched; see [`save_book`](Self::save_book).
    pub async fn update_book_all_info(&mut self, book: &mut Book) -> Result<BookId> {
        let values = BookValues::from(&*book);
        let id = match book.id {
            None => {
                let query = bind_book(sqlx::query(include_str!("../queries/insert_book.sql")), &values);
                let done = raise(query.execute(&mut *self.tx).await)?;
                BookId(done.last_insert_rowid())
            },
            Some(id) => {
                let query = bind_book(sqlx::query(include_str!("../queries/update_book.sql")), &values).bind(id.0);
                let done = raise(query.execute(&mut *self.tx).await)?;
                if done.rows_affected() == 0 {
                    exn::bail!(ErrorKind::BookNotFound(id));
                }
                id
            },
        };
        book.id = Some(id);
        Ok(id)
    }

    /// Insert the chapter, or replace the title and content of the one
    /// already stored at the same index.
    pub async fn upsert_chapter(&mut self, chapter: &Chapter) -> Result<()> {
        let book = chapter.book_id.ok_or_raise(|| ErrorKind::InvalidData("chapter without book"))?;
        let index = i64::from(chapter.index);
        let exists: i64 = raise(
            sqlx::query_scalar(include_str!("../queries/chapter_exists.sql"))
                .bind(book.0)
                .bind(index)
                .fetch_one(&mut *self.tx)
                .await,
        )?;
        let query = if exists != 0 {
            sqlx::query(include_str!("../queries/update_chapter.sql"))
                .bind(&chapter.title)
                .bind(&chapter.content)
                .bind(book.0)
                .bind(index)
        } else {
            sqlx::query(include_str!("../queries/insert_chapter.sql"))
                .bind(book.0)
                .bind(index)
                .bind(&chapter.title)
                .bind(&chapter.content)
        };
        raise(query.execute(&mut *self.tx).await)?;
        Ok(())
    }

    /// Book row plus every chapter it carries.
    ///
    /// The source decides between insert and update: a book whose source is
    /// already stored takes over that row's id, whatever id it carried.
    pub async fn save_book(&mut self, book: &mut Book) -> Result<BookId> {
        if let Some(stored) = self.find_book(&book.source).await? {
            book.id = stored.id;
        }
        let id = self.update_book_all_info(book).await?;
        for chapter in &mut book.chapters {
            chapter.book_id = Some(id);
            self.upsert_chapter(chapter).await?;
        }
        tracing::debug!(book_id = %id, title = %book.title, chapters = book.chapters.len(), "Book saved");
        Ok(id)
    }

    pub async fn get_chapter(&mut self, book: BookId, index: u32) -> Result<Chapter> {
        let row: Option<ChapterRow> = raise(
            sqlx::query_as(include_str!("../queries/get_chapter.sql"))
                .bind(book.0)
                .bind(i64::from(index))
                .fetch_optional(&mut *self.tx)
                .await,
        )?;
        match row {
            Some(row) => row.try_into(),
            None => exn::bail!(ErrorKind::ChapterNotFound { book, index }),
        }
    }

    /// Stored chapters of `book`, ordered by index.
    pub async fn chapters(&mut self, book: BookId) -> Result<Vec<Chapter>> {
        let rows: Vec<ChapterRow> = raise(
            sqlx::query_as(include_str!("../queries/list_chapters.sql"))
                .bind(book.0)
                .fetch_all(&mut *self.tx)
                .await,
        )?;
        rows.into_iter().map(Chapter::try_from).collect()
    }

    /// Chapters first, then the book.
    pub async fn delete_book(&mut self, id: BookId) -> Result<()> {
        raise(
            sqlx::query(include_str!("../queries/delete_chapters.sql"))
                .bind(id.0)
                .execute(&mut *self.tx)
                .await,
        )?;
        let done = raise(
            sqlx::query(include_str!("../queries/delete_book.sql"))
                .bind(id.0)
                .execute(&mut *self.tx)
                .await,
        )?;
        if done.rows_affected() == 0 {
            exn::bail!(ErrorKind::BookNotFound(id));
        }
        Ok(())
    }

    /// Books matching `query`, without chapters.
    pub async fn query_books(&mut self, query: &BookQuery) -> Result<Vec<Book>> {
        let mut builder = query.build()?;
        let rows: Vec<BookRow> = raise(builder.build_query_as().fetch_all(&mut *self.tx).await)?;
        rows.into_iter().map(Book::try_from).collect()
    }
}

/// Entry point for reading and writing books.
#[derive(Debug, Clone)]
pub struct Repository {
    db: Database,
}

impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { db: db.clone() }
    }
}

impl Repository {
    /// Wait for the store lock and open a transaction.
    pub async fn begin(&self) -> Result<Session> {
        let lock = self.db.lock().lock_owned().await;
        let tx = raise(self.db.pool().begin().await)?;
        Ok(Session { tx, _lock: lock })
    }

    pub async fn get_book(&self, id: BookId) -> Result<Book> {
        let mut session = self.begin().await?;
        let book = session.get_book(id).await?;
        session.commit().await?;
        Ok(book)
    }

    /// The stored book with all of its chapters, in order.
    pub async fn get_book_with_chapters(&self, id: BookId) -> Result<Book> {
        let mut session = self.begin().await?;
        let mut book = session.get_book(id).await?;
        book.chapters = session.chapters(id).await?;
        session.commit().await?;
        Ok(book)
    }

    pub async fn find_book(&self, source: &Source) -> Result<Option<Book>> {
        let mut session = self.begin().await?;
        let book = session.find_book(source).await?;
        session.commit().await?;
        Ok(book)
    }

    pub async fn save_book(&self, book: &mut Book) -> Result<BookId> {
        let mut session = self.begin().await?;
        let id = session.save_book(book).await?;
        session.commit().await?;
        Ok(id)
    }

    pub async fn get_chapter(&self, book: BookId, index: u32) -> Result<Chapter> {
        let mut session = self.begin().await?;
        let chapter = session.get_chapter(book, index).await?;
        session.commit().await?;
        Ok(chapter)
    }

    pub async fn delete_book(&self, id: BookId) -> Result<()> {
        let mut session = self.begin().await?;
        session.delete_book(id).await?;
        session.commit().await?;
        tracing::info!(book_id = %id, "Book deleted");
        Ok(())
    }

    pub async fn query_books(&self, query: &BookQuery) -> Result<Vec<Book>> {
        let mut session = self.begin().await?;
        let books = session.query_books(query).await?;
        session.commit().await?;
        Ok(books)
    }

    /// Waits for the running operation, then closes the database.
    pub async fn close(&self) {
        self.db.close().await;
    }
}
