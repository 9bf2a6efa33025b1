//! The SQLite file behind the store.

use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// One SQLite connection plus the lock every store operation takes first.
///
/// Clones share both.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    lock: Arc<Mutex<()>>,
}

impl Database {
    /// Open (or create) the database file at `path` and bring its schema up
    /// to date.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Opening book database");
        Self::open(Self::options().filename(path).create_if_missing(true)).await
    }

    /// Fresh in-memory database; everything is gone once it is closed.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::open(Self::options().filename(":memory:")).await
    }

    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .pragma("temp_store", "MEMORY")
    }

    #[instrument(level = "debug", skip_all)]
    async fn open(options: SqliteConnectOptions) -> Result<Self> {
        // The store lock admits one operation at a time, so one connection
        // is all it can use. It also keeps ":memory:" a single database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        MIGRATOR.run(&pool).await.or_raise(|| ErrorKind::Migration)?;
        Ok(Self {
            pool,
            lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) fn lock(&self) -> Arc<Mutex<()>> {
        self.lock.clone()
    }

    /// Refresh planner statistics and close the connection. Operations
    /// started afterwards fail with [`ErrorKind::Database`].
    pub async fn close(&self) {
        let _guard = self.lock.lock().await;
        if let Err(err) = sqlx::query("PRAGMA optimize").execute(&self.pool).await {
            tracing::debug!(error = %err, "Could not optimize database");
        }
        self.pool.close().await;
    }
}
