use crate::error::{ErrorKind, Result, from_adapter};
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tome_adapter::{Adapter, AdapterRegistry, Params};
use tome_config::Settings;
use tome_export::Exporters;
use tome_fetch::Fetcher;
use tome_model::{Book, BookId, Source};
use tome_store::{BookQuery, Database, Repository};
use tracing::instrument;

/// Composition root: owns the adapter registry, the store and the exporter
/// table, and runs every user-facing operation against them.
pub struct Engine {
    pub(crate) settings: Settings,
    pub(crate) registry: AdapterRegistry,
    pub(crate) repo: Repository,
    pub(crate) exporters: Exporters,
}

impl Engine {
    pub fn new(settings: Settings, registry: AdapterRegistry, repo: Repository, exporters: Exporters) -> Self {
        Self {
            settings,
            registry,
            repo,
            exporters,
        }
    }

    /// Wire up the production stack from `settings`: a `reqwest` fetcher,
    /// the built-in adapters (loading those enabled in the configuration),
    /// the database file and the built-in exporters.
    pub async fn open(settings: Settings) -> Result<Self> {
        let config = settings.current();
        let fetcher = Fetcher::with_reqwest(&settings).or_raise(|| ErrorKind::Setup)?;
        let registry = AdapterRegistry::with_builtin(fetcher, settings.clone());
        let loaded = registry.load_enabled();
        tracing::info!(adapters = ?loaded, "Adapters ready");

        let path = &config.database.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Setup)?;
        }
        let db = Database::connect(path).await.or_raise(|| ErrorKind::Setup)?;
        Ok(Self::new(settings, registry, Repository::from(&db), Exporters::with_builtin()))
    }

    /// Finish pending storage work and close the database.
    pub async fn close(&self) {
        self.repo.close().await;
        tracing::debug!("Engine closed");
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn exporters(&self) -> &Exporters {
        &self.exporters
    }

    pub(crate) fn adapter(&self, name: &str) -> Result<Arc<dyn Adapter>> {
        self.registry
            .get(name)
            .ok_or_raise(|| ErrorKind::AdapterNotLoaded(name.to_string()))
    }

    /// Acquire the book at `url` with the adapter called `adapter`, or with
    /// the first loaded adapter that claims the URL.
    pub async fn fetch(&self, url: &str, adapter: Option<&str>, params: &Params) -> Result<Option<Book>> {
        let adapter = match adapter {
            Some(name) => self.adapter(name)?,
            None => from_adapter(self.registry.claiming(url), "registry")?,
        };
        if !adapter.check_url(url) {
            tracing::error!(adapter = adapter.name(), url, "Adapter does not handle this url");
            exn::bail!(ErrorKind::Contract);
        }
        let source = Source::parse(url).or_raise(|| ErrorKind::InvalidUrl(url.to_string()))?;
        self.acquire(adapter.as_ref(), source, params).await
    }

    /// Re-acquire a stored book through the adapter recorded on it.
    pub async fn check_book(&self, id: BookId, params: &Params) -> Result<Option<Book>> {
        let stored = self.repo.get_book(id).await.or_raise(|| ErrorKind::Store)?;
        let adapter = self.adapter(&stored.adapter)?;
        let book = self.acquire(adapter.as_ref(), stored.source, params).await?;
        tracing::info!(book_id = %id, title = %stored.title, "Book checked");
        Ok(book)
    }

    pub async fn list(&self, query: &BookQuery) -> Result<Vec<Book>> {
        self.repo.query_books(query).await.or_raise(|| ErrorKind::Store)
    }

    pub async fn get_book(&self, id: BookId) -> Result<Book> {
        self.repo.get_book(id).await.or_raise(|| ErrorKind::Store)
    }

    pub async fn delete_book(&self, id: BookId) -> Result<()> {
        self.repo.delete_book(id).await.or_raise(|| ErrorKind::Store)
    }

    /// Load a stored book with its chapters and hand it to the exporter
    /// named `format`. Returns the path written.
    #[instrument(skip(self, output), fields(output = %output.display()))]
    pub async fn export_book(&self, id: BookId, format: &str, output: &Path) -> Result<PathBuf> {
        let exporter = self.exporters.get(format).or_raise(|| ErrorKind::Export)?;
        let book = self.repo.get_book_with_chapters(id).await.or_raise(|| ErrorKind::Store)?;
        exporter.export(&book, output).await.or_raise(|| ErrorKind::Export)
    }

    /// Ask every loaded adapter at once. Adapters that fail (or do not
    /// support searching) are logged and contribute nothing.
    pub async fn search(&self, keyword: &str, author: Option<&str>, style: Option<&str>, params: &Params) -> Vec<Book> {
        let mut tasks = JoinSet::new();
        for adapter in self.registry.loaded() {
            let keyword = keyword.to_string();
            let author = author.map(str::to_string);
            let style = style.map(str::to_string);
            let params = params.clone();
            tasks.spawn(async move {
                let result = adapter
                    .search_book(&keyword, author.as_deref(), style.as_deref(), &params)
                    .await;
                (adapter.name().to_string(), result)
            });
        }
        let mut books = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((adapter, Ok(found))) => {
                    tracing::debug!(adapter = %adapter, found = found.len(), "Search finished");
                    books.extend(found);
                },
                Ok((adapter, Err(err))) if err.is_contract_violation() => {
                    tracing::debug!(adapter = %adapter, error = ?err, "Adapter cannot search");
                },
                Ok((adapter, Err(err))) => tracing::warn!(adapter = %adapter, error = ?err, "Search failed"),
                Err(err) => tracing::error!(error = %err, "Search task panicked"),
            }
        }
        books
    }
}
