//! In-process adapter for engine tests. Sites live in memory under the
//! `scripted.test` host and can be changed between calls.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use time::Date;
use tome_adapter::error::{ErrorKind, Result};
use tome_adapter::{Adapter, AdapterRegistry, BookStream, MenuEntry, Params, Token};
use tome_config::{Config, Settings};
use tome_export::Exporters;
use tome_fetch::Fetcher;
use tome_model::{Book, Chapter, Source};
use tome_store::{Database, Repository};

use crate::Engine;

pub const HOST: &str = "scripted.test";

#[derive(Debug, Clone)]
pub struct Site {
    title: String,
    chapters: u32,
    updated: Option<Date>,
    completed: bool,
    broken: bool,
}

impl Site {
    pub fn new(title: &str, chapters: u32) -> Self {
        Self {
            title: title.to_string(),
            chapters,
            updated: None,
            completed: false,
            broken: false,
        }
    }

    pub fn updated(mut self, date: Date) -> Self {
        self.updated = Some(date);
        self
    }

    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }
}

#[derive(Default)]
struct Log {
    info: BTreeMap<String, u32>,
    chapters: BTreeMap<u32, u32>,
}

pub struct Scripted {
    name: String,
    catalog: bool,
    sites: Mutex<BTreeMap<String, Site>>,
    failures: BTreeMap<u32, u32>,
    log: Mutex<Log>,
}

impl Scripted {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            catalog: true,
            sites: Mutex::new(BTreeMap::new()),
            failures: BTreeMap::new(),
            log: Mutex::new(Log::default()),
        }
    }

    pub fn with_site(self, path: &str, site: Site) -> Self {
        self.set_site(path, site);
        self
    }

    /// Listed in the catalog, but its book page never loads.
    pub fn with_broken_site(self, path: &str, title: &str) -> Self {
        let site = Site {
            broken: true,
            ..Site::new(title, 0)
        };
        self.with_site(path, site)
    }

    /// Chapter `index` fails its first `failures` fetches.
    pub fn failing_chapter(mut self, index: u32, failures: u32) -> Self {
        self.failures.insert(index, failures);
        self
    }

    pub fn without_catalog(mut self) -> Self {
        self.catalog = false;
        self
    }

    pub fn set_site(&self, path: &str, site: Site) {
        self.sites.lock().unwrap().insert(path.to_string(), site);
    }

    pub fn info_calls(&self, path: &str) -> u32 {
        self.log.lock().unwrap().info.get(path).copied().unwrap_or(0)
    }

    pub fn chapter_calls(&self) -> u32 {
        self.log.lock().unwrap().chapters.values().sum()
    }

    pub fn calls_for(&self, index: u32) -> u32 {
        self.log.lock().unwrap().chapters.get(&index).copied().unwrap_or(0)
    }

    fn source(path: &str) -> Source {
        Source::parse(format!("{HOST}/{path}")).unwrap()
    }
}

#[async_trait]
impl Adapter for Scripted {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_url(&self, url: &str) -> bool {
        url.contains(HOST)
    }

    async fn get_book_info(&self, book: &mut Book, _params: &Params) -> Result<Token> {
        let path = book.source.as_str().trim_start_matches(HOST).trim_start_matches('/').to_string();
        *self.log.lock().unwrap().info.entry(path.clone()).or_default() += 1;
        let site = self.sites.lock().unwrap().get(&path).cloned();
        let Some(site) = site.filter(|site| !site.broken) else {
            exn::bail!(ErrorKind::MissingField {
                field: "title",
                url: book.whole_url(),
            });
        };
        book.title = site.title;
        book.author = "Somebody".to_string();
        book.updated = site.updated;
        book.completed = site.completed;
        Ok(Token::new(site.chapters))
    }

    async fn get_book_menu(&self, menu: Token, _params: &Params) -> Result<Vec<MenuEntry>> {
        let count = *menu.downcast::<u32>(&self.name)?;
        Ok((0..count).rev().map(|i| MenuEntry::new(i, Token::new(i))).collect())
    }

    async fn get_chapter_content(&self, mut chapter: Chapter, token: &Token, _params: &Params) -> Result<Chapter> {
        let index = *token.downcast::<u32>(&self.name)?;
        let calls = {
            let mut log = self.log.lock().unwrap();
            let calls = log.chapters.entry(index).or_default();
            *calls += 1;
            *calls
        };
        if calls <= self.failures.get(&index).copied().unwrap_or(0) {
            exn::bail!(ErrorKind::Fetch(format!("chapter {index}")));
        }
        chapter.title = format!("Chapter {index}");
        chapter.content = format!("content {index}");
        Ok(chapter)
    }

    fn get_all_book<'a>(&'a self, _params: &'a Params) -> BookStream<'a> {
        if !self.catalog {
            let result = unsupported(&self.name);
            return Box::pin(futures::stream::once(async move { result }));
        }
        let stubs: Vec<Result<Book>> = self
            .sites
            .lock()
            .unwrap()
            .iter()
            .map(|(path, site)| {
                Ok(Book {
                    updated: site.updated,
                    ..Book::stub(site.title.clone(), Self::source(path))
                })
            })
            .collect();
        Box::pin(futures::stream::iter(stubs))
    }

    async fn search_book(
        &self,
        keyword: &str,
        _author: Option<&str>,
        _style: Option<&str>,
        _params: &Params,
    ) -> Result<Vec<Book>> {
        let sites = self.sites.lock().unwrap();
        Ok(sites
            .iter()
            .filter(|(_, site)| site.title.contains(keyword))
            .map(|(path, site)| Book::stub(site.title.clone(), Self::source(path)))
            .collect())
    }
}

fn unsupported(adapter: &str) -> Result<Book> {
    exn::bail!(ErrorKind::NotImplemented {
        capability: "get_all_book",
        adapter: adapter.to_string(),
    })
}

/// Engine over an in-memory database with `adapters` registered and loaded.
pub async fn engine(adapters: &[Arc<Scripted>], max_retry: u32) -> Engine {
    let mut config = Config::default();
    config.engine.max_retry = max_retry;
    config.engine.backoff_ms = 1;
    config.engine.workers = 2;
    config.adapters.enabled = Vec::new();
    let settings = Settings::new(config);
    let fetcher = Fetcher::with_reqwest(&settings).unwrap();
    let mut registry = AdapterRegistry::new(fetcher, settings.clone());
    for adapter in adapters {
        let shared = adapter.clone();
        registry.register(adapter.name(), move |_| Ok(shared.clone() as Arc<dyn Adapter>));
    }
    for adapter in adapters {
        registry.load(adapter.name()).unwrap();
    }
    let db = Database::connect_in_memory().await.unwrap();
    Engine::new(settings, registry, Repository::from(&db), Exporters::with_builtin())
}
