//! Adapter for www.xbiquge.so.
//!
//! Chapter indices are zero-based in menu order. The catalog is the
//! "recently updated" ranking, one page at a time; `start`/`end` params bound
//! the pages visited and the last page reached is remembered as the
//! `max_page` option.

mod parse;

use crate::error::{ErrorKind, Result};
use crate::{Adapter, AdapterContext, BookStream, MenuEntry, Params, Token};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use parse::MenuItem;
use tome_config::{ScopedSettings, SettingsAccess};
use tome_fetch::Fetcher;
use tome_model::{Book, Chapter, Cover, Source};
use tracing::instrument;
use url::Url;

pub const NAME: &str = "biquge";
const HOST: &str = "www.xbiquge.so";
const DEFAULT_BASE_URL: &str = "https://www.xbiquge.so";
const DEFAULT_COVER_FORMAT: &str = "jpg";

pub struct Biquge {
    fetcher: Fetcher,
    settings: ScopedSettings,
    /// Scheme and authority requests go to. Overridable with the `base_url`
    /// option, e.g. to point at a mirror.
    base: String,
}

impl Biquge {
    pub fn new(ctx: AdapterContext) -> Self {
        let base = ctx.settings.get_or("base_url", DEFAULT_BASE_URL.to_string());
        Self {
            fetcher: ctx.fetcher,
            settings: ctx.settings,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        let raw = format!("{}{path}", self.base);
        Url::parse(&raw).or_raise(|| ErrorKind::InvalidLocator(raw))
    }

    /// Book pages are directories; the trailing slash makes relative
    /// chapter links resolve inside them.
    fn book_url(&self, source: &Source) -> Result<Url> {
        self.url(&format!("{}/", &source.as_str()[source.host().len()..]))
    }

    fn ranking_url(&self, page: u32) -> Result<Url> {
        self.url(&format!("/top/toptime/{page}.html"))
    }

    async fn fetch_text(&self, url: &Url) -> Result<String> {
        self.fetcher
            .get_text(url.as_str(), &[], None)
            .await
            .or_raise(|| ErrorKind::Fetch(url.to_string()))
    }

    async fn fetch_cover(&self, url: &str) -> Option<Cover> {
        match self.fetcher.get_image(url).await {
            Ok((bytes, format)) => Some(Cover {
                bytes,
                format: format.unwrap_or_else(|| DEFAULT_COVER_FORMAT.to_string()),
            }),
            Err(err) => {
                tracing::warn!(url, error = ?err, "Could not download cover; continuing without one");
                None
            },
        }
    }
}

fn page_param(params: &Params, key: &str) -> Option<u32> {
    params.get(key).and_then(|v| v.trim().parse().ok())
}

#[async_trait]
impl Adapter for Biquge {
    fn name(&self) -> &str {
        NAME
    }

    fn check_url(&self, url: &str) -> bool {
        Source::parse(url).is_ok_and(|source| source.host() == HOST)
    }

    #[instrument(skip_all, fields(source = %book.source))]
    async fn get_book_info(&self, book: &mut Book, _params: &Params) -> Result<Token> {
        let url = self.book_url(&book.source)?;
        let html = self.fetch_text(&url).await?;
        let page = parse::book_page(&html, &url)?;
        book.title = page.title;
        book.author = page.author;
        book.description = page.description;
        book.style = page.style;
        book.completed = page.completed;
        book.updated = page.updated;
        book.adapter = NAME.to_string();
        book.cover = match page.cover_url {
            Some(cover_url) => self.fetch_cover(&cover_url).await,
            None => None,
        };
        tracing::debug!(title = %book.title, chapters = page.menu.len(), "Parsed book page");
        Ok(Token::new(page.menu))
    }

    async fn get_book_menu(&self, menu: Token, _params: &Params) -> Result<Vec<MenuEntry>> {
        let items = menu.downcast::<Vec<MenuItem>>(NAME)?;
        Ok((0u32..)
            .zip(items.iter())
            .map(|(index, item)| MenuEntry::new(index, Token::new(item.clone())))
            .collect())
    }

    async fn get_chapter_content(&self, mut chapter: Chapter, token: &Token, _params: &Params) -> Result<Chapter> {
        let item = token.downcast::<MenuItem>(NAME)?;
        let url = Url::parse(&item.url).or_raise(|| ErrorKind::InvalidLocator(item.url.clone()))?;
        let html = self.fetch_text(&url).await?;
        chapter.content = parse::chapter_content(&html, &url)?;
        chapter.title = item.title.clone();
        tracing::debug!(index = chapter.index, title = %chapter.title, "Fetched chapter");
        Ok(chapter)
    }

    fn get_all_book<'a>(&'a self, params: &'a Params) -> BookStream<'a> {
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        Box::pin(stream!({
            let first = match self.ranking_url(1) {
                Ok(url) => url,
                Err(err) => {
                    yield Err(err);
                    return;
                },
            };
            let first_html = match self.fetch_text(&first).await {
                Ok(html) => html,
                Err(err) => {
                    yield Err(err);
                    return;
                },
            };
            let pages = match parse::page_count(&first_html, &first) {
                Ok(pages) => pages,
                Err(err) => {
                    yield Err(err);
                    return;
                },
            };
            let start = page_param(params, "start").unwrap_or(1).max(1);
            let end = page_param(params, "end").unwrap_or(pages).min(pages);
            tracing::info!(start, end, pages, "Walking ranking pages");

            for page in start..=end {
                let (url, html) = if page == 1 {
                    (first.clone(), first_html.clone())
                } else {
                    let url = match self.ranking_url(page) {
                        Ok(url) => url,
                        Err(err) => {
                            yield Err(err);
                            return;
                        },
                    };
                    match self.fetch_text(&url).await {
                        Ok(html) => (url, html),
                        Err(err) => {
                            yield Err(err);
                            return;
                        },
                    }
                };
                // Links are resolved against the canonical host so mirrors yield
                // the same sources as the site itself.
                let canonical = Url::parse(&format!("https://{HOST}{}", url.path()));
                let entries = parse::ranking(&html, canonical.as_ref().unwrap_or(&url));
                if let Err(err) = self.settings.set("max_page", serde_json::json!(page)) {
                    tracing::warn!(page, error = ?err, "Could not remember ranking position");
                }
                for (title, href) in entries {
                    match Source::parse(&href) {
                        Ok(source) => yield Ok(Book::stub(title, source)),
                        Err(err) => tracing::warn!(href = %href, error = ?err, "Skipping unparseable catalog entry"),
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use parse::fixtures;
    use time::macros::date;
    use tome_config::{Config, Settings};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn adapter(server: &MockServer) -> (Biquge, Settings) {
        let settings = Settings::new(Config::default());
        settings.scoped(NAME).set("base_url", serde_json::json!(server.uri())).unwrap();
        let ctx = AdapterContext {
            fetcher: Fetcher::with_reqwest(&settings).unwrap(),
            settings: settings.scoped(NAME),
        };
        (Biquge::new(ctx), settings)
    }

    async fn serve(server: &MockServer, at: &str, body: impl Into<Vec<u8>>, content_type: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", content_type)
                    .set_body_bytes(body.into()),
            )
            .mount(server)
            .await;
    }

    #[rstest::rstest]
    #[case("https://www.xbiquge.so/book/52/", true)]
    #[case("www.xbiquge.so/book/52", true)]
    #[case("https://m.xbiquge.so/book/52/", false)]
    #[case("https://example.com/www.xbiquge.so/", false)]
    fn test_check_url(#[case] url: &str, #[case] claimed: bool) {
        let settings = Settings::new(Config::default());
        let adapter = Biquge::new(AdapterContext {
            fetcher: Fetcher::with_reqwest(&settings).unwrap(),
            settings: settings.scoped(NAME),
        });
        assert_eq!(adapter.check_url(url), claimed);
    }

    #[tokio::test]
    async fn test_acquire_through_adapter() {
        let server = MockServer::start().await;
        serve(&server, "/book/52/", fixtures::BOOK, "text/html").await;
        serve(&server, "/files/52.jpg", vec![0xFF, 0xD8, 0xFF], "image/jpeg").await;
        serve(&server, "/book/52/1.html", fixtures::chapter("陨落。"), "text/html; charset=utf-8").await;
        serve(&server, "/book/52/2.html", fixtures::chapter("斗之气。"), "text/html; charset=utf-8").await;
        serve(&server, "/book/52/3.html", fixtures::chapter("聚气散。"), "text/html; charset=utf-8").await;
        let (adapter, _) = adapter(&server).await;
        let params = Params::new();

        let mut book = Book::new(Source::parse("https://www.xbiquge.so/book/52/").unwrap());
        let token = adapter.get_book_info(&mut book, &params).await.unwrap();
        assert_eq!(book.title, "斗破苍穹");
        assert_eq!(book.adapter, NAME);
        assert_eq!(book.updated, Some(date!(2023 - 05 - 17)));
        let cover = book.cover.as_ref().unwrap();
        assert_eq!(cover.format, "jpg");
        assert_eq!(cover.bytes, vec![0xFF, 0xD8, 0xFF]);

        let menu = adapter.get_book_menu(token, &params).await.unwrap();
        assert_eq!(menu.iter().map(|m| m.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        let chapter = adapter.get_chapter_content(Chapter::pending(1), &menu[1].token, &params).await.unwrap();
        assert_eq!(chapter.index, 1);
        assert_eq!(chapter.title, "第二章 斗之气");
        assert_eq!(chapter.content, "斗之气。\n第二段。");
        // Tokens survive reuse.
        let again = adapter.get_chapter_content(Chapter::pending(1), &menu[1].token, &params).await.unwrap();
        assert_eq!(again, chapter);
    }

    #[tokio::test]
    async fn test_catalog_walks_requested_pages() {
        let server = MockServer::start().await;
        let first = fixtures::ranking(1, 3, &[("One", "/book/1/"), ("Two", "/book/2/")]);
        let second = fixtures::ranking(2, 3, &[("Three", "https://www.xbiquge.so/book/3/")]);
        let third = fixtures::ranking(3, 3, &[("Four", "/book/4/")]);
        serve(&server, "/top/toptime/1.html", first, "text/html").await;
        serve(&server, "/top/toptime/2.html", second, "text/html").await;
        serve(&server, "/top/toptime/3.html", third, "text/html").await;
        let (adapter, settings) = adapter(&server).await;

        let params = Params::from([("end".to_string(), "2".to_string())]);
        let books: Vec<Book> = adapter.get_all_book(&params).map(|b| b.unwrap()).collect().await;
        let titles: Vec<_> = books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two", "Three"]);
        assert_eq!(books[0].source.as_str(), "www.xbiquge.so/book/1");
        assert_eq!(books[2].source.as_str(), "www.xbiquge.so/book/3");
        assert_eq!(settings.scoped(NAME).get_or("max_page", 0u32), 2);

        let params = Params::from([("start".to_string(), "3".to_string())]);
        let books: Vec<Book> = adapter.get_all_book(&params).map(|b| b.unwrap()).collect().await;
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "Four");
    }

    #[tokio::test]
    async fn test_search_is_not_implemented() {
        let server = MockServer::start().await;
        let (adapter, _) = adapter(&server).await;
        let err = adapter.search_book("斗破", None, None, &Params::new()).await.unwrap_err();
        assert!(err.is_contract_violation());
    }
}
