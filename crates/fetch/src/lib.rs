//! The one way adapters talk to the network.
//!
//! [`Fetcher`] wraps an [`HttpExecutor`] with three guarantees:
//! - **Admission control**: every attempt holds a permit from a semaphore
//!   sized by `fetch.concurrency`, no matter how many fetches callers fan out.
//! - **Retries**: transport failures and 5xx answers are retried up to
//!   `fetch.max_retry` attempts, after which
//!   [`MaxRetriesExceeded`](error::ErrorKind::MaxRetriesExceeded) is raised.
//! - **Text recovery**: bodies are decoded through a fallback chain of
//!   encodings (see [`decode()`]) instead of trusting the declared charset.
//!
//! Configuration is read live: changes published through
//! [`Settings`](tome_config::Settings) apply to the next request.

mod decode;
pub mod error;
mod executor;
mod reqwest;

pub use crate::decode::{declared_encoding, decode, encoding_for_label};
pub use crate::executor::{HttpExecutor, Method, Request, Response, TransportError};
pub use crate::reqwest::ReqwestExecutor;

use crate::error::{ErrorKind, Result};
use mime_guess::mime::Mime;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit, watch};
use tome_config::{Config, FetchConfig, Settings};
use tracing::instrument;

/// Shared, cloneable HTTP front door for adapters.
#[derive(Clone)]
pub struct Fetcher {
    inner: Arc<Inner>,
}

struct Inner {
    executor: Arc<dyn HttpExecutor>,
    config: watch::Receiver<Config>,
    permits: Semaphore,
    // Permits the semaphore currently owns, in flight or not.
    capacity: Mutex<usize>,
}

impl Fetcher {
    pub fn new(executor: Arc<dyn HttpExecutor>, settings: &Settings) -> Self {
        let config = settings.subscribe();
        let capacity = config.borrow().fetch.concurrency;
        Self {
            inner: Arc::new(Inner {
                executor,
                config,
                permits: Semaphore::new(capacity),
                capacity: Mutex::new(capacity),
            }),
        }
    }

    /// Fetcher over a real HTTP client.
    pub fn with_reqwest(settings: &Settings) -> Result<Self> {
        Ok(Self::new(Arc::new(ReqwestExecutor::new()?), settings))
    }

    pub fn config(&self) -> FetchConfig {
        self.inner.config.borrow().fetch.clone()
    }

    pub async fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<Response> {
        self.send(Method::Get, url, params).await
    }

    pub async fn post(&self, url: &str, params: &[(&str, &str)]) -> Result<Response> {
        self.send(Method::Post, url, params).await
    }

    /// `GET` and decode the body. `encoding` is a label (`"gbk"`) tried first.
    pub async fn get_text(&self, url: &str, params: &[(&str, &str)], encoding: Option<&str>) -> Result<String> {
        let response = self.get(url, params).await?;
        Ok(Self::text(&response, encoding))
    }

    /// `POST` form parameters and decode the body.
    pub async fn post_text(&self, url: &str, params: &[(&str, &str)], encoding: Option<&str>) -> Result<String> {
        let response = self.post(url, params).await?;
        Ok(Self::text(&response, encoding))
    }

    /// Download a binary asset and guess its file extension.
    pub async fn get_image(&self, url: &str) -> Result<(Vec<u8>, Option<String>)> {
        let response = self.get(url, &[]).await?;
        let extension = guess_extension(response.content_type.as_deref(), url);
        Ok((response.body, extension))
    }

    fn text(response: &Response, encoding: Option<&str>) -> String {
        let hint = encoding.and_then(encoding_for_label);
        let declared = response.content_type.as_deref().and_then(declared_encoding);
        decode(&response.body, hint, declared)
    }

    fn headers(config: &FetchConfig) -> Vec<(String, String)> {
        let mut headers = vec![("User-Agent".to_string(), config.user_agent.clone())];
        if !config.cookie.is_empty() {
            headers.push(("Cookie".to_string(), config.cookie.clone()));
        }
        headers
    }

    #[instrument(level = "debug", skip(self, method, params), fields(%method))]
    async fn send(&self, method: Method, url: &str, params: &[(&str, &str)]) -> Result<Response> {
        let config = self.config();
        let request = Request {
            method,
            url: url.to_string(),
            params: params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            headers: Self::headers(&config),
            timeout: Duration::from_millis(config.timeout_ms),
        };
        for attempt in 1..=config.max_retry {
            let outcome = {
                let _permit = self.acquire(config.concurrency).await;
                self.inner.executor.execute(&request).await
            };
            match outcome {
                Ok(response) if response.is_server_error() => {
                    tracing::debug!(attempt, status = response.status, "Server error; retrying");
                },
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => exn::bail!(ErrorKind::Status {
                    status: response.status,
                    url: request.url,
                }),
                Err(err @ TransportError::Closed(_)) => {
                    tracing::debug!(attempt, error = %err, "Connection closed; resetting client");
                    self.inner.executor.reset();
                },
                Err(err) => {
                    tracing::debug!(attempt, error = %err, "Transport error; retrying");
                },
            }
        }
        tracing::warn!(attempts = config.max_retry, "Giving up on request");
        exn::bail!(ErrorKind::MaxRetriesExceeded {
            method,
            url: request.url,
            params: request.params,
            headers: request.headers,
            attempts: config.max_retry,
        })
    }

    async fn acquire(&self, wanted: usize) -> Option<SemaphorePermit<'_>> {
        self.resize(wanted);
        // Only a closed semaphore refuses, and this one is never closed.
        self.inner.permits.acquire().await.ok()
    }

    /// Bring the semaphore in line with the configured concurrency.
    ///
    /// Shrinking only removes idle permits; any shortfall is made up on later
    /// calls as in-flight requests finish.
    fn resize(&self, wanted: usize) {
        let mut capacity = self.inner.capacity.lock().unwrap_or_else(PoisonError::into_inner);
        match wanted.cmp(&*capacity) {
            Ordering::Greater => {
                self.inner.permits.add_permits(wanted - *capacity);
                *capacity = wanted;
            },
            Ordering::Less => {
                *capacity -= self.inner.permits.forget_permits(*capacity - wanted);
            },
            Ordering::Equal => {},
        }
    }
}

/// File extension for a downloaded asset: from the `Content-Type` when the
/// server sends a known one, otherwise from the URL path.
pub fn guess_extension(content_type: Option<&str>, url: &str) -> Option<String> {
    let from_mime = content_type
        .and_then(|ct| ct.parse::<Mime>().ok())
        .and_then(|mime| mime_guess::get_mime_extensions_str(mime.essence_str()))
        .and_then(|exts| exts.iter().find(|e| **e == "jpg").or_else(|| exts.first()))
        .map(|ext| ext.to_string());
    from_mime.or_else(|| {
        let url = url::Url::parse(url).ok()?;
        let ext = Path::new(url.path()).extension()?.to_str()?.to_ascii_lowercase();
        mime_guess::from_ext(&ext).first().map(|_| ext)
    })
}
