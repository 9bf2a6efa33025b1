use crate::error::{ErrorKind, Result};
use crate::executor::{HttpExecutor, Method, Request, Response, TransportError};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::sync::{PoisonError, RwLock};

/// [`HttpExecutor`] backed by a pooled [`reqwest::Client`].
///
/// The client lives behind a lock so that [`reset`](HttpExecutor::reset) can
/// swap in a fresh connection pool while other requests are in flight; those
/// keep using the client they cloned.
pub struct ReqwestExecutor {
    client: RwLock<Client>,
}

impl ReqwestExecutor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: RwLock::new(Self::build()?),
        })
    }

    fn build() -> Result<Client> {
        Client::builder().build().or_raise(|| ErrorKind::Client)
    }

    fn client(&self) -> Client {
        self.client.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() || err.is_request() || err.is_body() {
        TransportError::Closed(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(&self, request: &Request) -> std::result::Result<Response, TransportError> {
        let client = self.client();
        let mut builder = match request.method {
            Method::Get => client.get(&request.url).query(&request.params),
            Method::Post => client.post(&request.url).form(&request.params),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        let response = builder.timeout(request.timeout).send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(transport_error)?;
        Ok(Response {
            status,
            content_type,
            body: body.to_vec(),
        })
    }

    fn reset(&self) {
        match Self::build() {
            Ok(client) => *self.client.write().unwrap_or_else(PoisonError::into_inner) = client,
            Err(err) => tracing::warn!(error = ?err, "Could not rebuild HTTP client; keeping the old one"),
        }
    }
}
