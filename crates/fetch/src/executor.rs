use async_trait::async_trait;
use derive_more::{Display, Error};
use std::time::Duration;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    #[display("GET")]
    Get,
    #[display("POST")]
    Post,
}

/// One attempt's worth of request. Parameters go in the query string for
/// `GET` and in a url-encoded form body for `POST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Transport-level failure of a single attempt. All of these are retried.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[display("request timed out")]
    Timeout,
    /// The connection was refused, reset or closed; pooled connections
    /// should be discarded before the next attempt.
    #[display("connection closed: {_0}")]
    Closed(#[error(not(source))] String),
    #[display("transport error: {_0}")]
    Other(#[error(not(source))] String),
}

/// Performs a single HTTP exchange with no retries of its own.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, request: &Request) -> Result<Response, TransportError>;

    /// Drop pooled connections and start afresh.
    fn reset(&self) {}
}
