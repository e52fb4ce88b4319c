//! Arbor Networking
//!
//! Request/response types, the transport boundary and the deduplicating
//! fetch cache used for asynchronous resource loads.

mod fetch_cache;
mod loader;
mod transport;

pub use fetch_cache::{FetchCache, FetchCallback, FetchOutcome, FetchStats};
pub use loader::{FileLoader, Loader, MemoryLoader, Request};
pub use transport::{Completion, LoaderTransport, Transport};
pub use url::Url;

/// HTTP-like response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    /// A `200` response with the given body
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body.into())
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Network error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetError {
    #[error("HTTP error: {status}")]
    HttpStatus { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Resource not found: {0}")]
    NotFound(String),
}
