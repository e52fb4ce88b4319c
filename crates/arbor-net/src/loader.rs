//! Resource Loaders
//!
//! Blocking loaders that turn a [`Request`] into a [`Response`]. They are
//! wrapped by a [`crate::Transport`] to become asynchronous.

use crate::{NetError, Response};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use url::Url;

/// GET request for a resource
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl Request {
    pub fn get(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }
}

/// Blocking resource loader
pub trait Loader: Send + Sync {
    fn load(&self, request: &Request) -> Result<Response, NetError>;
}

/// Loads `file:` URLs from the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLoader;

impl Loader for FileLoader {
    fn load(&self, request: &Request) -> Result<Response, NetError> {
        let url = Url::parse(&request.url).map_err(|e| NetError::InvalidUrl(e.to_string()))?;
        if url.scheme() != "file" {
            return Err(NetError::UnsupportedScheme(url.scheme().to_string()));
        }
        let path = url
            .to_file_path()
            .map_err(|()| NetError::InvalidUrl(request.url.clone()))?;

        tracing::debug!("GET {}", path.display());

        match std::fs::read(&path) {
            Ok(body) => Ok(Response::ok(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(NetError::NotFound(request.url.clone()))
            }
            Err(e) => Err(NetError::Network(e.to_string())),
        }
    }
}

/// Serves canned responses keyed by absolute URL
#[derive(Debug, Default)]
pub struct MemoryLoader {
    entries: Mutex<HashMap<String, Response>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: &str, response: Response) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), response);
    }

    pub fn with(self, url: &str, response: Response) -> Self {
        self.insert(url, response);
        self
    }
}

impl Loader for MemoryLoader {
    fn load(&self, request: &Request) -> Result<Response, NetError> {
        tracing::debug!("GET {} (memory)", request.url);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request.url)
            .cloned()
            .ok_or_else(|| NetError::NotFound(request.url.clone()))
    }
}
