//! Deduplicating fetch cache
//!
//! Concurrent fetches of the same resolved URL share one transport request.
//! Waiters queue on a pending record that exists only while the request is
//! in flight; the record is removed in the same critical section that takes
//! its waiter list, and waiters are invoked after the lock is released.

use crate::loader::Request;
use crate::transport::Transport;
use crate::{NetError, Response};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;

/// Waiter callback, invoked exactly once
pub type FetchCallback = Box<dyn FnOnce(Arc<FetchOutcome>) + Send + 'static>;

/// Terminal result of a fetch, shared by every waiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded(Response),
    /// Loading is disabled; nothing was requested
    Empty,
    Failed(NetError),
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Loaded(resp) => Some(resp),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, FetchOutcome::Loaded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }
}

/// Statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub total_requests: u64,
    pub deduplicated: u64,
    pub unique: u64,
    pub failed: u64,
}

impl FetchStats {
    pub fn dedup_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.deduplicated as f64 / self.total_requests as f64
        }
    }
}

struct PendingFetch {
    waiters: Vec<FetchCallback>,
}

#[derive(Default)]
struct CacheState {
    pending: HashMap<String, PendingFetch>,
    stats: FetchStats,
}

struct Inner {
    state: Mutex<CacheState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, key: &str, result: Result<Response, NetError>) {
        let outcome = match result {
            Ok(resp) if resp.is_success() => FetchOutcome::Loaded(resp),
            Ok(resp) => FetchOutcome::Failed(NetError::HttpStatus {
                status: resp.status,
            }),
            Err(e) => FetchOutcome::Failed(e),
        };
        if let FetchOutcome::Failed(e) = &outcome {
            tracing::warn!("fetch {} failed: {}", key, e);
        }
        let outcome = Arc::new(outcome);

        let waiters = {
            let mut guard = self.lock();
            let state = &mut *guard;
            if outcome.is_failed() {
                state.stats.failed += 1;
            }
            state
                .pending
                .remove(key)
                .map(|pending| pending.waiters)
                .unwrap_or_default()
        };

        tracing::debug!("fetch {} resolved for {} waiter(s)", key, waiters.len());
        for waiter in waiters {
            waiter(Arc::clone(&outcome));
        }
    }
}

/// Deduplicating asynchronous fetch cache
pub struct FetchCache {
    inner: Arc<Inner>,
    transport: Arc<dyn Transport>,
    enabled: AtomicBool,
    base: Option<Url>,
    user_agent: Option<String>,
    empty: Arc<FetchOutcome>,
}

impl FetchCache {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(CacheState::default()),
            }),
            transport,
            enabled: AtomicBool::new(true),
            base: None,
            user_agent: None,
            empty: Arc::new(FetchOutcome::Empty),
        }
    }

    /// Relative URIs are resolved against `base`
    pub fn with_base(mut self, base: Option<Url>) -> Self {
        self.base = base;
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Resolves `uri` to the canonical key used for deduplication.
    pub fn resolve(&self, uri: &str) -> Result<Url, NetError> {
        let parsed = match &self.base {
            Some(base) => base.join(uri),
            None => Url::parse(uri),
        };
        let mut url = parsed.map_err(|e| NetError::InvalidUrl(format!("{uri}: {e}")))?;
        url.set_fragment(None);
        Ok(url)
    }

    /// Fetches `uri`, invoking `on_result` once with the shared outcome.
    ///
    /// When loading is disabled `on_result` runs immediately with
    /// [`FetchOutcome::Empty`]. Otherwise it may run on the transport's
    /// thread.
    pub fn fetch<F>(&self, uri: &str, on_result: F)
    where
        F: FnOnce(Arc<FetchOutcome>) + Send + 'static,
    {
        if !self.is_enabled() {
            on_result(Arc::clone(&self.empty));
            return;
        }
        let key = match self.resolve(uri) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::warn!("fetch skipped: {}", e);
                on_result(Arc::new(FetchOutcome::Failed(e)));
                return;
            }
        };

        {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            state.stats.total_requests += 1;
            if let Some(pending) = state.pending.get_mut(&key) {
                pending.waiters.push(Box::new(on_result));
                state.stats.deduplicated += 1;
                tracing::debug!("fetch {} joined ({} waiting)", key, pending.waiters.len());
                return;
            }
            state.pending.insert(
                key.clone(),
                PendingFetch {
                    waiters: vec![Box::new(on_result)],
                },
            );
            state.stats.unique += 1;
        }

        tracing::debug!("fetch {} started", key);
        let request = self.request(&key);
        let inner = Arc::clone(&self.inner);
        self.transport
            .send(request, Box::new(move |result| inner.complete(&key, result)));
    }

    /// Fetches `uri` on the calling thread, bypassing deduplication.
    pub fn fetch_blocking(&self, uri: &str) -> Result<Response, NetError> {
        let url = self.resolve(uri)?;
        tracing::debug!("blocking fetch {}", url);
        let resp = self.transport.send_blocking(self.request(url.as_str()))?;
        if resp.is_success() {
            Ok(resp)
        } else {
            Err(NetError::HttpStatus {
                status: resp.status,
            })
        }
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_pending(&self, uri: &str) -> bool {
        match self.resolve(uri) {
            Ok(url) => self.inner.lock().pending.contains_key(url.as_str()),
            Err(_) => false,
        }
    }

    pub fn stats(&self) -> FetchStats {
        self.inner.lock().stats
    }

    fn request(&self, url: &str) -> Request {
        let request = Request::get(url);
        match &self.user_agent {
            Some(ua) => request.with_header("User-Agent", ua),
            None => request,
        }
    }
}
