//! Transport boundary
//!
//! A transport performs requests either on the calling thread or in the
//! background, reporting through a completion callback that may run on any
//! thread.

use crate::loader::{Loader, Request};
use crate::{NetError, Response};
use std::sync::Arc;

/// Completion callback for an asynchronous request
pub type Completion = Box<dyn FnOnce(Result<Response, NetError>) + Send + 'static>;

pub trait Transport: Send + Sync {
    /// Starts `request` without blocking the caller.
    fn send(&self, request: Request, on_complete: Completion);

    /// Performs `request` on the calling thread.
    fn send_blocking(&self, request: Request) -> Result<Response, NetError>;
}

/// Runs a blocking [`Loader`] on smol's blocking pool
pub struct LoaderTransport<L> {
    loader: Arc<L>,
}

impl<L: Loader + 'static> LoaderTransport<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader: Arc::new(loader),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }
}

impl<L: Loader + 'static> Transport for LoaderTransport<L> {
    fn send(&self, request: Request, on_complete: Completion) {
        let loader = Arc::clone(&self.loader);
        smol::spawn(async move {
            let result = smol::unblock(move || loader.load(&request)).await;
            on_complete(result);
        })
        .detach();
    }

    fn send_blocking(&self, request: Request) -> Result<Response, NetError> {
        self.loader.load(&request)
    }
}
