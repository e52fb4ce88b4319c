//! Resource loading
//!
//! Images go through the document's deduplicating fetch cache and complete
//! asynchronously. Style sheets and script text are fetched synchronously on
//! the calling thread, never while the tree lock is held.

use crate::NodeId;
use crate::bus::DocumentEvent;
use crate::document::Document;
use crate::error::{DomError, Result};
use arbor_net::{FetchOutcome, FetchStats};
use std::sync::Arc;

impl Document {
    /// Requests an image. `on_loaded` runs exactly once, possibly on the
    /// transport's thread; with images disabled it runs immediately with an
    /// empty outcome.
    pub fn load_image<F>(&self, uri: &str, on_loaded: F)
    where
        F: FnOnce(Arc<FetchOutcome>) + Send + 'static,
    {
        self.shared.fetch.fetch(uri, on_loaded);
    }

    pub fn set_images_enabled(&self, enabled: bool) {
        self.shared.fetch.set_enabled(enabled);
    }

    pub fn images_enabled(&self) -> bool {
        self.shared.fetch.is_enabled()
    }

    pub fn fetch_stats(&self) -> FetchStats {
        self.shared.fetch.stats()
    }

    pub fn pending_fetch_count(&self) -> usize {
        self.shared.fetch.pending_count()
    }

    /// Fetches `href` as text, blocking the caller
    pub fn fetch_text_blocking(&self, href: &str) -> Result<String> {
        self.shared
            .fetch
            .fetch_blocking(href)
            .map(|resp| resp.text())
            .map_err(|source| DomError::ResourceLoadFailure {
                url: href.to_string(),
                source,
            })
    }

    /// Loads the style sheet at `href` on behalf of `owner` (a `link`
    /// element, typically) and installs it. Fetch and parse failures are
    /// logged and leave the document untouched. Returns whether a sheet was
    /// installed.
    pub fn load_style_sheet(&self, owner: NodeId, href: &str) -> Result<bool> {
        self.lock().node(owner)?;
        if !self.shared.config.external_css_enabled {
            tracing::debug!("external style sheets disabled, skipping {}", href);
            return Ok(false);
        }

        self.dispatch(&[DocumentEvent::ResourceLoading(owner)]);
        let installed = match self.fetch_text_blocking(href) {
            Ok(text) => match self.shared.parser.parse_sheet(&text) {
                Ok(sheet) => {
                    let url = self
                        .shared
                        .fetch
                        .resolve(href)
                        .map(|u| u.to_string())
                        .unwrap_or_else(|_| href.to_string());
                    tracing::debug!("style sheet {} loaded ({} rules)", url, sheet.len());
                    self.add_style_sheet(sheet.with_href(&url));
                    true
                }
                Err(e) => {
                    tracing::warn!("unable to parse style sheet {}: {}", href, e);
                    false
                }
            },
            Err(e) => {
                tracing::warn!("{}", e);
                false
            }
        };
        self.dispatch(&[DocumentEvent::NodeLoaded(owner)]);
        Ok(installed)
    }
}
