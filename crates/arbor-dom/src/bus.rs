//! Notification bus
//!
//! Mutations collect [`DocumentEvent`]s while the tree lock is held and the
//! document replays them to listeners after unlocking. Listeners may call
//! back into the document, including unsubscribing themselves.

use crate::NodeId;
use crate::document::{Document, Shared};
use crate::render::UiNode;
use std::sync::{Arc, Weak};

/// Kinds of change reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEvent {
    SizeInvalidated(NodeId),
    /// Visual change that does not affect size
    LookInvalidated(NodeId),
    /// Reordering within a parent
    PositionInvalidated(NodeId),
    /// Ambiguous change, such as an attribute write
    Invalidated(NodeId),
    /// Children added or removed
    StructureInvalidated(NodeId),
    ResourceLoading(NodeId),
    NodeLoaded(NodeId),
    /// Whole-document reset, such as a style sheet change
    AllInvalidated,
}

impl DocumentEvent {
    fn deliver(self, listener: &dyn DocumentListener, doc: &Document) {
        match self {
            DocumentEvent::SizeInvalidated(n) => listener.size_invalidated(doc, n),
            DocumentEvent::LookInvalidated(n) => listener.look_invalidated(doc, n),
            DocumentEvent::PositionInvalidated(n) => listener.position_invalidated(doc, n),
            DocumentEvent::Invalidated(n) => listener.invalidated(doc, n),
            DocumentEvent::StructureInvalidated(n) => listener.structure_invalidated(doc, n),
            DocumentEvent::ResourceLoading(n) => listener.resource_loading(doc, n),
            DocumentEvent::NodeLoaded(n) => listener.node_loaded(doc, n),
            DocumentEvent::AllInvalidated => listener.all_invalidated(doc),
        }
    }
}

/// Document change listener. Every callback runs without the tree lock.
pub trait DocumentListener: Send + Sync {
    fn size_invalidated(&self, _doc: &Document, _node: NodeId) {}
    fn look_invalidated(&self, _doc: &Document, _node: NodeId) {}
    fn position_invalidated(&self, _doc: &Document, _node: NodeId) {}
    fn invalidated(&self, _doc: &Document, _node: NodeId) {}
    fn structure_invalidated(&self, _doc: &Document, _node: NodeId) {}
    fn resource_loading(&self, _doc: &Document, _node: NodeId) {}
    fn node_loaded(&self, _doc: &Document, _node: NodeId) {}
    fn all_invalidated(&self, _doc: &Document) {}
}

pub(crate) struct ListenerEntry {
    pub id: u64,
    pub listener: Arc<dyn DocumentListener>,
}

/// Side effects gathered under the lock and applied after it is released
#[derive(Default)]
pub(crate) struct Effects {
    pub events: Vec<DocumentEvent>,
    pub repaint: Vec<Arc<dyn UiNode>>,
    /// UI handles of freed nodes. They may own subscriptions, so they are
    /// dropped only once the lock is gone.
    pub released: Vec<Arc<dyn UiNode>>,
}

impl Effects {
    pub fn push(&mut self, event: DocumentEvent) {
        if self.events.last() != Some(&event) {
            self.events.push(event);
        }
    }
}

/// Keeps a listener subscribed; dropping it unsubscribes
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    shared: Weak<Shared>,
    id: u64,
}

impl Subscription {
    /// Unsubscribes now
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let doc = Document { shared };
        let removed = {
            let mut state = doc.lock();
            state
                .listeners
                .iter()
                .position(|e| e.id == self.id)
                .map(|pos| state.listeners.remove(pos))
        };
        // Released after unlocking; the listener may own further handles
        drop(removed);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Document {
    pub fn subscribe(&self, listener: Arc<dyn DocumentListener>) -> Subscription {
        let mut state = self.lock();
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.push(ListenerEntry { id, listener });
        Subscription {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Delivers `events` in order. The listener count is read under the
    /// lock, then each listener is fetched by index; an index that has
    /// fallen out of range because the list shrank is skipped.
    pub(crate) fn dispatch(&self, events: &[DocumentEvent]) {
        for &event in events {
            let count = self.lock().listeners.len();
            for i in 0..count {
                let listener = self
                    .lock()
                    .listeners
                    .get(i)
                    .map(|e| Arc::clone(&e.listener));
                match listener {
                    Some(listener) => event.deliver(listener.as_ref(), self),
                    None => tracing::trace!("listener {} gone during dispatch", i),
                }
            }
        }
    }

    /// Dispatches gathered events, then repaints
    pub(crate) fn flush(&self, fx: Effects) {
        self.dispatch(&fx.events);
        for ui in fx.repaint {
            ui.repaint();
        }
        drop(fx.released);
    }

    /// Runs `op` under the tree lock and flushes its effects afterwards
    pub(crate) fn mutate<R>(
        &self,
        op: impl FnOnce(&mut crate::document::TreeState, &mut Effects) -> crate::Result<R>,
    ) -> crate::Result<R> {
        let mut fx = Effects::default();
        let result = {
            let mut state = self.lock();
            op(&mut *state, &mut fx)
        };
        self.flush(fx);
        result
    }
}
