//! Arbor DOM - live document tree
//!
//! An arena-backed node tree guarded by a single per-document lock, with
//! cached derived state (local and computed style, render state), live
//! collections, a notification bus and deduplicated resource loading.
//!
//! All mutations take the tree lock, update structure and caches, and
//! dispatch notifications after the lock is released.

mod attributes;
mod builder;
mod bus;
mod collection;
mod config;
mod document;
mod element;
mod error;
mod generation;
mod mutation;
mod node;
mod render;
mod resources;
mod style;
mod tree;

use std::fmt;

pub use builder::{Adoption, TreeBuilder};
pub use bus::{DocumentEvent, DocumentListener, Subscription};
pub use collection::{LiveCollection, NodeFilter};
pub use config::DocumentConfig;
pub use document::{Document, DocumentBuilder, NodeRef};
pub use element::ElementKind;
pub use error::{DomError, Result};
pub use generation::Generation;
pub use node::NodeKind;
pub use render::{Bounds, RenderState, RenderStatus, UiNode};

pub use arbor_css as css;
pub use arbor_net as net;

/// Node identifier: arena slot plus the slot's generation, so a handle to a
/// discarded node never aliases a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn slot(self) -> usize {
        self.index as usize
    }

    pub(crate) fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}
