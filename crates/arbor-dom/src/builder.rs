//! Detached tree construction
//!
//! A [`TreeBuilder`] holds nodes that belong to no document yet, behind
//! its own lock. [`Document::adopt`] moves them into the document while
//! holding both locks (builder first), so no other thread ever sees them
//! half-way between the two.

use crate::NodeId;
use crate::document::Document;
use crate::error::{DomError, Result};
use crate::mutation::InsertAt;
use crate::node::{Node, NodeData};
use crate::tree::DomTree;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Staging area for nodes built off-document, e.g. by a parser thread
#[derive(Debug, Default)]
pub struct TreeBuilder {
    tree: Mutex<DomTree>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DomTree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.lock().insert(Node::element(tag))
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.lock().insert(Node::text(text))
    }

    pub fn create_comment(&self, text: &str) -> NodeId {
        self.lock()
            .insert(Node::new(NodeData::Comment(text.to_string())))
    }

    /// Links `child` under `parent`. Both must be builder nodes and `child`
    /// must not have a parent yet.
    pub fn append(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let mut tree = self.lock();
        let p = tree.get(parent).ok_or_else(|| DomError::missing(parent))?;
        if !p.can_have_children() {
            return Err(DomError::InvalidModification(format!(
                "node {parent} cannot have children"
            )));
        }
        let c = tree.get(child).ok_or_else(|| DomError::missing(child))?;
        if c.parent.is_some() {
            return Err(DomError::InvalidModification(format!(
                "node {child} already has a parent"
            )));
        }
        let mut current = Some(parent);
        while let Some(n) = current {
            if n == child {
                return Err(DomError::InvalidModification(format!(
                    "node {child} is an ancestor of {parent}"
                )));
            }
            current = tree.get(n).and_then(|node| node.parent);
        }

        if let Some(p) = tree.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = tree.get_mut(child) {
            c.parent = Some(parent);
        }
        Ok(())
    }

    pub fn set_attribute(&self, element: NodeId, name: &str, value: &str) -> Result<()> {
        let mut tree = self.lock();
        let el = tree
            .get_mut(element)
            .ok_or_else(|| DomError::missing(element))?
            .as_element_mut()
            .ok_or_else(|| DomError::not_element(element))?;
        el.attributes.set(&name.to_ascii_lowercase(), value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Outcome of [`Document::adopt`]
#[derive(Debug, Clone, Default)]
pub struct Adoption {
    map: HashMap<NodeId, NodeId>,
    roots: Vec<NodeId>,
}

impl Adoption {
    /// Document handle for a builder handle
    pub fn get(&self, staged: NodeId) -> Option<NodeId> {
        self.map.get(&staged).copied()
    }

    /// Adopted top-level nodes, now children of the target parent
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Document {
    /// Moves every node of `builder` into this document and appends the
    /// builder's top-level nodes to `parent`, in creation order. The builder
    /// is left empty.
    pub fn adopt(&self, parent: NodeId, builder: &TreeBuilder) -> Result<Adoption> {
        let mut staged = builder.lock();
        self.mutate(move |state, fx| {
            if !state.node(parent)?.can_have_children() {
                return Err(DomError::InvalidModification(format!(
                    "node {parent} cannot have children"
                )));
            }

            let mut map = HashMap::new();
            let mut moved = Vec::new();
            for (old, mut node) in staged.drain() {
                let children = std::mem::take(&mut node.children);
                let old_parent = node.parent.take();
                let new = state.tree.insert(node);
                map.insert(old, new);
                moved.push((new, old_parent, children));
            }

            let mut roots = Vec::new();
            for (new, old_parent, children) in moved {
                let children = children.iter().filter_map(|c| map.get(c).copied()).collect();
                let node = state.node_mut(new)?;
                node.children = children;
                match old_parent.and_then(|p| map.get(&p).copied()) {
                    Some(p) => node.parent = Some(p),
                    None => roots.push(new),
                }
            }
            for root in &roots {
                state.insert(parent, *root, InsertAt::End, fx)?;
            }
            tracing::debug!("adopted {} nodes under {}", map.len(), parent);
            Ok(Adoption { map, roots })
        })
    }
}
