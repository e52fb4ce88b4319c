//! Live collections
//!
//! A collection is a filtered view of a subtree. Matches are collected
//! lazily on first access and cached in the document, stamped with the
//! root's subtree generation. A bus listener also drops the cache when a
//! change lands at or below the root.

use crate::NodeId;
use crate::bus::{DocumentListener, Subscription};
use crate::document::{Document, NodeRef, TreeState};
use crate::error::Result;
use crate::generation::Generation;
use arbor_css::SelectorElement;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Membership test for a collection
#[derive(Clone)]
pub enum NodeFilter {
    /// Every element
    Elements,
    /// Elements with this tag name; `*` matches every element
    TagName(String),
    /// Elements whose `name` attribute equals the value
    Name(String),
    /// Elements carrying all of the whitespace-separated classes
    ClassName(String),
    Images,
    /// `a` and `area` elements with an `href`
    Links,
    Forms,
    /// `a` elements with a `name`
    Anchors,
    Custom(Arc<dyn Fn(NodeRef<'_>) -> bool + Send + Sync>),
}

impl fmt::Debug for NodeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeFilter::Elements => write!(f, "Elements"),
            NodeFilter::TagName(t) => f.debug_tuple("TagName").field(t).finish(),
            NodeFilter::Name(n) => f.debug_tuple("Name").field(n).finish(),
            NodeFilter::ClassName(c) => f.debug_tuple("ClassName").field(c).finish(),
            NodeFilter::Images => write!(f, "Images"),
            NodeFilter::Links => write!(f, "Links"),
            NodeFilter::Forms => write!(f, "Forms"),
            NodeFilter::Anchors => write!(f, "Anchors"),
            NodeFilter::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl NodeFilter {
    pub fn matches(&self, node: NodeRef<'_>) -> bool {
        let Some(tag) = node.tag_name() else {
            return matches!(self, NodeFilter::Custom(f) if f(node));
        };
        match self {
            NodeFilter::Elements => true,
            NodeFilter::TagName(t) => t == "*" || tag.eq_ignore_ascii_case(t),
            NodeFilter::Name(n) => node.attribute("name") == Some(n.as_str()),
            NodeFilter::ClassName(names) => {
                let mut wanted = names.split_whitespace().peekable();
                wanted.peek().is_some() && wanted.all(|c| node.has_class(c))
            }
            NodeFilter::Images => tag == "img",
            NodeFilter::Links => (tag == "a" || tag == "area") && node.attribute("href").is_some(),
            NodeFilter::Forms => tag == "form",
            NodeFilter::Anchors => tag == "a" && node.attribute("name").is_some(),
            NodeFilter::Custom(f) => f(node),
        }
    }
}

/// Materialized matches of one collection
#[derive(Debug, Default)]
pub(crate) struct CollectionCache {
    generation: Generation,
    nodes: Vec<NodeId>,
    /// `id` and `name` values; the first match in document order wins
    by_name: HashMap<String, NodeId>,
}

impl TreeState {
    fn collect(
        &self,
        root: NodeId,
        filter: &NodeFilter,
        nest: bool,
        generation: Generation,
    ) -> CollectionCache {
        let mut cache = CollectionCache {
            generation,
            ..Default::default()
        };
        let mut stack: Vec<NodeId> = self
            .tree
            .get(root)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();

        while let Some(n) = stack.pop() {
            let Ok(view) = NodeRef::new(self, n) else {
                continue;
            };
            let matched = filter.matches(view);
            if matched {
                cache.nodes.push(n);
                for key in [view.attribute("id"), view.attribute("name")]
                    .into_iter()
                    .flatten()
                {
                    cache.by_name.entry(key.to_string()).or_insert(n);
                }
            }
            if !matched || nest {
                stack.extend(view.children().iter().rev().copied());
            }
        }
        cache
    }
}

struct CollectionWatcher {
    id: u64,
    root: NodeId,
}

impl CollectionWatcher {
    fn changed(&self, doc: &Document, node: NodeId) {
        let mut state = doc.lock();
        if state.is_ancestor_or_self(self.root, node) {
            state.collections.remove(&self.id);
        }
    }
}

impl DocumentListener for CollectionWatcher {
    fn structure_invalidated(&self, doc: &Document, node: NodeId) {
        self.changed(doc, node);
    }

    fn invalidated(&self, doc: &Document, node: NodeId) {
        self.changed(doc, node);
    }

    fn node_loaded(&self, doc: &Document, node: NodeId) {
        self.changed(doc, node);
    }
}

/// Live view over the nodes below a root that pass a filter
pub struct LiveCollection {
    doc: Document,
    id: u64,
    root: NodeId,
    filter: NodeFilter,
    nest: bool,
    _watch: Subscription,
}

impl fmt::Debug for LiveCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveCollection")
            .field("root", &self.root)
            .field("filter", &self.filter)
            .field("nest", &self.nest)
            .finish()
    }
}

impl LiveCollection {
    fn with_cache<R>(&self, f: impl FnOnce(&CollectionCache) -> R) -> R {
        let mut state = self.doc.lock();
        let Some(generation) = state.tree.get(self.root).map(|n| n.subtree_generation) else {
            return f(&CollectionCache::default());
        };
        let fresh = state
            .collections
            .get(&self.id)
            .is_some_and(|c| c.generation == generation);
        if !fresh {
            let built = state.collect(self.root, &self.filter, self.nest, generation);
            state.collections.insert(self.id, built);
        }
        match state.collections.get(&self.id) {
            Some(cache) => f(cache),
            None => f(&CollectionCache::default()),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn length(&self) -> usize {
        self.with_cache(|c| c.nodes.len())
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    pub fn item(&self, index: usize) -> Option<NodeId> {
        self.with_cache(|c| c.nodes.get(index).copied())
    }

    /// Match whose `id` (or else `name`) equals `name`
    pub fn named_item(&self, name: &str) -> Option<NodeId> {
        self.with_cache(|c| c.by_name.get(name).copied())
    }

    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.with_cache(|c| c.nodes.iter().position(|n| *n == node))
    }

    /// Snapshot of the current matches
    pub fn nodes(&self) -> Vec<NodeId> {
        self.with_cache(|c| c.nodes.clone())
    }

    /// Whether the matches are materialized and still valid
    pub fn is_cached(&self) -> bool {
        let state = self.doc.lock();
        let generation = state.tree.get(self.root).map(|n| n.subtree_generation);
        state
            .collections
            .get(&self.id)
            .is_some_and(|c| Some(c.generation) == generation)
    }
}

impl Drop for LiveCollection {
    fn drop(&mut self) {
        self.doc.lock().collections.remove(&self.id);
    }
}

impl Document {
    /// Live collection of the nodes below `root` passing `filter`. With
    /// `nest` unset, matches are not searched into.
    pub fn collection(&self, root: NodeId, filter: NodeFilter, nest: bool) -> Result<LiveCollection> {
        self.lock().node(root)?;
        Ok(self.open_collection(root, filter, nest))
    }

    fn open_collection(&self, root: NodeId, filter: NodeFilter, nest: bool) -> LiveCollection {
        let id = {
            let mut state = self.lock();
            let id = state.next_collection_id;
            state.next_collection_id += 1;
            id
        };
        let watch = self.subscribe(Arc::new(CollectionWatcher { id, root }));
        LiveCollection {
            doc: self.clone(),
            id,
            root,
            filter,
            nest,
            _watch: watch,
        }
    }

    pub fn get_elements_by_tag_name(&self, root: NodeId, tag: &str) -> Result<LiveCollection> {
        self.collection(root, NodeFilter::TagName(tag.to_string()), true)
    }

    pub fn get_elements_by_name(&self, root: NodeId, name: &str) -> Result<LiveCollection> {
        self.collection(root, NodeFilter::Name(name.to_string()), true)
    }

    pub fn get_elements_by_class_name(&self, root: NodeId, names: &str) -> Result<LiveCollection> {
        self.collection(root, NodeFilter::ClassName(names.to_string()), true)
    }

    /// Element children of `node`
    pub fn child_elements(&self, node: NodeId) -> Result<LiveCollection> {
        self.collection(node, NodeFilter::Elements, false)
    }

    /// The document node always exists, so these collections cannot fail
    fn document_collection(&self, filter: NodeFilter) -> LiveCollection {
        self.open_collection(self.root(), filter, true)
    }

    pub fn images(&self) -> LiveCollection {
        self.document_collection(NodeFilter::Images)
    }

    pub fn links(&self) -> LiveCollection {
        self.document_collection(NodeFilter::Links)
    }

    pub fn forms(&self) -> LiveCollection {
        self.document_collection(NodeFilter::Forms)
    }

    pub fn anchors(&self) -> LiveCollection {
        self.document_collection(NodeFilter::Anchors)
    }
}
