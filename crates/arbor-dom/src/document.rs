//! Document
//!
//! The document owns the node arena and every piece of mutable state that
//! derives from it, all behind one lock. [`Document`] is a cheap handle;
//! clones share the same tree.

use crate::bus::ListenerEntry;
use crate::collection::CollectionCache;
use crate::config::DocumentConfig;
use crate::error::{DomError, Result};
use crate::generation::Generation;
use crate::node::{ElementData, Node, NodeData, NodeKind};
use crate::render::UiNode;
use crate::tree::DomTree;
use crate::NodeId;
use arbor_css::{CssParser, RuleIndex, SelectorElement, StyleSheet, StyleSheetParser};
use arbor_net::{FetchCache, FileLoader, LoaderTransport, Transport};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub(crate) struct SheetEntry {
    pub sheet: Arc<StyleSheet>,
    pub disabled: bool,
}

/// Everything guarded by the tree lock
pub(crate) struct TreeState {
    pub tree: DomTree,
    pub root: NodeId,
    pub ids: HashMap<String, NodeId>,
    pub names: HashMap<String, NodeId>,
    pub sheets: Vec<SheetEntry>,
    /// Built lazily from enabled sheets; dropped on any sheet change
    pub rule_index: Option<Arc<RuleIndex>>,
    /// Stamps every computed style and render state
    pub style_generation: Generation,
    pub listeners: Vec<ListenerEntry>,
    pub next_listener_id: u64,
    pub collections: HashMap<u64, CollectionCache>,
    pub next_collection_id: u64,
    pub ui: HashMap<NodeId, Arc<dyn UiNode>>,
}

pub(crate) struct Shared {
    pub state: Mutex<TreeState>,
    pub config: DocumentConfig,
    pub fetch: FetchCache,
    pub parser: Arc<dyn StyleSheetParser>,
}

/// Live document
#[derive(Clone)]
pub struct Document {
    pub(crate) shared: Arc<Shared>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("url", &self.shared.config.url.as_ref().map(|u| u.as_str()))
            .finish_non_exhaustive()
    }
}

/// Builder for [`Document`]
#[derive(Default)]
pub struct DocumentBuilder {
    config: DocumentConfig,
    transport: Option<Arc<dyn Transport>>,
    parser: Option<Arc<dyn StyleSheetParser>>,
}

impl DocumentBuilder {
    pub fn config(mut self, config: DocumentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn parser(mut self, parser: Arc<dyn StyleSheetParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn build(self) -> Document {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(LoaderTransport::new(FileLoader)));
        let fetch = FetchCache::new(transport)
            .with_base(self.config.url.clone())
            .with_user_agent(&self.config.user_agent);
        fetch.set_enabled(self.config.images_enabled);

        let mut tree = DomTree::new();
        let root = tree.insert(Node::new(NodeData::Document));
        tracing::debug!(
            "document created ({})",
            self.config.url.as_ref().map_or("about:blank", |u| u.as_str())
        );

        let state = TreeState {
            tree,
            root,
            ids: HashMap::new(),
            names: HashMap::new(),
            sheets: Vec::new(),
            rule_index: None,
            style_generation: Generation::INITIAL,
            listeners: Vec::new(),
            next_listener_id: 0,
            collections: HashMap::new(),
            next_collection_id: 0,
            ui: HashMap::new(),
        };
        Document {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                config: self.config,
                fetch,
                parser: self.parser.unwrap_or_else(|| Arc::new(CssParser::new())),
            }),
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        DocumentBuilder::default().build()
    }

    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::default()
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.shared.config
    }

    /// Takes the tree lock. The state is consistent at every unlock point,
    /// so a poisoned lock is recovered rather than propagated.
    pub(crate) fn lock(&self) -> MutexGuard<'_, TreeState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether two handles share one document
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        self.lock().root
    }

    // ------------------------------------------------------------------
    // Node creation
    // ------------------------------------------------------------------

    /// Creates a detached element
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.lock().tree.insert(Node::element(tag))
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.lock().tree.insert(Node::text(text))
    }

    pub fn create_comment(&self, text: &str) -> NodeId {
        self.lock()
            .tree
            .insert(Node::new(NodeData::Comment(text.to_string())))
    }

    pub fn create_processing_instruction(&self, target: &str, data: &str) -> NodeId {
        self.lock()
            .tree
            .insert(Node::new(NodeData::ProcessingInstruction {
                target: target.to_string(),
                data: data.to_string(),
            }))
    }

    pub fn create_fragment(&self) -> NodeId {
        self.lock().tree.insert(Node::new(NodeData::Fragment))
    }

    /// Number of live nodes, attached or not
    pub fn node_count(&self) -> usize {
        self.lock().tree.len()
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    /// Runs `f` against a read-only view of `id` under the tree lock.
    pub fn with_node<R>(&self, id: NodeId, f: impl FnOnce(NodeRef<'_>) -> R) -> Result<R> {
        let state = self.lock();
        let view = NodeRef::new(&state, id)?;
        Ok(f(view))
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.lock().tree.contains(id)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.lock().node(id)?.parent)
    }

    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.lock().node(id)?.children.clone())
    }

    pub fn child_count(&self, id: NodeId) -> Result<usize> {
        Ok(self.lock().node(id)?.children.len())
    }

    pub fn node_kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.lock().node(id)?.kind())
    }

    pub fn tag_name(&self, id: NodeId) -> Result<String> {
        Ok(self.lock().element(id)?.tag.clone())
    }

    pub fn attribute(&self, element: NodeId, name: &str) -> Result<Option<String>> {
        let state = self.lock();
        let el = state.element(element)?;
        Ok(el.attributes.get(&name.to_ascii_lowercase()).map(str::to_string))
    }

    pub fn has_attribute(&self, element: NodeId, name: &str) -> Result<bool> {
        let state = self.lock();
        Ok(state.element(element)?.attributes.has(&name.to_ascii_lowercase()))
    }

    /// Attribute names in the order they were first set
    pub fn attribute_names(&self, element: NodeId) -> Result<Vec<String>> {
        let state = self.lock();
        let el = state.element(element)?;
        Ok(el.attributes.names().into_iter().map(str::to_string).collect())
    }

    /// Character data of a text, comment or processing-instruction node
    pub fn text(&self, id: NodeId) -> Result<String> {
        let state = self.lock();
        state
            .node(id)?
            .char_data()
            .map(str::to_string)
            .ok_or_else(|| DomError::ReferenceNotFound(format!("node {id} has no character data")))
    }

    /// Concatenated text of all descendant text nodes in document order
    pub fn text_content(&self, id: NodeId) -> Result<String> {
        let state = self.lock();
        let node = state.node(id)?;
        if let Some(data) = node.char_data() {
            return Ok(data.to_string());
        }
        let mut out = String::new();
        for d in state.descendants(id) {
            if let Some(NodeData::Text(s)) = state.tree.get(d).map(|n| &n.data) {
                out.push_str(s);
            }
        }
        Ok(out)
    }

    /// Whether `id` is reachable from the document node
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.lock().is_connected(id)
    }

    /// Whether `node` is `ancestor` or one of its descendants
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.lock().is_ancestor_or_self(ancestor, node)
    }

    // ------------------------------------------------------------------
    // Id / name registry
    // ------------------------------------------------------------------

    pub fn lookup_by_id(&self, id: &str) -> Option<NodeId> {
        self.lock().ids.get(id).copied()
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<NodeId> {
        self.lock().names.get(name).copied()
    }

    /// Maps `id` to `element`, replacing any previous owner
    pub fn set_indexed_id(&self, id: &str, element: NodeId) -> Result<()> {
        let mut state = self.lock();
        state.element(element)?;
        state.ids.insert(id.to_string(), element);
        Ok(())
    }

    pub fn remove_indexed_id(&self, id: &str) -> Option<NodeId> {
        self.lock().ids.remove(id)
    }

    pub fn set_indexed_name(&self, name: &str, element: NodeId) -> Result<()> {
        let mut state = self.lock();
        state.element(element)?;
        state.names.insert(name.to_string(), element);
        Ok(())
    }

    pub fn remove_indexed_name(&self, name: &str) -> Option<NodeId> {
        self.lock().names.remove(name)
    }
}

impl TreeState {
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.tree.get(id).ok_or_else(|| DomError::missing(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.tree.get_mut(id).ok_or_else(|| DomError::missing(id))
    }

    pub fn element(&self, id: NodeId) -> Result<&ElementData> {
        self.node(id)?
            .as_element()
            .ok_or_else(|| DomError::not_element(id))
    }

    pub fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData> {
        self.node_mut(id)?
            .as_element_mut()
            .ok_or_else(|| DomError::not_element(id))
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id).and_then(|n| n.parent)
    }

    /// Ancestors of `id`, nearest first
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent_of(p);
        }
        out
    }

    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent_of(n);
        }
        false
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.tree.contains(id) && self.is_ancestor_or_self(self.root, id)
    }

    /// Whether `id` or any ancestor is in bulk-load mode
    pub fn is_suspended(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(n) = current {
            match self.tree.get(n) {
                Some(node) if node.notifications_suspended => return true,
                Some(node) => current = node.parent,
                None => return false,
            }
        }
        false
    }

    /// Descendants of `id` in document order, excluding `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.tree.get(id) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(n) = stack.pop() {
            out.push(n);
            if let Some(node) = self.tree.get(n) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// `id` followed by its descendants
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        out.extend(self.descendants(id));
        out
    }

    /// Siblings after `id` in its parent's child list
    pub fn following_siblings(&self, id: NodeId) -> Vec<NodeId> {
        let Some(parent) = self.parent_of(id).and_then(|p| self.tree.get(p)) else {
            return Vec::new();
        };
        match parent.children.iter().position(|c| *c == id) {
            Some(pos) => parent.children[pos + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    /// Advances the subtree generation of `id` and every ancestor
    pub fn bump_generation(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(n) = current {
            match self.tree.get_mut(n) {
                Some(node) => {
                    node.subtree_generation.advance();
                    current = node.parent;
                }
                None => break,
            }
        }
    }

    /// Indexes the ids and names of every element in the subtree
    pub fn register_subtree(&mut self, id: NodeId) {
        for n in self.subtree(id) {
            let Some(el) = self.tree.get(n).and_then(Node::as_element) else {
                continue;
            };
            let id_attr = el.attributes.get("id").map(str::to_string);
            let name_attr = el.attributes.get("name").map(str::to_string);
            if let Some(v) = id_attr {
                self.ids.insert(v, n);
            }
            if let Some(v) = name_attr {
                self.names.insert(v, n);
            }
        }
    }

    /// Drops index entries that still point into the subtree
    pub fn unregister_subtree(&mut self, id: NodeId) {
        for n in self.subtree(id) {
            let Some(el) = self.tree.get(n).and_then(Node::as_element) else {
                continue;
            };
            let id_attr = el.attributes.get("id").map(str::to_string);
            let name_attr = el.attributes.get("name").map(str::to_string);
            if let Some(v) = id_attr {
                unindex(&mut self.ids, &v, n);
            }
            if let Some(v) = name_attr {
                unindex(&mut self.names, &v, n);
            }
        }
    }

    pub fn sibling_rules_active(&self) -> bool {
        self.rule_index
            .as_ref()
            .is_some_and(|index| index.has_sibling_rules())
    }
}

/// Removes `key` only while it still maps to `owner`
pub(crate) fn unindex(map: &mut HashMap<String, NodeId>, key: &str, owner: NodeId) {
    if map.get(key) == Some(&owner) {
        map.remove(key);
    }
}

/// Read-only node view, valid while the tree lock is held
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    state: &'a TreeState,
    id: NodeId,
    node: &'a Node,
}

impl<'a> NodeRef<'a> {
    pub(crate) fn new(state: &'a TreeState, id: NodeId) -> Result<Self> {
        let node = state.node(id)?;
        Ok(Self { state, id, node })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    pub fn is_element(&self) -> bool {
        self.node.is_element()
    }

    /// Lowercase tag name, for elements
    pub fn tag_name(&self) -> Option<&'a str> {
        self.node.as_element().map(|e| e.tag.as_str())
    }

    pub fn element_kind(&self) -> Option<crate::ElementKind> {
        self.node.as_element().map(|e| e.kind)
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.node.as_element().and_then(|e| e.attributes.get(name))
    }

    pub fn char_data(&self) -> Option<&'a str> {
        self.node.char_data()
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.node
            .parent
            .and_then(|p| NodeRef::new(self.state, p).ok())
    }

    pub fn children(&self) -> &'a [NodeId] {
        &self.node.children
    }
}

impl<'a> SelectorElement for NodeRef<'a> {
    fn local_name(&self) -> &str {
        self.tag_name().unwrap_or("")
    }

    fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    fn classes(&self) -> impl Iterator<Item = &str> {
        self.node
            .as_element()
            .into_iter()
            .flat_map(|e| e.attributes.class_names())
    }

    fn has_class(&self, name: &str) -> bool {
        self.classes().any(|c| c == name)
    }

    fn has_pseudo_state(&self, name: &str) -> bool {
        self.node
            .as_element()
            .is_some_and(|e| e.has_pseudo_state(name))
    }

    fn parent_element(&self) -> Option<Self> {
        self.parent().filter(|p| p.is_element())
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let parent = self.parent()?;
        let siblings = parent.children();
        let pos = siblings.iter().position(|c| *c == self.id)?;
        siblings[..pos]
            .iter()
            .rev()
            .filter_map(|s| NodeRef::new(self.state, *s).ok())
            .find(|s| s.is_element())
    }

    fn is_same(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
