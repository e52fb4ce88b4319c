//! Node operations
//!
//! appendChild, insertBefore, replaceChild, removeChild, normalize,
//! cloneNode and attribute writes. Every operation runs under the tree lock
//! and reports its events once the lock is released.

use crate::NodeId;
use crate::bus::{DocumentEvent, Effects};
use crate::document::{Document, TreeState, unindex};
use crate::error::{DomError, Result};
use crate::node::{Node, NodeData};

/// Insertion point within a parent's child list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertAt {
    End,
    Before(NodeId),
    After(NodeId),
    Index(usize),
}

impl TreeState {
    fn check_insert(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let p = self.node(parent)?;
        self.node(child)?;
        if !p.can_have_children() {
            return Err(DomError::InvalidModification(format!(
                "node {parent} cannot have children"
            )));
        }
        if child == self.root {
            return Err(DomError::InvalidModification(
                "the document node cannot be inserted".into(),
            ));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(DomError::InvalidModification(format!(
                "node {child} is an ancestor of {parent}"
            )));
        }
        Ok(())
    }

    fn child_position(&self, parent: NodeId, child: NodeId) -> Result<usize> {
        self.node(parent)?
            .children
            .iter()
            .position(|c| *c == child)
            .ok_or_else(|| DomError::not_child(child, parent))
    }

    /// Turns an insertion point into "before this sibling" (or the end)
    fn resolve(&self, parent: NodeId, at: InsertAt) -> Result<Option<NodeId>> {
        let children = &self.node(parent)?.children;
        match at {
            InsertAt::End => Ok(None),
            InsertAt::Before(r) => {
                self.child_position(parent, r)?;
                Ok(Some(r))
            }
            InsertAt::After(r) => {
                let pos = self.child_position(parent, r)?;
                Ok(children.get(pos + 1).copied())
            }
            InsertAt::Index(index) => {
                let len = children.len();
                if index > len {
                    return Err(DomError::IndexOutOfRange { index, len });
                }
                Ok(children.get(index).copied())
            }
        }
    }

    /// Children changed under `parent`
    fn structure_changed(&mut self, parent: NodeId, fx: &mut Effects) {
        self.bump_generation(parent);
        if !self.is_suspended(parent) {
            self.forget_render_upward(parent);
            fx.push(DocumentEvent::StructureInvalidated(parent));
        }
        if self.sibling_rules_active() {
            let children = self.tree.get(parent).map(|p| p.children.clone());
            for c in children.unwrap_or_default() {
                self.forget_style(c, true);
            }
        }
    }

    /// Detaches `child` from its parent, if any
    fn unlink(&mut self, child: NodeId, fx: &mut Effects) {
        let Some(parent) = self.parent_of(child) else {
            return;
        };
        if self.is_connected(child) {
            self.unregister_subtree(child);
        }
        if let Some(p) = self.tree.get_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.tree.get_mut(child) {
            c.parent = None;
        }
        self.forget_style(child, true);
        self.forget_render(child, true);
        self.structure_changed(parent, fx);
    }

    fn link(&mut self, parent: NodeId, child: NodeId, index: usize, fx: &mut Effects) -> Result<()> {
        let p = self.node_mut(parent)?;
        let index = index.min(p.children.len());
        p.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        if self.is_connected(parent) {
            self.register_subtree(child);
        }
        self.forget_style(child, true);
        self.forget_render(child, true);
        self.structure_changed(parent, fx);
        Ok(())
    }

    /// Moves `child` (detaching it first) so it sits before `before`
    fn place(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
        fx: &mut Effects,
    ) -> Result<()> {
        if before == Some(child) {
            return Ok(());
        }
        self.unlink(child, fx);
        let index = match before {
            Some(r) => self.child_position(parent, r)?,
            None => self.node(parent)?.children.len(),
        };
        self.link(parent, child, index, fx)
    }

    pub(crate) fn insert(
        &mut self,
        parent: NodeId,
        child: NodeId,
        at: InsertAt,
        fx: &mut Effects,
    ) -> Result<()> {
        self.check_insert(parent, child)?;
        let before = self.resolve(parent, at)?;

        if matches!(self.node(child)?.data, NodeData::Fragment) {
            let kids = self.node(child)?.children.clone();
            for kid in kids {
                self.place(parent, kid, before, fx)?;
            }
            return Ok(());
        }
        self.place(parent, child, before, fx)
    }

    fn replace_child(
        &mut self,
        parent: NodeId,
        new: NodeId,
        old: NodeId,
        fx: &mut Effects,
    ) -> Result<()> {
        self.child_position(parent, old)?;
        if new == old {
            return Ok(());
        }
        self.insert(parent, new, InsertAt::Before(old), fx)?;
        self.unlink(old, fx);
        Ok(())
    }

    fn normalize(&mut self, id: NodeId, fx: &mut Effects) -> Result<bool> {
        let children = self.node(id)?.children.clone();
        let mut changed = false;
        let mut head: Option<NodeId> = None;
        let mut kept = Vec::with_capacity(children.len());
        let mut merged = Vec::new();

        for c in children {
            let text = match &self.node(c)?.data {
                NodeData::Text(s) => Some(s.clone()),
                _ => None,
            };
            match (text, head) {
                (Some(s), Some(h)) => {
                    if let Some(data) = self.node_mut(h)?.char_data_mut() {
                        data.push_str(&s);
                    }
                    merged.push(c);
                }
                (Some(_), None) => {
                    head = Some(c);
                    kept.push(c);
                }
                (None, _) => {
                    head = None;
                    kept.push(c);
                    changed |= self.normalize(c, fx)?;
                }
            }
        }

        if merged.is_empty() {
            return Ok(changed);
        }
        self.node_mut(id)?.children = kept;
        for m in merged {
            self.free_subtree(m, fx);
        }
        self.bump_generation(id);
        if !self.is_suspended(id) {
            self.forget_render_upward(id);
            fx.push(DocumentEvent::StructureInvalidated(id));
        }
        Ok(true)
    }

    fn clone_node(&mut self, id: NodeId, deep: bool) -> Result<NodeId> {
        if id == self.root {
            return Err(DomError::Unsupported("cloning the document node"));
        }
        let copy = self.node(id)?.clone_detached();
        let new = self.tree.insert(copy);
        if deep {
            let children = self.node(id)?.children.clone();
            for c in children {
                let cc = self.clone_node(c, true)?;
                self.node_mut(cc)?.parent = Some(new);
                self.node_mut(new)?.children.push(cc);
            }
        }
        Ok(new)
    }

    fn attribute_changed(
        &mut self,
        el: NodeId,
        name: &str,
        old: Option<&str>,
        new: Option<&str>,
        fx: &mut Effects,
    ) {
        let connected = self.is_connected(el);
        let index = match name {
            "id" => Some(&mut self.ids),
            "name" => Some(&mut self.names),
            _ => None,
        };
        if let Some(map) = index {
            if let Some(old) = old {
                unindex(map, old, el);
            }
            if let (true, Some(new)) = (connected, new) {
                map.insert(new.to_string(), el);
            }
        }

        match name {
            "style" => {
                if let Some(node) = self.tree.get_mut(el) {
                    node.forget_local_style();
                }
                self.forget_style(el, false);
                self.forget_render(el, true);
            }
            "id" | "class" => {
                self.forget_style(el, true);
                self.forget_sibling_styles(el);
            }
            _ => self.forget_render(el, false),
        }

        self.bump_generation(el);
        if !self.is_suspended(el) {
            fx.push(DocumentEvent::Invalidated(el));
        }
    }

    fn set_attribute(
        &mut self,
        el: NodeId,
        name: &str,
        value: &str,
        fx: &mut Effects,
    ) -> Result<Option<String>> {
        let name = name.to_ascii_lowercase();
        let old = self.element_mut(el)?.attributes.set(&name, value);
        if old.as_deref() != Some(value) {
            self.attribute_changed(el, &name, old.as_deref(), Some(value), fx);
        }
        Ok(old)
    }

    fn remove_attribute(&mut self, el: NodeId, name: &str, fx: &mut Effects) -> Result<String> {
        let name = name.to_ascii_lowercase();
        let old = self
            .element_mut(el)?
            .attributes
            .remove(&name)
            .ok_or_else(|| DomError::ReferenceNotFound(format!("attribute '{name}' on {el}")))?;
        self.attribute_changed(el, &name, Some(&old), None, fx);
        Ok(old)
    }

    fn set_text(&mut self, id: NodeId, text: &str, fx: &mut Effects) -> Result<()> {
        if id == self.root {
            return Err(DomError::InvalidModification(
                "the document node has no settable text".into(),
            ));
        }
        let data = self
            .node_mut(id)?
            .char_data_mut()
            .ok_or_else(|| DomError::ReferenceNotFound(format!("node {id} has no character data")))?;
        if data.as_str() == text {
            return Ok(());
        }
        data.clear();
        data.push_str(text);
        self.bump_generation(id);
        if !self.is_suspended(id) {
            self.forget_render_upward(id);
            fx.push(DocumentEvent::Invalidated(id));
        }
        Ok(())
    }

    fn set_text_content(&mut self, id: NodeId, text: &str, fx: &mut Effects) -> Result<()> {
        if self.node(id)?.char_data().is_some() {
            return self.set_text(id, text, fx);
        }
        let children = self.node(id)?.children.clone();
        for c in children {
            self.unlink(c, fx);
            if self.node(c)?.char_data().is_some() {
                self.free_subtree(c, fx);
            }
        }
        if !text.is_empty() {
            let t = self.tree.insert(Node::text(text));
            self.insert(id, t, InsertAt::End, fx)?;
        }
        Ok(())
    }

    /// Frees `id` and its descendants. The caller has already unlinked it.
    fn free_subtree(&mut self, id: NodeId, fx: &mut Effects) {
        for n in self.subtree(id) {
            self.tree.remove(n);
            fx.released.extend(self.ui.remove(&n));
        }
    }

    fn discard(&mut self, id: NodeId, fx: &mut Effects) -> Result<()> {
        let node = self.node(id)?;
        if id == self.root {
            return Err(DomError::InvalidModification(
                "the document node cannot be discarded".into(),
            ));
        }
        if node.parent.is_some() {
            return Err(DomError::InvalidModification(format!(
                "node {id} is still attached"
            )));
        }
        self.free_subtree(id, fx);
        Ok(())
    }

    fn set_notifications_suspended(&mut self, id: NodeId, on: bool, fx: &mut Effects) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.notifications_suspended == on {
            return Ok(());
        }
        node.notifications_suspended = on;
        if !on && !self.is_suspended(id) {
            tracing::debug!("bulk load of {} complete", id);
            self.forget_render_upward(id);
            fx.push(DocumentEvent::NodeLoaded(id));
        }
        Ok(())
    }
}

impl Document {
    /// Appends `child` to `parent`, detaching it from any previous parent.
    /// A fragment contributes its children instead of itself.
    pub fn append(&self, parent: NodeId, child: NodeId) -> Result<NodeId> {
        self.mutate(|state, fx| state.insert(parent, child, InsertAt::End, fx))?;
        Ok(child)
    }

    /// Inserts `child` before `reference`, or at the end when `None`
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<NodeId> {
        let at = reference.map_or(InsertAt::End, InsertAt::Before);
        self.mutate(|state, fx| state.insert(parent, child, at, fx))?;
        Ok(child)
    }

    pub fn insert_after(&self, parent: NodeId, child: NodeId, reference: NodeId) -> Result<NodeId> {
        self.mutate(|state, fx| state.insert(parent, child, InsertAt::After(reference), fx))?;
        Ok(child)
    }

    /// Inserts `child` before the node currently at `index`; `index` may
    /// equal the child count.
    pub fn insert_at(&self, parent: NodeId, child: NodeId, index: usize) -> Result<NodeId> {
        self.mutate(|state, fx| state.insert(parent, child, InsertAt::Index(index), fx))?;
        Ok(child)
    }

    /// Puts `new` where `old` was; returns `old`, now detached
    pub fn replace_child(&self, parent: NodeId, new: NodeId, old: NodeId) -> Result<NodeId> {
        self.mutate(|state, fx| state.replace_child(parent, new, old, fx))?;
        Ok(old)
    }

    pub fn remove(&self, parent: NodeId, child: NodeId) -> Result<NodeId> {
        self.mutate(|state, fx| {
            state.child_position(parent, child)?;
            state.unlink(child, fx);
            Ok(child)
        })
    }

    pub fn remove_at(&self, parent: NodeId, index: usize) -> Result<NodeId> {
        self.mutate(|state, fx| {
            let children = &state.node(parent)?.children;
            let child = *children.get(index).ok_or(DomError::IndexOutOfRange {
                index,
                len: children.len(),
            })?;
            state.unlink(child, fx);
            Ok(child)
        })
    }

    /// Merges adjacent text nodes throughout the subtree. The merged-away
    /// nodes are discarded. Returns whether anything changed.
    pub fn normalize(&self, node: NodeId) -> Result<bool> {
        self.mutate(|state, fx| state.normalize(node, fx))
    }

    /// Detached copy of `node` with its attributes, and of its subtree when
    /// `deep`. Caches and pseudo-states are not copied.
    pub fn clone_node(&self, node: NodeId, deep: bool) -> Result<NodeId> {
        self.lock().clone_node(node, deep)
    }

    /// Sets an attribute, returning the previous value
    pub fn set_attribute(&self, element: NodeId, name: &str, value: &str) -> Result<Option<String>> {
        self.mutate(|state, fx| state.set_attribute(element, name, value, fx))
    }

    pub fn remove_attribute(&self, element: NodeId, name: &str) -> Result<String> {
        self.mutate(|state, fx| state.remove_attribute(element, name, fx))
    }

    /// Replaces the character data of a text, comment or PI node
    pub fn set_text(&self, node: NodeId, text: &str) -> Result<()> {
        self.mutate(|state, fx| state.set_text(node, text, fx))
    }

    /// Replaces all children with a single text node. Replaced text and
    /// comment children are freed; replaced elements stay detached until
    /// [`Document::discard`].
    pub fn set_text_content(&self, node: NodeId, text: &str) -> Result<()> {
        self.mutate(|state, fx| state.set_text_content(node, text, fx))
    }

    /// Frees a detached subtree. Handles into it become invalid.
    ///
    /// `remove`, `remove_at` and `replace_child` only detach: the node
    /// keeps its slot so it can be reinserted. Call this once a removed
    /// node is no longer wanted, or its slot is never reclaimed.
    pub fn discard(&self, node: NodeId) -> Result<()> {
        self.mutate(|state, fx| state.discard(node, fx))
    }

    /// Enters or leaves bulk-load mode for `node` and its subtree. Leaving
    /// it forgets render state and reports the node as loaded.
    pub fn set_notifications_suspended(&self, node: NodeId, suspended: bool) -> Result<()> {
        self.mutate(|state, fx| state.set_notifications_suspended(node, suspended, fx))
    }

    pub fn notifications_suspended(&self, node: NodeId) -> Result<bool> {
        Ok(self.lock().node(node)?.notifications_suspended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentListener;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Structure(Mutex<Vec<NodeId>>);

    impl DocumentListener for Structure {
        fn structure_invalidated(&self, _doc: &Document, node: NodeId) {
            self.0.lock().unwrap().push(node);
        }
    }

    fn tree() -> (Document, NodeId, NodeId, NodeId) {
        let doc = Document::new();
        let body = doc.create_element("body");
        let a = doc.create_element("p");
        let b = doc.create_element("p");
        doc.append(doc.root(), body).unwrap();
        doc.append(body, a).unwrap();
        doc.append(body, b).unwrap();
        (doc, body, a, b)
    }

    #[test]
    fn test_append_sets_parent() {
        let (doc, body, a, b) = tree();
        assert_eq!(doc.parent(a).unwrap(), Some(body));
        assert_eq!(doc.children(body).unwrap(), vec![a, b]);
    }

    #[test]
    fn test_insert_before_and_after() {
        let (doc, body, a, b) = tree();
        let c = doc.create_element("span");
        doc.insert_before(body, c, Some(b)).unwrap();
        assert_eq!(doc.children(body).unwrap(), vec![a, c, b]);

        doc.insert_after(body, c, b).unwrap();
        assert_eq!(doc.children(body).unwrap(), vec![a, b, c]);
    }

    #[test]
    fn test_insert_before_foreign_reference() {
        let (doc, body, _, _) = tree();
        let c = doc.create_element("span");
        let stray = doc.create_element("i");
        assert!(matches!(
            doc.insert_before(body, c, Some(stray)),
            Err(DomError::ReferenceNotFound(_))
        ));
        assert_eq!(doc.parent(c).unwrap(), None);
    }

    #[test]
    fn test_insert_at_bounds() {
        let (doc, body, a, b) = tree();
        let c = doc.create_element("span");
        assert_eq!(
            doc.insert_at(body, c, 3),
            Err(DomError::IndexOutOfRange { index: 3, len: 2 })
        );
        doc.insert_at(body, c, 2).unwrap();
        assert_eq!(doc.children(body).unwrap(), vec![a, b, c]);
        doc.insert_at(body, c, 0).unwrap();
        assert_eq!(doc.children(body).unwrap(), vec![c, a, b]);
    }

    #[test]
    fn test_insert_into_own_descendant_rejected() {
        let (doc, body, a, _) = tree();
        assert!(matches!(
            doc.append(a, body),
            Err(DomError::InvalidModification(_))
        ));
        assert!(matches!(
            doc.append(a, a),
            Err(DomError::InvalidModification(_))
        ));
    }

    #[test]
    fn test_text_cannot_have_children() {
        let doc = Document::new();
        let t = doc.create_text("x");
        let el = doc.create_element("b");
        assert!(matches!(
            doc.append(t, el),
            Err(DomError::InvalidModification(_))
        ));
    }

    #[test]
    fn test_fragment_children_inserted_in_order() {
        let (doc, body, a, b) = tree();
        let frag = doc.create_fragment();
        let x = doc.create_element("x");
        let y = doc.create_element("y");
        doc.append(frag, x).unwrap();
        doc.append(frag, y).unwrap();

        doc.insert_before(body, frag, Some(b)).unwrap();
        assert_eq!(doc.children(body).unwrap(), vec![a, x, y, b]);
        assert_eq!(doc.child_count(frag).unwrap(), 0);
    }

    #[test]
    fn test_replace_child() {
        let (doc, body, a, b) = tree();
        let c = doc.create_element("div");
        assert_eq!(doc.replace_child(body, c, a).unwrap(), a);
        assert_eq!(doc.children(body).unwrap(), vec![c, b]);
        assert_eq!(doc.parent(a).unwrap(), None);
    }

    #[test]
    fn test_remove_at() {
        let (doc, body, a, b) = tree();
        assert_eq!(
            doc.remove_at(body, 2),
            Err(DomError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(doc.remove_at(body, 0).unwrap(), a);
        assert_eq!(doc.children(body).unwrap(), vec![b]);
    }

    #[test]
    fn test_remove_non_child() {
        let (doc, body, a, _) = tree();
        let other = doc.create_element("div");
        doc.append(a, other).unwrap();
        assert_eq!(doc.remove(body, other), Err(DomError::not_child(other, body)));
    }

    #[test]
    fn test_structure_event_names_parent() {
        let (doc, body, a, _) = tree();
        let rec = Arc::new(Structure::default());
        let _sub = doc.subscribe(rec.clone());
        doc.remove(body, a).unwrap();
        assert_eq!(*rec.0.lock().unwrap(), vec![body]);
    }

    #[test]
    fn test_normalize_merges_runs() {
        let doc = Document::new();
        let p = doc.create_element("p");
        let t1 = doc.create_text("a");
        let t2 = doc.create_text("b");
        let br = doc.create_element("br");
        let t3 = doc.create_text("c");
        for n in [t1, t2, br, t3] {
            doc.append(p, n).unwrap();
        }

        assert!(doc.normalize(p).unwrap());
        assert_eq!(doc.children(p).unwrap(), vec![t1, br, t3]);
        assert_eq!(doc.text(t1).unwrap(), "ab");
        assert!(!doc.exists(t2));
        assert!(!doc.normalize(p).unwrap());
    }

    #[test]
    fn test_clone_node_copies_attributes_only() {
        let (doc, body, a, _) = tree();
        doc.set_attribute(a, "class", "x").unwrap();
        doc.append(a, doc.create_text("hi")).unwrap();
        doc.set_mouse_over(a, true).unwrap();

        let shallow = doc.clone_node(a, false).unwrap();
        assert_eq!(doc.parent(shallow).unwrap(), None);
        assert_eq!(doc.attribute(shallow, "class").unwrap().as_deref(), Some("x"));
        assert_eq!(doc.child_count(shallow).unwrap(), 0);
        assert!(doc.pseudo_states(shallow).unwrap().is_empty());

        let deep = doc.clone_node(a, true).unwrap();
        assert_eq!(doc.text_content(deep).unwrap(), "hi");
        assert_eq!(doc.child_count(body).unwrap(), 2);
    }

    #[test]
    fn test_clone_document_unsupported() {
        let doc = Document::new();
        assert_eq!(
            doc.clone_node(doc.root(), true),
            Err(DomError::Unsupported("cloning the document node"))
        );
    }

    #[test]
    fn test_remove_missing_attribute() {
        let (doc, _, a, _) = tree();
        assert!(matches!(
            doc.remove_attribute(a, "title"),
            Err(DomError::ReferenceNotFound(_))
        ));
    }

    #[test]
    fn test_attribute_names_keep_first_set_order() {
        let (doc, _, a, _) = tree();
        doc.set_attribute(a, "Title", "t").unwrap();
        doc.set_attribute(a, "class", "x").unwrap();
        doc.set_attribute(a, "title", "u").unwrap();
        assert_eq!(doc.attribute_names(a).unwrap(), vec!["title", "class"]);
        assert!(doc.has_attribute(a, "TITLE").unwrap());
        doc.remove_attribute(a, "title").unwrap();
        assert!(!doc.has_attribute(a, "title").unwrap());
    }

    #[test]
    fn test_set_text_on_document_node_is_invalid() {
        let (doc, ..) = tree();
        assert!(matches!(
            doc.set_text(doc.root(), "x"),
            Err(DomError::InvalidModification(_))
        ));
    }

    #[test]
    fn test_set_text_content_replaces_children() {
        let (doc, body, a, _) = tree();
        doc.set_text_content(body, "plain").unwrap();
        assert_eq!(doc.child_count(body).unwrap(), 1);
        assert_eq!(doc.text_content(body).unwrap(), "plain");
        assert_eq!(doc.parent(a).unwrap(), None);
    }

    #[test]
    fn test_discard_requires_detached() {
        let (doc, body, a, _) = tree();
        assert!(matches!(doc.discard(a), Err(DomError::InvalidModification(_))));
        doc.remove(body, a).unwrap();
        doc.discard(a).unwrap();
        assert!(!doc.exists(a));
        assert!(matches!(doc.tag_name(a), Err(DomError::ReferenceNotFound(_))));
    }
}
