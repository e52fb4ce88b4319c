//! DOM nodes
//!
//! A node owns its ordered child handles and refers to its parent by
//! handle. Derived state (style caches, render slot) lives next to the
//! data it is derived from and is only touched under the tree lock.

use crate::NodeId;
use crate::attributes::AttributeMap;
use crate::element::ElementKind;
use crate::generation::Generation;
use crate::render::RenderSlot;
use crate::style::StyleCache;

/// Node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    Comment,
    ProcessingInstruction,
    Fragment,
}

#[derive(Debug)]
pub(crate) struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub data: NodeData,
    /// Set during bulk construction; suppresses render clearing and events
    pub notifications_suspended: bool,
    pub render: RenderSlot,
    /// Advanced whenever this node or anything below it changes
    pub subtree_generation: Generation,
}

#[derive(Debug)]
pub(crate) enum NodeData {
    Document,
    Element(ElementData),
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
    Fragment,
}

#[derive(Debug)]
pub(crate) struct ElementData {
    /// Lowercase tag name
    pub tag: String,
    pub kind: ElementKind,
    pub attributes: AttributeMap,
    pub pseudo_states: Vec<String>,
    pub style: StyleCache,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        let tag = tag.to_ascii_lowercase();
        Self {
            kind: ElementKind::from_tag(&tag),
            tag,
            attributes: AttributeMap::new(),
            pseudo_states: Vec::new(),
            style: StyleCache::default(),
        }
    }

    pub fn has_pseudo_state(&self, name: &str) -> bool {
        self.pseudo_states.iter().any(|s| s == name)
    }
}

impl Node {
    pub fn new(data: NodeData) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            data,
            notifications_suspended: false,
            render: RenderSlot::Uncomputed,
            subtree_generation: Generation::INITIAL,
        }
    }

    pub fn element(tag: &str) -> Self {
        Self::new(NodeData::Element(ElementData::new(tag)))
    }

    pub fn text(content: &str) -> Self {
        Self::new(NodeData::Text(content.to_string()))
    }

    pub fn kind(&self) -> NodeKind {
        match &self.data {
            NodeData::Document => NodeKind::Document,
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
            NodeData::ProcessingInstruction { .. } => NodeKind::ProcessingInstruction,
            NodeData::Fragment => NodeKind::Fragment,
        }
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    pub fn can_have_children(&self) -> bool {
        matches!(
            self.data,
            NodeData::Document | NodeData::Element(_) | NodeData::Fragment
        )
    }

    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Character data of text, comment and processing-instruction nodes
    pub fn char_data(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(s) | NodeData::Comment(s) => Some(s),
            NodeData::ProcessingInstruction { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn char_data_mut(&mut self) -> Option<&mut String> {
        match &mut self.data {
            NodeData::Text(s) | NodeData::Comment(s) => Some(s),
            NodeData::ProcessingInstruction { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Copy of the node's own data without links or derived state
    pub fn clone_detached(&self) -> Node {
        let data = match &self.data {
            NodeData::Document => NodeData::Document,
            NodeData::Element(e) => NodeData::Element(ElementData {
                tag: e.tag.clone(),
                kind: e.kind,
                attributes: e.attributes.clone(),
                pseudo_states: Vec::new(),
                style: StyleCache::default(),
            }),
            NodeData::Text(s) => NodeData::Text(s.clone()),
            NodeData::Comment(s) => NodeData::Comment(s.clone()),
            NodeData::ProcessingInstruction { target, data } => NodeData::ProcessingInstruction {
                target: target.clone(),
                data: data.clone(),
            },
            NodeData::Fragment => NodeData::Fragment,
        };
        Node::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_tag_is_lowercased() {
        let node = Node::element("DIV");
        let el = node.as_element().unwrap();
        assert_eq!(el.tag, "div");
        assert_eq!(el.kind, ElementKind::Div);
    }

    #[test]
    fn test_children_allowed() {
        assert!(Node::element("p").can_have_children());
        assert!(Node::new(NodeData::Fragment).can_have_children());
        assert!(!Node::text("x").can_have_children());
        assert!(!Node::new(NodeData::Comment("c".into())).can_have_children());
    }

    #[test]
    fn test_clone_detached_drops_state() {
        let mut node = Node::element("a");
        node.parent = Some(NodeId::new(3, 0));
        let el = node.as_element_mut().unwrap();
        el.attributes.set("href", "x.html");
        el.pseudo_states.push("hover".into());

        let copy = node.clone_detached();
        assert!(copy.parent.is_none());
        let el = copy.as_element().unwrap();
        assert_eq!(el.attributes.get("href"), Some("x.html"));
        assert!(el.pseudo_states.is_empty());
    }
}
