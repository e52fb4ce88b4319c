//! Style caches
//!
//! Each element caches its local style (from the `style` attribute) and
//! one computed style per pseudo name, the empty name being the default
//! rendering. Computed entries are stamped with the document style
//! generation; sheet changes advance it instead of visiting every element.
//!
//! Computation order: element-kind defaults, then matching sheet rules in
//! sheet order, then local declarations.

use crate::NodeId;
use crate::bus::{DocumentEvent, Effects};
use crate::document::{Document, NodeRef, SheetEntry, TreeState};
use crate::error::{DomError, Result};
use crate::generation::Generation;
use crate::node::Node;
use arbor_css::{RuleIndex, StyleProperties, StyleSheet, StyleSheetParser};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub(crate) struct StyleCache {
    local: Option<Arc<StyleProperties>>,
    computed: HashMap<String, (Generation, Arc<StyleProperties>)>,
    recomputes: u64,
}

impl StyleCache {
    fn computed(&self, key: &str, generation: Generation) -> Option<Arc<StyleProperties>> {
        self.computed
            .get(key)
            .filter(|(g, _)| *g == generation)
            .map(|(_, style)| Arc::clone(style))
    }

    pub fn forget_local(&mut self) {
        self.local = None;
    }

    pub fn forget_computed(&mut self) {
        self.computed.clear();
    }
}

const HOVER: &str = "hover";

impl TreeState {
    /// Drops computed styles (and render state) of `id`, and of its
    /// descendants when `deep`.
    pub(crate) fn forget_style(&mut self, id: NodeId, deep: bool) {
        let targets = if deep { self.subtree(id) } else { vec![id] };
        for t in targets {
            if let Some(node) = self.tree.get_mut(t) {
                if let Some(el) = node.as_element_mut() {
                    el.style.forget_computed();
                }
                node.render.invalidate();
            }
        }
    }

    /// Sibling rules make following siblings depend on this node
    pub(crate) fn forget_sibling_styles(&mut self, id: NodeId) {
        if self.sibling_rules_active() {
            for sibling in self.following_siblings(id) {
                self.forget_style(sibling, true);
            }
        }
    }

    pub(crate) fn rule_index(&mut self) -> Arc<RuleIndex> {
        if let Some(index) = &self.rule_index {
            return Arc::clone(index);
        }
        let enabled = self
            .sheets
            .iter()
            .filter(|entry| !entry.disabled)
            .map(|entry| Arc::clone(&entry.sheet))
            .collect();
        let index = Arc::new(RuleIndex::new(enabled));
        self.rule_index = Some(Arc::clone(&index));
        index
    }

    pub(crate) fn local_style(
        &mut self,
        id: NodeId,
        parser: &dyn StyleSheetParser,
    ) -> Result<Arc<StyleProperties>> {
        let el = self.element(id)?;
        if let Some(local) = &el.style.local {
            return Ok(Arc::clone(local));
        }
        let props = match el.attributes.get("style") {
            Some(text) if !text.trim().is_empty() => match parser.parse_declarations(text) {
                Ok(decls) => StyleProperties::from_declarations(&decls),
                Err(e) => {
                    let with_id = el
                        .attributes
                        .get("id")
                        .map(|v| format!(" with id '{v}'"))
                        .unwrap_or_default();
                    tracing::warn!(
                        "unable to parse style attribute of <{}>{}: {}",
                        el.tag,
                        with_id,
                        e
                    );
                    StyleProperties::new()
                }
            },
            _ => StyleProperties::new(),
        };
        let props = Arc::new(props);
        self.element_mut(id)?.style.local = Some(Arc::clone(&props));
        Ok(props)
    }

    pub(crate) fn computed_style(
        &mut self,
        id: NodeId,
        pseudo: Option<&str>,
        parser: &dyn StyleSheetParser,
    ) -> Result<Arc<StyleProperties>> {
        let key = pseudo.map(str::to_ascii_lowercase).unwrap_or_default();
        let generation = self.style_generation;
        if let Some(hit) = self.element(id)?.style.computed(&key, generation) {
            return Ok(hit);
        }

        let index = self.rule_index();
        let local = self.local_style(id, parser)?;
        let mut props = StyleProperties::new();
        {
            let view = NodeRef::new(&*self, id)?;
            if let Some(kind) = view.element_kind() {
                for (property, value) in kind.default_style() {
                    props.set(property, value);
                }
            }
            let requested = (!key.is_empty()).then_some(key.as_str());
            for rule in index.matching_rules(&view, requested) {
                props.apply(&rule.declarations);
            }
        }
        props.merge(&local);

        let props = Arc::new(props);
        let el = self.element_mut(id)?;
        el.style.computed.insert(key, (generation, Arc::clone(&props)));
        el.style.recomputes += 1;
        Ok(props)
    }

    /// Style sheet list changed: everything computed is now stale
    fn sheets_changed(&mut self, fx: &mut Effects) {
        self.rule_index = None;
        self.style_generation.advance();
        fx.push(DocumentEvent::AllInvalidated);
    }

    fn set_pseudo_state(
        &mut self,
        id: NodeId,
        name: &str,
        on: bool,
        fx: &mut Effects,
    ) -> Result<bool> {
        let name = name.to_ascii_lowercase();
        let el = self.element_mut(id)?;
        let present = el.has_pseudo_state(&name);
        if present == on {
            return Ok(false);
        }
        if on {
            el.pseudo_states.push(name.clone());
        } else {
            el.pseudo_states.retain(|s| *s != name);
        }

        self.forget_style(id, false);
        self.bump_generation(id);

        let index = self.rule_index();
        let mut scope = self.descendants(id);
        if index.has_sibling_rules() {
            for sibling in self.following_siblings(id) {
                scope.extend(self.subtree(sibling));
            }
        }
        let (self_affected, affected) = {
            let state: &TreeState = self;
            let anchor = NodeRef::new(state, id)?;
            let affected: Vec<NodeId> = scope
                .into_iter()
                .filter(|d| {
                    NodeRef::new(state, *d).is_ok_and(|view| {
                        view.is_element()
                            && index.affected_by_pseudo_in_ancestor(&view, &anchor, &name)
                    })
                })
                .collect();
            (
                index.affected_by_pseudo_in_ancestor(&anchor, &anchor, &name),
                affected,
            )
        };
        for d in &affected {
            self.forget_style(*d, false);
            self.forget_render(*d, true);
        }

        if !self.is_suspended(id) {
            if self_affected {
                fx.push(DocumentEvent::LookInvalidated(id));
            }
            for d in affected {
                fx.push(DocumentEvent::Invalidated(d));
            }
        }
        Ok(true)
    }
}

impl Document {
    /// Declarations from the element's `style` attribute only
    pub fn current_style(&self, element: NodeId) -> Result<Arc<StyleProperties>> {
        self.lock()
            .local_style(element, self.shared.parser.as_ref())
    }

    /// Computed style for the default rendering
    pub fn computed_style(&self, element: NodeId) -> Result<Arc<StyleProperties>> {
        self.computed_style_for(element, None)
    }

    /// Computed style as if `pseudo` (e.g. `hover`) applied to the element
    pub fn computed_style_for(
        &self,
        element: NodeId,
        pseudo: Option<&str>,
    ) -> Result<Arc<StyleProperties>> {
        self.lock()
            .computed_style(element, pseudo, self.shared.parser.as_ref())
    }

    /// Whether a fresh computed style is cached for `pseudo`
    pub fn has_cached_computed_style(&self, element: NodeId, pseudo: Option<&str>) -> Result<bool> {
        let state = self.lock();
        let key = pseudo.map(str::to_ascii_lowercase).unwrap_or_default();
        Ok(state
            .element(element)?
            .style
            .computed(&key, state.style_generation)
            .is_some())
    }

    /// How many times a computed style has been built for `element`
    pub fn style_recompute_count(&self, element: NodeId) -> Result<u64> {
        Ok(self.lock().element(element)?.style.recomputes)
    }

    /// Setting the style object directly is not supported; write the
    /// `style` attribute instead.
    pub fn set_style(&self, _element: NodeId, _style: StyleProperties) -> Result<()> {
        Err(DomError::Unsupported("cannot set style property"))
    }

    // ------------------------------------------------------------------
    // Style sheets
    // ------------------------------------------------------------------

    /// Appends `sheet`, returning its position
    pub fn add_style_sheet(&self, sheet: StyleSheet) -> usize {
        let added = self.mutate(|state, fx| {
            state.sheets.push(SheetEntry {
                sheet: Arc::new(sheet),
                disabled: false,
            });
            state.sheets_changed(fx);
            Ok(state.sheets.len() - 1)
        });
        added.unwrap_or_default()
    }

    pub fn remove_style_sheet(&self, index: usize) -> Result<Arc<StyleSheet>> {
        self.mutate(|state, fx| {
            let len = state.sheets.len();
            if index >= len {
                return Err(DomError::IndexOutOfRange { index, len });
            }
            let entry = state.sheets.remove(index);
            state.sheets_changed(fx);
            Ok(entry.sheet)
        })
    }

    pub fn set_style_sheet_disabled(&self, index: usize, disabled: bool) -> Result<()> {
        self.mutate(|state, fx| {
            let len = state.sheets.len();
            let entry = state
                .sheets
                .get_mut(index)
                .ok_or(DomError::IndexOutOfRange { index, len })?;
            if entry.disabled != disabled {
                entry.disabled = disabled;
                state.sheets_changed(fx);
            }
            Ok(())
        })
    }

    pub fn is_style_sheet_disabled(&self, index: usize) -> Result<bool> {
        let state = self.lock();
        let len = state.sheets.len();
        state
            .sheets
            .get(index)
            .map(|entry| entry.disabled)
            .ok_or(DomError::IndexOutOfRange { index, len })
    }

    pub fn style_sheets(&self) -> Vec<Arc<StyleSheet>> {
        self.lock()
            .sheets
            .iter()
            .map(|entry| Arc::clone(&entry.sheet))
            .collect()
    }

    pub fn style_sheet_count(&self) -> usize {
        self.lock().sheets.len()
    }

    // ------------------------------------------------------------------
    // Pseudo-states
    // ------------------------------------------------------------------

    /// Sets or clears a dynamic pseudo-state. Only descendants whose rules
    /// depend on this element's state are invalidated. Returns whether the
    /// state changed.
    pub fn set_pseudo_state(&self, element: NodeId, name: &str, on: bool) -> Result<bool> {
        self.mutate(|state, fx| state.set_pseudo_state(element, name, on, fx))
    }

    pub fn set_mouse_over(&self, element: NodeId, over: bool) -> Result<bool> {
        self.set_pseudo_state(element, HOVER, over)
    }

    pub fn pseudo_states(&self, element: NodeId) -> Result<Vec<String>> {
        Ok(self.lock().element(element)?.pseudo_states.clone())
    }
}

impl Node {
    pub(crate) fn forget_local_style(&mut self) {
        if let Some(el) = self.as_element_mut() {
            el.style.forget_local();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_css::StyleRule;

    fn doc_with_div() -> (Document, NodeId) {
        let doc = Document::new();
        let div = doc.create_element("div");
        doc.append(doc.root(), div).unwrap();
        (doc, div)
    }

    #[test]
    fn test_defaults_then_rules_then_local() {
        let (doc, div) = doc_with_div();
        doc.add_style_sheet(
            StyleSheet::new().with_rule(
                StyleRule::new("div", vec![])
                    .declare("display", "inline")
                    .declare("color", "red"),
            ),
        );
        doc.set_attribute(div, "style", "color: green").unwrap();

        let style = doc.computed_style(div).unwrap();
        assert_eq!(style.get("display"), Some("inline"));
        assert_eq!(style.get("color"), Some("green"));
    }

    #[test]
    fn test_computed_style_cached() {
        let (doc, div) = doc_with_div();
        let a = doc.computed_style(div).unwrap();
        let b = doc.computed_style(div).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(doc.style_recompute_count(div).unwrap(), 1);
        assert!(doc.has_cached_computed_style(div, None).unwrap());
        assert!(!doc.has_cached_computed_style(div, Some("hover")).unwrap());
    }

    #[test]
    fn test_local_style_parse_failure_is_empty() {
        struct Failing;
        impl StyleSheetParser for Failing {
            fn parse_sheet(&self, _css: &str) -> std::result::Result<StyleSheet, arbor_css::CssError> {
                Ok(StyleSheet::new())
            }
            fn parse_declarations(
                &self,
                _css: &str,
            ) -> std::result::Result<Vec<arbor_css::Declaration>, arbor_css::CssError> {
                Err(arbor_css::CssError::Parse {
                    line: 1,
                    message: "bad".into(),
                })
            }
        }
        let doc = Document::builder().parser(Arc::new(Failing)).build();
        let div = doc.create_element("div");
        doc.set_attribute(div, "style", "color: red").unwrap();
        assert!(doc.current_style(div).unwrap().is_empty());
    }

    #[test]
    fn test_set_style_unsupported() {
        let (doc, div) = doc_with_div();
        assert_eq!(
            doc.set_style(div, StyleProperties::new()),
            Err(DomError::Unsupported("cannot set style property"))
        );
    }

    #[test]
    fn test_style_on_text_node_rejected() {
        let doc = Document::new();
        let text = doc.create_text("x");
        assert!(matches!(
            doc.computed_style(text),
            Err(DomError::ReferenceNotFound(_))
        ));
    }

    #[test]
    fn test_disabled_sheet_contributes_nothing() {
        let (doc, div) = doc_with_div();
        let i = doc.add_style_sheet(
            StyleSheet::new().with_rule(StyleRule::new("div", vec![]).declare("color", "red")),
        );
        assert_eq!(doc.computed_style(div).unwrap().get("color"), Some("red"));

        doc.set_style_sheet_disabled(i, true).unwrap();
        assert!(doc.is_style_sheet_disabled(i).unwrap());
        assert_eq!(doc.computed_style(div).unwrap().get("color"), None);

        doc.set_style_sheet_disabled(i, false).unwrap();
        assert_eq!(doc.computed_style(div).unwrap().get("color"), Some("red"));
    }

    #[test]
    fn test_pseudo_state_toggle_reports_change() {
        let (doc, div) = doc_with_div();
        assert!(doc.set_mouse_over(div, true).unwrap());
        assert!(!doc.set_mouse_over(div, true).unwrap());
        assert_eq!(doc.pseudo_states(div).unwrap(), vec!["hover".to_string()]);
        assert!(doc.set_mouse_over(div, false).unwrap());
        assert!(doc.pseudo_states(div).unwrap().is_empty());
    }
}
