//! Rule index
//!
//! Aggregates the rules of every enabled sheet into buckets keyed by the
//! subject's id, else its first class, else its tag (or `*`). Lookups only
//! test the buckets an element can possibly hit. Matches come back grouped
//! by bucket kind (tag, `*`, class, id) and in sheet order within a group.

use crate::selector::{Combinator, SelectorElement};
use crate::{StyleRule, StyleSheet};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct Entry {
    sheet: usize,
    rule: usize,
    selector: usize,
}

impl Entry {
    fn order(&self) -> (usize, usize, usize) {
        (self.sheet, self.rule, self.selector)
    }
}

#[derive(Debug, Default)]
pub struct RuleIndex {
    sheets: Vec<Arc<StyleSheet>>,
    by_id: HashMap<String, Vec<Entry>>,
    by_class: HashMap<String, Vec<Entry>>,
    by_tag: HashMap<String, Vec<Entry>>,
    sibling_rules: bool,
    rule_count: usize,
}

impl RuleIndex {
    /// Indexes `sheets` in the given order. Callers pass only enabled sheets.
    pub fn new(sheets: Vec<Arc<StyleSheet>>) -> Self {
        let mut index = RuleIndex::default();
        for (s, sheet) in sheets.iter().enumerate() {
            for (r, rule) in sheet.rules.iter().enumerate() {
                index.rule_count += 1;
                for (i, selector) in rule.selectors.iter().enumerate() {
                    let entry = Entry {
                        sheet: s,
                        rule: r,
                        selector: i,
                    };
                    if selector.has_combinator(Combinator::AdjacentSibling) {
                        index.sibling_rules = true;
                    }
                    let subject = selector.subject();
                    let (bucket, key) = if let Some(id) = &subject.id {
                        (&mut index.by_id, id.clone())
                    } else if let Some(class) = subject.classes.first() {
                        (&mut index.by_class, class.clone())
                    } else {
                        let tag = subject.tag.clone().unwrap_or_else(|| "*".to_string());
                        (&mut index.by_tag, tag)
                    };
                    bucket.entry(key).or_default().push(entry);
                }
            }
        }
        index.sheets = sheets;
        tracing::debug!(
            "indexed {} rule(s) from {} sheet(s)",
            index.rule_count,
            index.sheets.len()
        );
        index
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }

    /// Whether any rule uses `+`, so sibling order affects matching
    pub fn has_sibling_rules(&self) -> bool {
        self.sibling_rules
    }

    /// Candidate entries tagged with their precedence group: tag rules,
    /// then `*` rules, then class rules, then id rules.
    fn candidates<E: SelectorElement>(&self, element: &E) -> Vec<(u8, Entry)> {
        let mut found = Vec::new();
        let tag = element.local_name().to_ascii_lowercase();
        for (group, key) in [(0, tag.as_str()), (1, "*")] {
            if let Some(entries) = self.by_tag.get(key) {
                found.extend(entries.iter().map(|e| (group, *e)));
            }
        }
        let mut seen_classes: Vec<&str> = Vec::new();
        for class in element.classes() {
            if seen_classes.contains(&class) {
                continue;
            }
            seen_classes.push(class);
            if let Some(entries) = self.by_class.get(class) {
                found.extend(entries.iter().map(|e| (2, *e)));
            }
        }
        if let Some(entries) = element.id().and_then(|id| self.by_id.get(id)) {
            found.extend(entries.iter().map(|e| (3, *e)));
        }
        found
    }

    fn rule(&self, entry: &Entry) -> &StyleRule {
        &self.sheets[entry.sheet].rules[entry.rule]
    }

    /// Rules matching `element` in merge order: tag rules, `*` rules,
    /// class rules, id rules, each group in sheet order. A rule hit through
    /// several groups is kept at its last position.
    pub fn matching_rules<E: SelectorElement>(&self, element: &E, pseudo: Option<&str>) -> Vec<&StyleRule> {
        let mut hits: Vec<(u8, Entry)> = self
            .candidates(element)
            .into_iter()
            .filter(|(_, e)| self.rule(e).selectors[e.selector].matches(element, pseudo))
            .collect();
        hits.sort_by_key(|(group, e)| (*group, e.order()));
        let mut merged: Vec<Entry> = Vec::with_capacity(hits.len());
        for (_, entry) in hits {
            merged.retain(|e| (e.sheet, e.rule) != (entry.sheet, entry.rule));
            merged.push(entry);
        }
        merged.iter().map(|e| self.rule(e)).collect()
    }

    /// Whether any rule that could apply to `element` is conditioned on
    /// `pseudo` being set on `anchor`.
    pub fn affected_by_pseudo_in_ancestor<E: SelectorElement>(
        &self,
        element: &E,
        anchor: &E,
        pseudo: &str,
    ) -> bool {
        self.candidates(element).iter().any(|(_, e)| {
            self.rule(e).selectors[e.selector].depends_on_pseudo(element, anchor, pseudo)
        })
    }
}
