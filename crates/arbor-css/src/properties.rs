//! Style properties
//!
//! An ordered property map. Setting a property that is already present
//! replaces its value in place, so later sources overwrite earlier ones
//! while first-seen order is kept for iteration.

use crate::Declaration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleProperties {
    entries: Vec<(String, String)>,
}

impl StyleProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_declarations(declarations: &[Declaration]) -> Self {
        let mut props = Self::new();
        props.apply(declarations);
        props
    }

    pub fn set(&mut self, property: &str, value: &str) {
        let property = property.to_ascii_lowercase();
        match self.entries.iter_mut().find(|(name, _)| *name == property) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.entries.push((property, value.to_string())),
        }
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(property))
            .map(|(_, value)| value.as_str())
    }

    pub fn apply(&mut self, declarations: &[Declaration]) {
        for decl in declarations {
            self.set(&decl.property, &decl.value);
        }
    }

    /// Overlays `other` on top of `self`
    pub fn merge(&mut self, other: &StyleProperties) {
        for (name, value) in &other.entries {
            self.set(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
