//! Element attributes
//!
//! Insertion-ordered attribute store with a name index. Names are stored as
//! given; the document lowercases them before they get here.

use std::collections::HashMap;

/// Single attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attr {
    pub name: String,
    pub value: String,
}

impl Attr {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct AttributeMap {
    attributes: Vec<Attr>,
    by_name: HashMap<String, usize>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.by_name
            .get(name)
            .and_then(|&i| self.attributes.get(i))
            .map(|a| a.value.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Sets `name`, returning the previous value
    pub fn set(&mut self, name: &str, value: &str) -> Option<String> {
        if let Some(&index) = self.by_name.get(name) {
            Some(std::mem::replace(
                &mut self.attributes[index].value,
                value.to_string(),
            ))
        } else {
            self.by_name.insert(name.to_string(), self.attributes.len());
            self.attributes.push(Attr::new(name, value));
            None
        }
    }

    /// Removes `name`, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.by_name.remove(name)?;
        for idx in self.by_name.values_mut() {
            if *idx > index {
                *idx -= 1;
            }
        }
        Some(self.attributes.remove(index).value)
    }

    pub fn names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }

    /// Whitespace-separated tokens of the `class` attribute
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.get("class").unwrap_or("").split_whitespace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_attribute() {
        let mut attrs = AttributeMap::new();
        assert_eq!(attrs.set("class", "btn"), None);
        attrs.set("id", "submit");

        assert_eq!(attrs.get("class"), Some("btn"));
        assert_eq!(attrs.set("class", "link"), Some("btn".to_string()));
        assert_eq!(attrs.names(), vec!["class", "id"]);
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut attrs = AttributeMap::new();
        attrs.set("a", "1");
        attrs.set("b", "2");
        attrs.set("c", "3");

        assert_eq!(attrs.remove("a"), Some("1".to_string()));
        assert_eq!(attrs.get("b"), Some("2"));
        assert_eq!(attrs.get("c"), Some("3"));
        assert_eq!(attrs.remove("a"), None);
        assert!(!attrs.has("a"));
    }

    #[test]
    fn test_class_names() {
        let mut attrs = AttributeMap::new();
        assert_eq!(attrs.class_names().count(), 0);
        attrs.set("class", "  foo\tbar ");
        assert_eq!(attrs.class_names().collect::<Vec<_>>(), vec!["foo", "bar"]);
    }
}
