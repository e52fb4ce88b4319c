//! Arbor Style System
//!
//! Already-parsed style rules, the selector subset used to match them, the
//! rule index that aggregates enabled sheets, and ordered property merging.
//! Text parsing sits behind [`StyleSheetParser`].

mod index;
mod parser;
mod properties;
mod selector;

pub use index::RuleIndex;
pub use parser::{CssParser, StyleSheetParser};
pub use properties::StyleProperties;
pub use selector::{Combinator, Compound, Selector, SelectorElement, parse_selector_list};

/// Parse a style sheet with the default parser
pub fn parse_stylesheet(css: &str) -> Result<StyleSheet, CssError> {
    CssParser::new().parse_sheet(css)
}

/// Parsed style sheet
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    pub rules: Vec<StyleRule>,
    /// Location the sheet was loaded from, if external
    pub href: Option<String>,
}

impl StyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: StyleRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_href(mut self, href: &str) -> Self {
        self.href = Some(href.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Style rule: a selector list and its declarations
#[derive(Debug, Clone)]
pub struct StyleRule {
    pub selectors: Vec<Selector>,
    pub declarations: Vec<Declaration>,
}

impl StyleRule {
    /// Builds a rule from selector text. Selectors outside the supported
    /// subset are dropped.
    pub fn new(selector_text: &str, declarations: Vec<Declaration>) -> Self {
        Self {
            selectors: parse_selector_list(selector_text),
            declarations,
        }
    }

    pub fn declare(mut self, property: &str, value: &str) -> Self {
        self.declarations.push(Declaration::new(property, value));
        self
    }
}

/// Declaration (property: value)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

impl Declaration {
    pub fn new(property: &str, value: &str) -> Self {
        Self {
            property: property.trim().to_ascii_lowercase(),
            value: value.trim().to_string(),
        }
    }
}

/// Style parsing error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CssError {
    #[error("Parse error at line {line}: {message}")]
    Parse { line: u32, message: String },
}
