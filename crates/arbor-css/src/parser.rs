//! Style sheet parser using lightningcss
//!
//! Converts sheet and `style` attribute text into [`StyleSheet`] rules and
//! [`Declaration`] lists. Only plain style rules are kept.

use crate::{CssError, Declaration, StyleRule, StyleSheet, parse_selector_list};
use lightningcss::declaration::DeclarationBlock;
use lightningcss::rules::CssRule;
use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{ParserOptions, StyleAttribute};
use lightningcss::traits::ToCss;

/// Turns style text into rule objects
pub trait StyleSheetParser: Send + Sync {
    fn parse_sheet(&self, css: &str) -> Result<StyleSheet, CssError>;

    /// Parses the body of a `style` attribute
    fn parse_declarations(&self, css: &str) -> Result<Vec<Declaration>, CssError>;
}

/// Default parser
#[derive(Debug, Default, Clone, Copy)]
pub struct CssParser;

impl CssParser {
    pub fn new() -> Self {
        Self
    }

    fn convert_rule(&self, rule: &CssRule) -> Option<StyleRule> {
        match rule {
            CssRule::Style(style_rule) => {
                let mut selectors = Vec::new();
                for selector in style_rule.selectors.0.iter() {
                    match selector.to_css_string(PrinterOptions::default()) {
                        Ok(text) => selectors.extend(parse_selector_list(&text)),
                        Err(e) => tracing::trace!("selector not printable: {:?}", e),
                    }
                }
                if selectors.is_empty() {
                    return None;
                }
                Some(StyleRule {
                    selectors,
                    declarations: self.convert_declarations(&style_rule.declarations),
                })
            }
            // Skip other rule types (media queries, keyframes, etc.)
            _ => None,
        }
    }

    fn convert_declarations(&self, block: &DeclarationBlock) -> Vec<Declaration> {
        // Important declarations go last so they win within the block
        block
            .declarations
            .iter()
            .chain(block.important_declarations.iter())
            .filter_map(|property| {
                let name = property.property_id();
                match property.value_to_css_string(PrinterOptions::default()) {
                    Ok(value) => Some(Declaration::new(name.name(), &value)),
                    Err(e) => {
                        tracing::trace!("declaration {} not printable: {:?}", name.name(), e);
                        None
                    }
                }
            })
            .collect()
    }
}

impl StyleSheetParser for CssParser {
    fn parse_sheet(&self, css: &str) -> Result<StyleSheet, CssError> {
        use lightningcss::stylesheet::StyleSheet as LightningSheet;

        let sheet = LightningSheet::parse(css, ParserOptions::default()).map_err(|e| {
            CssError::Parse {
                line: e.loc.as_ref().map(|l| l.line + 1).unwrap_or(0),
                message: e.kind.to_string(),
            }
        })?;

        let mut result = StyleSheet::new();
        for rule in sheet.rules.0.iter() {
            if let Some(converted) = self.convert_rule(rule) {
                result.rules.push(converted);
            }
        }
        Ok(result)
    }

    fn parse_declarations(&self, css: &str) -> Result<Vec<Declaration>, CssError> {
        let attr = StyleAttribute::parse(css, ParserOptions::default()).map_err(|e| {
            CssError::Parse {
                line: e.loc.as_ref().map(|l| l.line + 1).unwrap_or(0),
                message: e.kind.to_string(),
            }
        })?;
        Ok(self.convert_declarations(&attr.declarations))
    }
}
