//! Selectors
//!
//! The supported subset: compound selectors built from a tag (or `*`),
//! an id, classes and at most one pseudo-class, joined by descendant,
//! child (`>`) and adjacent-sibling (`+`) combinators. Anything else
//! (attribute selectors, pseudo-elements, `~`) is rejected at parse time.

use std::fmt;

/// Element view used for matching
pub trait SelectorElement: Sized {
    /// Lowercase tag name
    fn local_name(&self) -> &str;
    fn id(&self) -> Option<&str>;
    fn classes(&self) -> impl Iterator<Item = &str>;
    fn has_class(&self, name: &str) -> bool;
    /// Whether a dynamic pseudo-state such as `hover` is currently set
    fn has_pseudo_state(&self, name: &str) -> bool;
    fn parent_element(&self) -> Option<Self>;
    fn prev_sibling_element(&self) -> Option<Self>;
    fn is_same(&self, other: &Self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
    AdjacentSibling,
}

/// Compound selector such as `div.note#main:hover`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    /// `None` for `*` or an omitted tag
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub pseudo: Option<String>,
}

impl Compound {
    fn parse(token: &str) -> Option<Self> {
        const MARKERS: [char; 3] = ['.', '#', ':'];

        let mut compound = Compound::default();
        let end = token.find(MARKERS).unwrap_or(token.len());
        let tag = &token[..end];
        if !tag.is_empty() && tag != "*" {
            if !is_ident(tag) {
                return None;
            }
            compound.tag = Some(tag.to_ascii_lowercase());
        }

        let mut rest = &token[end..];
        while let Some(marker) = rest.chars().next() {
            let body = &rest[marker.len_utf8()..];
            let end = body.find(MARKERS).unwrap_or(body.len());
            let name = &body[..end];
            if !is_ident(name) {
                return None;
            }
            match marker {
                '.' => compound.classes.push(name.to_string()),
                '#' => compound.id = Some(name.to_string()),
                _ => {
                    if compound.pseudo.is_some() {
                        return None;
                    }
                    compound.pseudo = Some(name.to_ascii_lowercase());
                }
            }
            rest = &body[end..];
        }
        Some(compound)
    }

    /// Matches everything except the pseudo-class.
    fn matches_static<E: SelectorElement>(&self, element: &E) -> bool {
        if let Some(tag) = &self.tag {
            if !element.local_name().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|class| element.has_class(class))
    }
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii())
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => f.write_str(tag)?,
            None if self.id.is_none() && self.classes.is_empty() && self.pseudo.is_none() => {
                f.write_str("*")?
            }
            None => {}
        }
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        if let Some(pseudo) = &self.pseudo {
            write!(f, ":{pseudo}")?;
        }
        Ok(())
    }
}

/// Complex selector, stored left to right. `combinators[i]` joins
/// `compounds[i]` and `compounds[i + 1]`; the last compound is the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    compounds: Vec<Compound>,
    combinators: Vec<Combinator>,
}

impl Selector {
    pub fn parse(text: &str) -> Option<Self> {
        let spaced = text.replace('>', " > ").replace('+', " + ");
        let mut compounds = Vec::new();
        let mut combinators = Vec::new();
        let mut pending: Option<Combinator> = None;

        for token in spaced.split_whitespace() {
            let explicit = match token {
                ">" => Some(Combinator::Child),
                "+" => Some(Combinator::AdjacentSibling),
                _ => None,
            };
            if let Some(combinator) = explicit {
                if compounds.is_empty() || pending.is_some() {
                    return None;
                }
                pending = Some(combinator);
                continue;
            }
            let compound = Compound::parse(token)?;
            if !compounds.is_empty() {
                combinators.push(pending.take().unwrap_or(Combinator::Descendant));
            }
            compounds.push(compound);
        }

        if compounds.is_empty() || pending.is_some() {
            return None;
        }
        Some(Self {
            compounds,
            combinators,
        })
    }

    pub fn subject(&self) -> &Compound {
        &self.compounds[self.compounds.len() - 1]
    }

    pub fn has_combinator(&self, combinator: Combinator) -> bool {
        self.combinators.contains(&combinator)
    }

    /// Whether `element` matches.
    ///
    /// The subject's pseudo-class must equal `pseudo`, or be absent. Other
    /// compounds test the element's live pseudo-states.
    pub fn matches<E: SelectorElement>(&self, element: &E, pseudo: Option<&str>) -> bool {
        let last = self.compounds.len() - 1;
        let subject = &self.compounds[last];
        let pseudo_ok = match (&subject.pseudo, pseudo) {
            (None, _) => true,
            (Some(wanted), Some(given)) => wanted == given,
            (Some(_), None) => false,
        };
        pseudo_ok && subject.matches_static(element) && self.matches_left_of(last, element)
    }

    fn matches_left_of<E: SelectorElement>(&self, index: usize, element: &E) -> bool {
        if index == 0 {
            return true;
        }
        let target = &self.compounds[index - 1];
        let hit = |candidate: &E| {
            target.matches_static(candidate)
                && target
                    .pseudo
                    .as_deref()
                    .is_none_or(|p| candidate.has_pseudo_state(p))
                && self.matches_left_of(index - 1, candidate)
        };
        match self.combinators[index - 1] {
            Combinator::Child => element.parent_element().is_some_and(|p| hit(&p)),
            Combinator::AdjacentSibling => element.prev_sibling_element().is_some_and(|s| hit(&s)),
            Combinator::Descendant => {
                let mut current = element.parent_element();
                while let Some(ancestor) = current {
                    if hit(&ancestor) {
                        return true;
                    }
                    current = ancestor.parent_element();
                }
                false
            }
        }
    }

    /// Whether this selector, applied to `element`, can depend on `pseudo`
    /// being set on `anchor`. Pseudo-classes are ignored while walking so
    /// the answer does not change when the state toggles.
    pub fn depends_on_pseudo<E: SelectorElement>(&self, element: &E, anchor: &E, pseudo: &str) -> bool {
        let last = self.compounds.len() - 1;
        let subject = &self.compounds[last];
        if !subject.matches_static(element) {
            return false;
        }
        let touched = subject.pseudo.as_deref() == Some(pseudo) && element.is_same(anchor);
        self.touches_left_of(last, element, anchor, pseudo, touched)
    }

    fn touches_left_of<E: SelectorElement>(
        &self,
        index: usize,
        element: &E,
        anchor: &E,
        pseudo: &str,
        touched: bool,
    ) -> bool {
        if index == 0 {
            return touched;
        }
        let target = &self.compounds[index - 1];
        let step = |candidate: &E| {
            target.matches_static(candidate) && {
                let touched = touched
                    || (target.pseudo.as_deref() == Some(pseudo) && candidate.is_same(anchor));
                self.touches_left_of(index - 1, candidate, anchor, pseudo, touched)
            }
        };
        match self.combinators[index - 1] {
            Combinator::Child => element.parent_element().is_some_and(|p| step(&p)),
            Combinator::AdjacentSibling => element.prev_sibling_element().is_some_and(|s| step(&s)),
            Combinator::Descendant => {
                let mut current = element.parent_element();
                while let Some(ancestor) = current {
                    if step(&ancestor) {
                        return true;
                    }
                    current = ancestor.parent_element();
                }
                false
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, compound) in self.compounds.iter().enumerate() {
            if i > 0 {
                match self.combinators[i - 1] {
                    Combinator::Descendant => f.write_str(" ")?,
                    Combinator::Child => f.write_str(" > ")?,
                    Combinator::AdjacentSibling => f.write_str(" + ")?,
                }
            }
            write!(f, "{compound}")?;
        }
        Ok(())
    }
}

/// Parses a comma-separated selector list, skipping unsupported entries.
pub fn parse_selector_list(text: &str) -> Vec<Selector> {
    text.split(',')
        .filter_map(|part| {
            let selector = Selector::parse(part);
            if selector.is_none() && !part.trim().is_empty() {
                tracing::trace!("unsupported selector skipped: {}", part.trim());
            }
            selector
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal element tree for matching tests
    #[derive(Debug)]
    pub struct TestNode {
        pub tag: &'static str,
        pub id: Option<&'static str>,
        pub classes: Vec<&'static str>,
        pub states: Vec<&'static str>,
        pub parent: Option<usize>,
    }

    pub struct TestTree(pub Vec<TestNode>);

    #[derive(Clone, Copy)]
    pub struct El<'a>(pub &'a TestTree, pub usize);

    impl TestTree {
        pub fn add(&mut self, tag: &'static str, parent: Option<usize>) -> usize {
            self.0.push(TestNode {
                tag,
                id: None,
                classes: Vec::new(),
                states: Vec::new(),
                parent,
            });
            self.0.len() - 1
        }

        pub fn el(&self, index: usize) -> El<'_> {
            El(self, index)
        }
    }

    impl<'a> SelectorElement for El<'a> {
        fn local_name(&self) -> &str {
            self.0.0[self.1].tag
        }
        fn id(&self) -> Option<&str> {
            self.0.0[self.1].id
        }
        fn classes(&self) -> impl Iterator<Item = &str> {
            self.0.0[self.1].classes.iter().copied()
        }
        fn has_class(&self, name: &str) -> bool {
            self.0.0[self.1].classes.contains(&name)
        }
        fn has_pseudo_state(&self, name: &str) -> bool {
            self.0.0[self.1].states.contains(&name)
        }
        fn parent_element(&self) -> Option<Self> {
            self.0.0[self.1].parent.map(|p| El(self.0, p))
        }
        fn prev_sibling_element(&self) -> Option<Self> {
            let parent = self.0.0[self.1].parent?;
            (0..self.1)
                .rev()
                .find(|&i| self.0.0[i].parent == Some(parent))
                .map(|i| El(self.0, i))
        }
        fn is_same(&self, other: &Self) -> bool {
            self.1 == other.1
        }
    }

    fn sample() -> TestTree {
        // body > div#x.box > (p.first, p.second > a)
        let mut tree = TestTree(Vec::new());
        let body = tree.add("body", None);
        let div = tree.add("div", Some(body));
        tree.0[div].id = Some("x");
        tree.0[div].classes = vec!["box"];
        let p1 = tree.add("p", Some(div));
        tree.0[p1].classes = vec!["first"];
        let p2 = tree.add("p", Some(div));
        tree.0[p2].classes = vec!["second"];
        tree.add("a", Some(p2));
        tree
    }

    #[test]
    fn test_parse_compound() {
        let sel = Selector::parse("DIV#main.a.b:Hover").unwrap();
        let subject = sel.subject();
        assert_eq!(subject.tag.as_deref(), Some("div"));
        assert_eq!(subject.id.as_deref(), Some("main"));
        assert_eq!(subject.classes, vec!["a", "b"]);
        assert_eq!(subject.pseudo.as_deref(), Some("hover"));
    }

    #[test]
    fn test_parse_combinators() {
        let sel = Selector::parse("ul>li + li  a").unwrap();
        assert_eq!(sel.to_string(), "ul > li + li a");
        assert!(sel.has_combinator(Combinator::AdjacentSibling));
    }

    #[test]
    fn test_parse_rejects_unsupported() {
        assert!(Selector::parse("input[type=text]").is_none());
        assert!(Selector::parse("p::before").is_none());
        assert!(Selector::parse("> p").is_none());
        assert!(Selector::parse("a:hover:focus").is_none());
        assert_eq!(parse_selector_list("h1, h2[x], h3").len(), 2);
    }

    #[test]
    fn test_universal() {
        let sel = Selector::parse("*").unwrap();
        assert_eq!(sel.subject(), &Compound::default());
        let tree = sample();
        assert!(sel.matches(&tree.el(4), None));
    }

    #[test]
    fn test_matching_combinators() {
        let tree = sample();
        let a = tree.el(4);
        assert!(Selector::parse("div a").unwrap().matches(&a, None));
        assert!(Selector::parse("p.second > a").unwrap().matches(&a, None));
        assert!(!Selector::parse("div > a").unwrap().matches(&a, None));
        assert!(Selector::parse(".first + p a").unwrap().matches(&a, None));
        assert!(!Selector::parse(".second + p").unwrap().matches(&tree.el(2), None));
    }

    #[test]
    fn test_subject_pseudo_requires_request() {
        let tree = sample();
        let sel = Selector::parse("p:hover").unwrap();
        assert!(!sel.matches(&tree.el(2), None));
        assert!(sel.matches(&tree.el(2), Some("hover")));
        assert!(!sel.matches(&tree.el(2), Some("focus")));
    }

    #[test]
    fn test_ancestor_pseudo_uses_live_state() {
        let mut tree = sample();
        let sel = Selector::parse("#x:hover a").unwrap();
        assert!(!sel.matches(&tree.el(4), None));
        tree.0[1].states.push("hover");
        assert!(sel.matches(&tree.el(4), None));
    }

    #[test]
    fn test_depends_on_pseudo_through_anchor() {
        let tree = sample();
        let sel = Selector::parse("#x:hover a").unwrap();
        let (div, p1, a) = (tree.el(1), tree.el(2), tree.el(4));

        assert!(sel.depends_on_pseudo(&a, &div, "hover"));
        assert!(!sel.depends_on_pseudo(&a, &div, "focus"));
        assert!(!sel.depends_on_pseudo(&p1, &div, "hover"));
        assert!(!sel.depends_on_pseudo(&a, &tree.el(0), "hover"));
    }
}
