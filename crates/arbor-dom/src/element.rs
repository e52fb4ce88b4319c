//! Element kinds
//!
//! A closed set of element kinds derived from the tag name. Type-specific
//! behavior is a match on the kind instead of per-type objects.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Html,
    Head,
    Body,
    Title,
    Meta,
    Link,
    Style,
    Script,
    Div,
    Span,
    Paragraph,
    Heading(u8),
    Anchor,
    Area,
    Image,
    Form,
    Input,
    Button,
    List,
    ListItem,
    Table,
    Bold,
    Italic,
    Underline,
    Preformatted,
    Center,
    /// Any tag without built-in behavior
    Unknown,
}

impl ElementKind {
    /// Kind for a lowercase tag name
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "html" => ElementKind::Html,
            "head" => ElementKind::Head,
            "body" => ElementKind::Body,
            "title" => ElementKind::Title,
            "meta" => ElementKind::Meta,
            "link" => ElementKind::Link,
            "style" => ElementKind::Style,
            "script" => ElementKind::Script,
            "div" => ElementKind::Div,
            "span" => ElementKind::Span,
            "p" => ElementKind::Paragraph,
            "h1" => ElementKind::Heading(1),
            "h2" => ElementKind::Heading(2),
            "h3" => ElementKind::Heading(3),
            "h4" => ElementKind::Heading(4),
            "h5" => ElementKind::Heading(5),
            "h6" => ElementKind::Heading(6),
            "a" => ElementKind::Anchor,
            "area" => ElementKind::Area,
            "img" => ElementKind::Image,
            "form" => ElementKind::Form,
            "input" => ElementKind::Input,
            "button" => ElementKind::Button,
            "ul" | "ol" | "dl" => ElementKind::List,
            "li" | "dt" | "dd" => ElementKind::ListItem,
            "table" => ElementKind::Table,
            "b" | "strong" => ElementKind::Bold,
            "i" | "em" | "cite" => ElementKind::Italic,
            "u" | "ins" => ElementKind::Underline,
            "pre" => ElementKind::Preformatted,
            "center" => ElementKind::Center,
            _ => ElementKind::Unknown,
        }
    }

    /// Built-in default style, applied before any style sheet rule
    pub fn default_style(self) -> &'static [(&'static str, &'static str)] {
        match self {
            ElementKind::Head
            | ElementKind::Title
            | ElementKind::Meta
            | ElementKind::Link
            | ElementKind::Style
            | ElementKind::Script => &[("display", "none")],
            ElementKind::Html | ElementKind::Body | ElementKind::Div | ElementKind::Form => {
                &[("display", "block")]
            }
            ElementKind::Paragraph => &[("display", "block"), ("margin", "1em 0")],
            ElementKind::Heading(_) => &[("display", "block"), ("font-weight", "bold")],
            ElementKind::Anchor => &[("text-decoration", "underline")],
            ElementKind::List => &[("display", "block"), ("padding-left", "40px")],
            ElementKind::ListItem => &[("display", "list-item")],
            ElementKind::Table => &[("display", "table")],
            ElementKind::Bold => &[("font-weight", "bold")],
            ElementKind::Italic => &[("font-style", "italic")],
            ElementKind::Underline => &[("text-decoration", "underline")],
            ElementKind::Preformatted => &[("display", "block"), ("white-space", "pre")],
            ElementKind::Center => &[("display", "block"), ("text-align", "center")],
            ElementKind::Span
            | ElementKind::Area
            | ElementKind::Image
            | ElementKind::Input
            | ElementKind::Button
            | ElementKind::Unknown => &[],
        }
    }
}
