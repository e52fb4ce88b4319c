//! Builds a small document, styles it and watches it change.
//!
//! Run with `RUST_LOG=debug` to see the library's tracing output.

use arbor_dom::css::parse_stylesheet;
use arbor_dom::{Document, DocumentListener, NodeId};
use std::sync::Arc;

struct Printer;

impl DocumentListener for Printer {
    fn structure_invalidated(&self, _doc: &Document, node: NodeId) {
        println!("structure changed under {node}");
    }

    fn invalidated(&self, _doc: &Document, node: NodeId) {
        println!("{node} invalidated");
    }

    fn all_invalidated(&self, _doc: &Document) {
        println!("everything invalidated");
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let doc = Document::new();
    let _printer = doc.subscribe(Arc::new(Printer));

    let body = doc.create_element("body");
    doc.append(doc.root(), body)?;
    let items = doc.get_elements_by_tag_name(body, "li")?;

    let list = doc.create_element("ul");
    doc.append(body, list)?;
    for label in ["alpha", "beta", "gamma"] {
        let li = doc.create_element("li");
        doc.set_attribute(li, "class", "item")?;
        doc.append(li, doc.create_text(label))?;
        doc.append(list, li)?;
    }
    println!("{} items", items.length());

    doc.add_style_sheet(parse_stylesheet(".item { color: green } .done { color: gray }")?);
    let first = items.item(0).ok_or_else(|| anyhow::anyhow!("empty list"))?;
    println!("first item color: {:?}", doc.computed_style(first)?.get("color"));

    doc.set_attribute(first, "class", "done")?;
    println!("after update: {:?}", doc.computed_style(first)?.get("color"));
    println!("text: {}", doc.text_content(list)?);
    Ok(())
}
