//! JSON page descriptions.
//!
//! A page file describes the root element of a document:
//!
//! ```json
//! {
//!   "tag": "html",
//!   "children": [
//!     { "tag": "body", "children": [
//!       { "tag": "div", "attrs": { "class": "banner" }, "children": ["Sponsored"] }
//!     ]}
//!   ]
//! }
//! ```
//!
//! Strings in `children` are text nodes. `computed`, `before` and `after`
//! carry author-level computed style for the element and its pseudo-elements.
//! `properties` carries script-assigned own properties.

use std::collections::BTreeMap;

use extcss_dom::{DomTree, NodeId, PropertyValue};
use serde::Deserialize;

/// One child entry of an element.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PageNode {
    /// A text node.
    Text(String),
    /// A nested element.
    Element(PageElement),
}

/// An element and its subtree.
#[derive(Debug, Deserialize)]
pub struct PageElement {
    /// Local name.
    pub tag: String,
    /// Attributes, in name order.
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Computed style of the element itself.
    #[serde(default)]
    pub computed: BTreeMap<String, String>,
    /// Computed style of `::before`.
    #[serde(default)]
    pub before: BTreeMap<String, String>,
    /// Computed style of `::after`.
    #[serde(default)]
    pub after: BTreeMap<String, String>,
    /// Own properties (`element.foo = ...`).
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Children in document order.
    #[serde(default)]
    pub children: Vec<PageNode>,
}

/// Parse a page description into a fresh tree.
///
/// # Errors
///
/// Returns the JSON error if `source` is not a valid page description.
pub fn load(source: &str) -> serde_json::Result<DomTree> {
    let root: PageElement = serde_json::from_str(source)?;
    let mut tree = DomTree::new();
    insert(&mut tree, NodeId::ROOT, &root);
    Ok(tree)
}

/// A bare `<html><body></body></html>` tree.
#[must_use]
pub fn blank() -> DomTree {
    let mut tree = DomTree::new();
    let html = tree.create_element(NodeId::ROOT, "html", &[]);
    let _ = tree.create_element(html, "body", &[]);
    tree
}

fn insert(tree: &mut DomTree, parent: NodeId, element: &PageElement) {
    let attrs: Vec<(&str, &str)> = element
        .attrs
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    let id = tree.create_element(parent, &element.tag, &attrs);

    for (pseudo_element, styles) in [
        (None, &element.computed),
        (Some("before"), &element.before),
        (Some("after"), &element.after),
    ] {
        for (property, value) in styles {
            tree.set_computed_style(id, pseudo_element, property, value);
        }
    }
    for (name, value) in &element.properties {
        tree.set_property(id, name, PropertyValue::from(value.clone()));
    }

    for child in &element.children {
        match child {
            PageNode::Text(text) => {
                let _ = tree.create_text(id, text);
            }
            PageNode::Element(nested) => insert(tree, id, nested),
        }
    }
}
