//! Writing and reverting rule effects on elements.

use crate::document::Document;

use super::rule::Declaration;

/// Attribute holding inline style.
pub const STYLE_ATTRIBUTE: &str = "style";

/// A stable description of where an element sits, used to recognise an
/// element that the page keeps re-inserting: `div#a:nth-child(2) > p:nth-child(1)`.
#[must_use]
pub fn element_path<D: Document>(doc: &D, node: D::Node) -> String {
    let mut steps = Vec::new();
    let mut current = Some(node);
    while let Some(element) = current.filter(|&n| doc.is_element(n)) {
        let mut step = doc.tag_name(element).unwrap_or_default();
        if let Some(id) = doc.attribute(element, "id").filter(|id| !id.is_empty()) {
            step.push('#');
            step.push_str(&id);
        }
        if let Some(index) = doc.element_index(element) {
            step = format!("{step}:nth-child({index})");
        }
        steps.push(step);
        current = doc.parent_element(element);
    }
    steps.reverse();
    steps.join(" > ")
}

/// True if every declaration is present inline with `!important`.
#[must_use]
pub fn is_applied<D: Document>(doc: &D, node: D::Node, declarations: &[Declaration]) -> bool {
    declarations.iter().all(|d| {
        doc.style_property(node, &d.property).as_deref() == Some(d.value.as_str())
            && doc.style_property_is_important(node, &d.property)
    })
}

/// Write every declaration that is not already in place.
pub fn write_declarations<D: Document>(doc: &mut D, node: D::Node, declarations: &[Declaration]) {
    for d in declarations {
        let current = doc.style_property(node, &d.property);
        if current.as_deref() == Some(d.value.as_str())
            && doc.style_property_is_important(node, &d.property)
        {
            continue;
        }
        doc.set_style_property(node, &d.property, &d.value, true);
    }
}

/// Put the `style` attribute back the way it was before any rule touched
/// the element.
pub fn restore_style<D: Document>(doc: &mut D, node: D::Node, baseline: Option<&str>) {
    let current = doc.attribute(node, STYLE_ATTRIBUTE);
    if current.as_deref() == baseline {
        return;
    }
    match baseline {
        Some(style) => doc.set_attribute(node, STYLE_ATTRIBUTE, style),
        None => doc.remove_attribute(node, STYLE_ATTRIBUTE),
    }
}

/// Concatenate declarations from several rules; a later rule's value for a
/// property replaces an earlier one in place.
#[must_use]
pub fn merge_declarations<'a>(sets: impl IntoIterator<Item = &'a [Declaration]>) -> Vec<Declaration> {
    let mut merged: Vec<Declaration> = Vec::new();
    for declaration in sets.into_iter().flatten() {
        match merged.iter_mut().find(|d| d.property == declaration.property) {
            Some(existing) => existing.value.clone_from(&declaration.value),
            None => merged.push(declaration.clone()),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use extcss_dom::{DomTree, NodeId};

    use super::*;

    fn tree() -> (DomTree, NodeId, NodeId) {
        let mut tree = DomTree::new();
        let html = tree.create_element(NodeId::ROOT, "html", &[]);
        let body = tree.create_element(html, "body", &[]);
        let _ = tree.create_element(body, "p", &[]);
        let ad = tree.create_element(body, "div", &[("id", "ad"), ("style", "color: red;")]);
        (tree, body, ad)
    }

    #[test]
    fn paths_include_ids_and_positions() {
        let (tree, body, ad) = tree();
        assert_eq!(
            element_path(&tree, ad),
            "html:nth-child(1) > body:nth-child(1) > div#ad:nth-child(2)"
        );
        assert_eq!(element_path(&tree, body), "html:nth-child(1) > body:nth-child(1)");
    }

    #[test]
    fn write_then_restore() {
        let (mut tree, _, ad) = tree();
        let hide = [Declaration::new("display", "none")];
        assert!(!is_applied(&tree, ad, &hide));
        write_declarations(&mut tree, ad, &hide);
        assert!(is_applied(&tree, ad, &hide));
        assert_eq!(tree.style_property(ad, "color").as_deref(), Some("red"));

        restore_style(&mut tree, ad, Some("color: red;"));
        assert_eq!(tree.attribute(ad, "style"), Some("color: red;"));
        restore_style(&mut tree, ad, None);
        assert_eq!(tree.attribute(ad, "style"), None);
    }

    #[test]
    fn merge_keeps_first_position() {
        let first = [Declaration::new("display", "none"), Declaration::new("color", "red")];
        let second = [Declaration::new("color", "blue")];
        let merged = merge_declarations([&first[..], &second[..]]);
        assert_eq!(
            merged,
            vec![Declaration::new("display", "none"), Declaration::new("color", "blue")]
        );
    }
}
