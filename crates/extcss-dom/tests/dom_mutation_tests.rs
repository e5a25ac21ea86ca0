//! Tests for tree mutation methods and the records observers receive for them.

use extcss_dom::{DomTree, MutationKind, NodeId, ObserveOptions, PropertyValue, UserAgent};

fn element(tree: &mut DomTree, parent: NodeId, tag: &str) -> NodeId {
    tree.create_element(parent, tag, &[])
}

// ========== remove_child ==========

#[test]
fn test_remove_child_first_of_three() {
    let mut tree = DomTree::new();
    let parent = element(&mut tree, NodeId::ROOT, "div");
    let a = element(&mut tree, parent, "a");
    let b = element(&mut tree, parent, "b");
    let c = element(&mut tree, parent, "c");

    tree.remove_child(parent, a);

    // b is now first child, c is second
    assert_eq!(tree.children(parent), &[b, c]);
    assert_eq!(tree.prev_sibling(b), None);
    assert_eq!(tree.next_sibling(b), Some(c));
    assert_eq!(tree.parent(a), None);
    assert!(!tree.is_connected(a));
}

#[test]
fn test_remove_child_keeps_subtree() {
    let mut tree = DomTree::new();
    let parent = element(&mut tree, NodeId::ROOT, "div");
    let child = element(&mut tree, parent, "section");
    let grandchild = element(&mut tree, child, "p");

    tree.remove_child(parent, child);

    assert_eq!(tree.children(child), &[grandchild]);
    assert!(!tree.is_connected(grandchild));

    // Re-inserting restores the same identity
    tree.append_child(parent, child);
    assert!(tree.is_connected(grandchild));
}

#[test]
fn test_remove_child_of_wrong_parent_is_noop() {
    let mut tree = DomTree::new();
    let a = element(&mut tree, NodeId::ROOT, "div");
    let b = element(&mut tree, NodeId::ROOT, "div");
    let child = element(&mut tree, a, "p");

    tree.remove_child(b, child);

    assert_eq!(tree.parent(child), Some(a));
}

// ========== insert_before ==========

#[test]
fn test_insert_before_middle() {
    let mut tree = DomTree::new();
    let parent = element(&mut tree, NodeId::ROOT, "div");
    let a = element(&mut tree, parent, "a");
    let c = element(&mut tree, parent, "c");
    let b = tree.alloc(extcss_dom::NodeType::Text("b".to_string()));

    tree.insert_before(parent, b, c);

    assert_eq!(tree.children(parent), &[a, b, c]);
    assert_eq!(tree.next_sibling(a), Some(b));
    assert_eq!(tree.prev_sibling(c), Some(b));
}

#[test]
fn test_append_moves_node_between_parents() {
    let mut tree = DomTree::new();
    let from = element(&mut tree, NodeId::ROOT, "div");
    let to = element(&mut tree, NodeId::ROOT, "div");
    let child = element(&mut tree, from, "span");

    tree.append_child(to, child);

    assert!(tree.children(from).is_empty());
    assert_eq!(tree.children(to), &[child]);
    assert_eq!(tree.element_index(child), Some(1));
}

// ========== observers ==========

#[test]
fn test_subtree_observer_sees_child_list_and_filtered_attributes() {
    let mut tree = DomTree::new();
    let html = element(&mut tree, NodeId::ROOT, "html");
    let body = element(&mut tree, html, "body");
    let observer = tree.observe(NodeId::ROOT, ObserveOptions::subtree_with_attributes(&["id", "class"]));

    let div = element(&mut tree, body, "div");
    tree.set_attribute(div, "class", "banner");
    tree.set_attribute(div, "title", "ignored");

    let records = tree.take_records(observer);
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].kind,
        MutationKind::ChildList {
            added: vec![div],
            removed: Vec::new(),
        }
    );
    assert_eq!(
        records[1].kind,
        MutationKind::Attributes {
            name: "class".to_string(),
            old_value: None,
        }
    );
    assert!(tree.take_records(observer).is_empty());
}

#[test]
fn test_removal_is_reported_to_subtree_observer() {
    let mut tree = DomTree::new();
    let body = element(&mut tree, NodeId::ROOT, "body");
    let div = element(&mut tree, body, "div");
    let observer = tree.observe(NodeId::ROOT, ObserveOptions::subtree_with_attributes(&[]));

    tree.detach(div);

    let records = tree.take_records(observer);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].target, body);
}

#[test]
fn test_character_data_is_observed() {
    let mut tree = DomTree::new();
    let p = element(&mut tree, NodeId::ROOT, "p");
    let text = tree.create_text(p, "old");
    let observer = tree.observe(NodeId::ROOT, ObserveOptions::subtree_with_attributes(&[]));

    tree.set_text(text, "new");

    assert_eq!(tree.text_content(p), "new");
    assert_eq!(tree.take_records(observer)[0].kind, MutationKind::CharacterData);
}

#[test]
fn test_disconnect_drops_pending_records() {
    let mut tree = DomTree::new();
    let div = element(&mut tree, NodeId::ROOT, "div");
    let observer = tree.observe(div, ObserveOptions::attribute("style"));

    tree.set_style_property(div, "display", "none", true);
    assert!(tree.has_pending_records());

    tree.disconnect(observer);
    assert!(!tree.is_observing(observer));
    assert!(!tree.has_pending_records());
    assert!(tree.take_records(observer).is_empty());
}

// ========== styles ==========

#[test]
fn test_style_writes_go_through_the_attribute() {
    let mut tree = DomTree::new();
    let div = tree.create_element(NodeId::ROOT, "div", &[("style", "color: red")]);

    tree.set_style_property(div, "display", "none", true);

    assert_eq!(tree.attribute(div, "style"), Some("color: red; display: none !important;"));
    assert!(tree.style_property_is_important(div, "display"));

    tree.remove_style_property(div, "display");
    assert_eq!(tree.style_property(div, "display"), None);
    assert_eq!(tree.style_property(div, "color").as_deref(), Some("red"));
}

#[test]
fn test_computed_style_layers() {
    let mut tree = DomTree::new();
    let div = element(&mut tree, NodeId::ROOT, "div");
    let span = element(&mut tree, div, "span");

    assert_eq!(tree.computed_style(div, None, "display").as_deref(), Some("block"));
    assert_eq!(tree.computed_style(span, None, "display").as_deref(), Some("inline"));

    tree.set_computed_style(div, None, "display", "flex");
    assert_eq!(tree.computed_style(div, None, "display").as_deref(), Some("flex"));

    tree.set_style_property(div, "display", "none", false);
    assert_eq!(tree.computed_style(div, None, "display").as_deref(), Some("none"));

    tree.set_computed_style(div, Some("::before"), "content", "\"Ad\"");
    assert_eq!(
        tree.computed_style(div, Some("before"), "content").as_deref(),
        Some("\"Ad\"")
    );
    assert_eq!(tree.computed_style(div, Some("after"), "content"), None);
}

#[test]
fn test_user_agent_and_properties() {
    let mut tree = DomTree::new();
    let div = element(&mut tree, NodeId::ROOT, "div");
    tree.set_user_agent(UserAgent::Safari);
    tree.set_property(div, "slot", PropertyValue::from("top"));

    assert_eq!(tree.user_agent(), UserAgent::Safari);
    assert_eq!(
        tree.properties(div).and_then(|p| p.get("slot")),
        Some(&PropertyValue::String("top".to_string()))
    );
}

// ========== xpath ==========

#[test]
fn test_xpath_from_element_context() {
    let mut tree = DomTree::new();
    let html = element(&mut tree, NodeId::ROOT, "html");
    let body = element(&mut tree, html, "body");
    let wrapper = tree.create_element(body, "div", &[("class", "wrapper")]);
    let inner = element(&mut tree, wrapper, "span");

    assert_eq!(tree.evaluate_xpath(inner, "../..").unwrap(), vec![body]);
    assert_eq!(
        tree.evaluate_xpath(inner, "ancestor::div[@class='wrapper']").unwrap(),
        vec![wrapper]
    );
    assert_eq!(tree.evaluate_xpath(NodeId::ROOT, "//span | //body").unwrap(), vec![body, inner]);
    assert!(tree.evaluate_xpath(inner, "..[").is_err());
}
