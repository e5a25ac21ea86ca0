//! The document model the engine queries, observes and writes.
//!
//! [`Document`] is the seam between the engine and its host. The host
//! supplies native selection (with `:scope` support), computed style,
//! mutation observers, `XPath` and style attribute access; the engine never
//! reaches into the tree any other way. [`DomTree`] implements it directly.

use std::fmt::Debug;
use std::hash::Hash;

use extcss_dom::{DomTree, NodeId, ObserveOptions, ObserverId, PropertyMap, UserAgent};

use crate::error::NativeSelectorError;

/// Attributes whose changes can alter which elements rules select.
pub const OBSERVED_ATTRIBUTES: [&str; 2] = ["id", "class"];

/// Host document handle.
pub trait Document {
    /// A node reference. Stable for the lifetime of the node, including
    /// while detached.
    type Node: Copy + Eq + Hash + Debug;
    /// A registered mutation observer.
    type Observer: Copy + Eq + Hash + Debug;

    // ---- structure ----

    /// The document node.
    fn root(&self) -> Self::Node;
    /// The root element (`<html>`), if any.
    fn document_element(&self) -> Option<Self::Node>;
    /// True for element nodes.
    fn is_element(&self, node: Self::Node) -> bool;
    /// Parent of any kind.
    fn parent_node(&self, node: Self::Node) -> Option<Self::Node>;
    /// Parent if it is an element.
    fn parent_element(&self, node: Self::Node) -> Option<Self::Node>;
    /// 1-based position among element siblings.
    fn element_index(&self, node: Self::Node) -> Option<usize>;
    /// True if the node is in the document.
    fn is_connected(&self, node: Self::Node) -> bool;
    /// Lowercase local name of an element.
    fn tag_name(&self, node: Self::Node) -> Option<String>;
    /// Sort nodes in tree order. Detached nodes go last.
    fn sort_in_document_order(&self, nodes: &mut [Self::Node]);

    // ---- native selection ----

    /// `context.querySelectorAll(selector)`, in document order.
    ///
    /// # Errors
    ///
    /// Fails if the native engine rejects `selector`.
    fn query_selector_all(
        &self,
        context: Self::Node,
        selector: &str,
    ) -> Result<Vec<Self::Node>, NativeSelectorError>;

    /// `element.matches(selector)`.
    ///
    /// # Errors
    ///
    /// Fails if the native engine rejects `selector`.
    fn matches_selector(&self, node: Self::Node, selector: &str) -> Result<bool, NativeSelectorError>;

    /// `element.closest(selector)`.
    ///
    /// # Errors
    ///
    /// Fails if the native engine rejects `selector`.
    fn closest(
        &self,
        node: Self::Node,
        selector: &str,
    ) -> Result<Option<Self::Node>, NativeSelectorError>;

    /// Check `selector` without running it.
    ///
    /// # Errors
    ///
    /// Fails if the native engine rejects `selector`.
    fn validate_selector(&self, selector: &str) -> Result<(), NativeSelectorError>;

    // ---- reads ----

    /// The node's `textContent`.
    fn text_content(&self, node: Self::Node) -> String;
    /// All attributes as `(name, value)`.
    fn attributes(&self, node: Self::Node) -> Vec<(String, String)>;
    /// One attribute value.
    fn attribute(&self, node: Self::Node, name: &str) -> Option<String>;
    /// Computed value of `property`, optionally for a pseudo-element
    /// (`"before"`, `"after"`).
    fn computed_style(
        &self,
        node: Self::Node,
        pseudo_element: Option<&str>,
        property: &str,
    ) -> Option<String>;
    /// The element's script-visible own properties.
    fn own_properties(&self, node: Self::Node) -> Option<&PropertyMap>;
    /// Browser family, for engine-specific value normalisation.
    fn user_agent(&self) -> UserAgent;

    /// Evaluate an `XPath` expression with `context` as the context node.
    ///
    /// # Errors
    ///
    /// Returns the evaluator's message for an invalid expression.
    fn evaluate_xpath(&self, context: Self::Node, expression: &str) -> Result<Vec<Self::Node>, String>;

    // ---- writes ----

    /// Detach the node from its parent.
    fn remove(&mut self, node: Self::Node);
    /// Set an attribute.
    fn set_attribute(&mut self, node: Self::Node, name: &str, value: &str);
    /// Remove an attribute.
    fn remove_attribute(&mut self, node: Self::Node, name: &str);
    /// Inline style value of one property.
    fn style_property(&self, node: Self::Node, name: &str) -> Option<String>;
    /// True if the inline declaration carries `!important`.
    fn style_property_is_important(&self, node: Self::Node, name: &str) -> bool;
    /// Write one inline declaration.
    fn set_style_property(&mut self, node: Self::Node, name: &str, value: &str, important: bool);

    // ---- observers ----

    /// Watch structure, text and [`OBSERVED_ATTRIBUTES`] under `root`.
    fn observe_subtree(&mut self, root: Self::Node) -> Self::Observer;
    /// Watch the `style` attribute of one element.
    fn observe_style(&mut self, node: Self::Node) -> Self::Observer;
    /// Stop an observer and drop its pending records.
    fn disconnect(&mut self, observer: Self::Observer);
    /// Drain pending records, returning how many there were.
    fn take_mutations(&mut self, observer: Self::Observer) -> usize;
}

fn native_error(selector: &str, error: &extcss_selectors::SelectorError) -> NativeSelectorError {
    NativeSelectorError {
        selector: selector.to_string(),
        reason: error.to_string(),
    }
}

impl Document for DomTree {
    type Node = NodeId;
    type Observer = ObserverId;

    fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    fn document_element(&self) -> Option<NodeId> {
        Self::document_element(self)
    }

    fn is_element(&self, node: NodeId) -> bool {
        self.as_element(node).is_some()
    }

    fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node)
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        Self::parent_element(self, node)
    }

    fn element_index(&self, node: NodeId) -> Option<usize> {
        Self::element_index(self, node)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        Self::is_connected(self, node)
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.as_element(node).map(|e| e.tag_name.clone())
    }

    fn sort_in_document_order(&self, nodes: &mut [NodeId]) {
        let order: std::collections::HashMap<NodeId, usize> = self
            .descendants(NodeId::ROOT)
            .into_iter()
            .enumerate()
            .map(|(index, node)| (node, index))
            .collect();
        nodes.sort_by_key(|node| order.get(node).copied().unwrap_or(usize::MAX));
    }

    fn query_selector_all(&self, context: NodeId, selector: &str) -> Result<Vec<NodeId>, NativeSelectorError> {
        extcss_selectors::query_selector_all(self, context, selector)
            .map_err(|e| native_error(selector, &e))
    }

    fn matches_selector(&self, node: NodeId, selector: &str) -> Result<bool, NativeSelectorError> {
        extcss_selectors::matches(self, node, selector).map_err(|e| native_error(selector, &e))
    }

    fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, NativeSelectorError> {
        extcss_selectors::closest(self, node, selector).map_err(|e| native_error(selector, &e))
    }

    fn validate_selector(&self, selector: &str) -> Result<(), NativeSelectorError> {
        extcss_selectors::validate(selector).map_err(|e| native_error(selector, &e))
    }

    fn text_content(&self, node: NodeId) -> String {
        Self::text_content(self, node)
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        let mut attributes: Vec<(String, String)> = self
            .as_element(node)
            .map(|e| e.attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        attributes.sort();
        attributes
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        Self::attribute(self, node, name).map(str::to_string)
    }

    fn computed_style(&self, node: NodeId, pseudo_element: Option<&str>, property: &str) -> Option<String> {
        Self::computed_style(self, node, pseudo_element, property)
    }

    fn own_properties(&self, node: NodeId) -> Option<&PropertyMap> {
        self.properties(node)
    }

    fn user_agent(&self) -> UserAgent {
        Self::user_agent(self)
    }

    fn evaluate_xpath(&self, context: NodeId, expression: &str) -> Result<Vec<NodeId>, String> {
        Self::evaluate_xpath(self, context, expression).map_err(|e| e.to_string())
    }

    fn remove(&mut self, node: NodeId) {
        self.detach(node);
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        Self::set_attribute(self, node, name, value);
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        Self::remove_attribute(self, node, name);
    }

    fn style_property(&self, node: NodeId, name: &str) -> Option<String> {
        Self::style_property(self, node, name)
    }

    fn style_property_is_important(&self, node: NodeId, name: &str) -> bool {
        Self::style_property_is_important(self, node, name)
    }

    fn set_style_property(&mut self, node: NodeId, name: &str, value: &str, important: bool) {
        Self::set_style_property(self, node, name, value, important);
    }

    fn observe_subtree(&mut self, root: NodeId) -> ObserverId {
        self.observe(root, ObserveOptions::subtree_with_attributes(&OBSERVED_ATTRIBUTES))
    }

    fn observe_style(&mut self, node: NodeId) -> ObserverId {
        self.observe(node, ObserveOptions::attribute("style"))
    }

    fn disconnect(&mut self, observer: ObserverId) {
        Self::disconnect(self, observer);
    }

    fn take_mutations(&mut self, observer: ObserverId) -> usize {
        self.take_records(observer).len()
    }
}
