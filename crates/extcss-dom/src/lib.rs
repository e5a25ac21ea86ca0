//! Live document tree for the extcss engine.
//!
//! This crate provides an arena-based DOM tree following the
//! [DOM Living Standard](https://dom.spec.whatwg.org/), extended with the
//! pieces an extended-selector engine needs from its host:
//!
//! - mutation observers with subtree and attribute filters ([`mutation`])
//! - inline style read/write through the `style` attribute ([`style`])
//! - a computed-style lookup per element and pseudo-element
//! - an own-property graph per element ([`property`])
//! - an `XPath` 1.0 subset evaluator ([`xpath`])
//!
//! # Design
//!
//! The tree uses arena allocation with [`NodeId`] indices for all relationships,
//! providing O(1) access and traversal without borrow checker issues. Detached
//! nodes keep their slot, so a removed element can be re-inserted with the
//! same identity.

pub mod mutation;
pub mod property;
pub mod style;
pub mod xpath;

use std::collections::{HashMap, HashSet};

pub use mutation::{MutationKind, MutationRecord, ObserveOptions, ObserverId};
pub use property::{PropertyMap, PropertyValue};
pub use style::InlineDeclaration;

use mutation::ObserverRegistry;

/// Map of attribute names to values for an element.
pub type AttributesMap = HashMap<String, String>;

/// A type-safe index into the DOM tree.
///
/// [§ 4.4 Interface Node](https://dom.spec.whatwg.org/#interface-node)
/// "Each node has an associated node document..."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The root document node is always at index 0.
    pub const ROOT: Self = Self(0);
}

/// [§ 4.4 Interface Node](https://dom.spec.whatwg.org/#interface-node)
///
/// "Node is an abstract interface that is used by all nodes in a tree."
#[derive(Debug, Clone)]
pub struct Node {
    /// "Each node has an associated node type"
    pub node_type: NodeType,

    /// [§ 4.4](https://dom.spec.whatwg.org/#concept-tree-parent)
    /// "An object that participates in a tree has a parent, which is either
    /// null or an object."
    pub parent: Option<NodeId>,

    /// [§ 4.4](https://dom.spec.whatwg.org/#concept-tree-child)
    /// "A node has an associated list of children"
    pub children: Vec<NodeId>,

    /// [§ 4.4](https://dom.spec.whatwg.org/#concept-tree-next-sibling)
    pub next_sibling: Option<NodeId>,

    /// [§ 4.4](https://dom.spec.whatwg.org/#concept-tree-previous-sibling)
    pub prev_sibling: Option<NodeId>,
}

/// [§ 4.4 Interface Node](https://dom.spec.whatwg.org/#interface-node)
///
/// "Each node has an associated node type"
#[derive(Debug, Clone)]
pub enum NodeType {
    /// [§ 4.5 Interface Document](https://dom.spec.whatwg.org/#interface-document)
    Document,
    /// [§ 4.9 Interface Element](https://dom.spec.whatwg.org/#interface-element)
    Element(ElementData),
    /// [§ 4.10 Interface Text](https://dom.spec.whatwg.org/#interface-text)
    Text(String),
    /// [§ 4.7 Interface Comment](https://dom.spec.whatwg.org/#interface-comment)
    Comment(String),
}

/// Element-specific data.
///
/// NOTE: We only store the local name, the attribute list and the script-visible
/// own properties. Namespaces and custom element state are out of scope.
#[derive(Debug, Clone, Default)]
pub struct ElementData {
    /// "An element's local name"
    pub tag_name: String,
    /// "An element has an associated attribute list"
    pub attrs: AttributesMap,
    /// Own properties assigned by page scripts (`element.foo = {...}`).
    pub properties: PropertyMap,
}

impl ElementData {
    /// Create element data with the given tag name and no attributes.
    #[must_use]
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Returns the element's id attribute value if present.
    #[must_use]
    pub fn id(&self) -> Option<&String> {
        self.attrs.get("id")
    }

    /// Returns the set of class names from the class attribute.
    ///
    /// Per [§ 3.2.6 Global attributes](https://html.spec.whatwg.org/multipage/dom.html#global-attributes):
    /// "The class attribute, if specified, must have a value that is a set of
    /// space-separated tokens representing the various classes that the element belongs to."
    #[must_use]
    pub fn classes(&self) -> HashSet<&str> {
        match self.attrs.get("class") {
            Some(classlist) => classlist.split_ascii_whitespace().collect(),
            None => HashSet::new(),
        }
    }
}

/// Browser family reported by the host. Some computed values are reported
/// with engine-specific precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserAgent {
    /// Any engine without known quirks.
    #[default]
    Generic,
    /// `WebKit`/Safari: `opacity` is reported with float noise.
    Safari,
}

/// Arena-based DOM tree with O(1) node access and traversal.
///
/// [§ 4 Nodes](https://dom.spec.whatwg.org/#nodes)
#[derive(Debug, Clone, Default)]
pub struct DomTree {
    /// All nodes in the tree, indexed by `NodeId`.
    /// The Document node is always at index 0 (`NodeId::ROOT`).
    nodes: Vec<Node>,
    /// Registered mutation observers and their pending records.
    observers: ObserverRegistry,
    /// Author-level computed values, keyed by element and pseudo-element.
    computed: HashMap<(NodeId, Option<String>), HashMap<String, String>>,
    /// Engine quirks reported to style matchers.
    user_agent: UserAgent,
}

impl DomTree {
    /// Create a new DOM tree with just the Document node.
    #[must_use]
    pub fn new() -> Self {
        let document = Node {
            node_type: NodeType::Document,
            parent: None,
            children: Vec::new(),
            next_sibling: None,
            prev_sibling: None,
        };
        Self {
            nodes: vec![document],
            ..Self::default()
        }
    }

    /// Get the root document node ID.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by its ID.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Get the number of nodes in the arena, attached or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the arena is empty (should always have at least the Document).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The engine family this document reports.
    #[must_use]
    pub const fn user_agent(&self) -> UserAgent {
        self.user_agent
    }

    /// Change the reported engine family.
    pub fn set_user_agent(&mut self, user_agent: UserAgent) {
        self.user_agent = user_agent;
    }

    /// Allocate a new node and return its ID.
    /// The node is not yet attached to the tree.
    pub fn alloc(&mut self, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            node_type,
            parent: None,
            children: Vec::new(),
            next_sibling: None,
            prev_sibling: None,
        });
        id
    }

    /// Allocate an element, set its attributes and append it to `parent`.
    ///
    /// Convenience for hosts and tests that build documents by hand.
    pub fn create_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let mut data = ElementData::new(tag);
        for (name, value) in attrs {
            let _ = data
                .attrs
                .insert((*name).to_ascii_lowercase(), (*value).to_string());
        }
        let id = self.alloc(NodeType::Element(data));
        self.append_child(parent, id);
        id
    }

    /// Allocate a text node with `text` and append it to `parent`.
    pub fn create_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.alloc(NodeType::Text(text.to_string()));
        self.append_child(parent, id);
        id
    }

    /// [§ 4.2.2 Append](https://dom.spec.whatwg.org/#concept-node-append)
    ///
    /// "To append a node to a parent, pre-insert node into parent before null."
    ///
    /// Appends `child` as the last child of `parent`, detaching it from its
    /// current parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_child(parent, child, None);
    }

    /// [§ 4.2.3 Pre-insert](https://dom.spec.whatwg.org/#concept-node-pre-insert)
    ///
    /// Inserts `child` into `parent` immediately before `reference`.
    /// If `reference` is not a child of `parent`, `child` is appended.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.insert_child(parent, child, Some(reference));
    }

    fn insert_child(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if self.parent(child).is_some() {
            self.detach(child);
        }

        let position = reference
            .and_then(|r| self.nodes[parent.0].children.iter().position(|&c| c == r))
            .unwrap_or(self.nodes[parent.0].children.len());

        self.nodes[parent.0].children.insert(position, child);
        self.nodes[child.0].parent = Some(parent);
        self.relink_siblings(parent);

        self.queue_mutation(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: vec![child],
                removed: Vec::new(),
            },
        });
    }

    /// [§ 4.2.4 Remove](https://dom.spec.whatwg.org/#concept-node-remove)
    ///
    /// Removes `child` from `parent`. The node keeps its arena slot and its
    /// own subtree, so it can be re-inserted later.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        let Some(position) = self.nodes[parent.0].children.iter().position(|&c| c == child) else {
            return;
        };

        // Queue before unlinking so subtree observers still see the parent
        // inside their subtree.
        self.queue_mutation(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: Vec::new(),
                removed: vec![child],
            },
        });

        let _ = self.nodes[parent.0].children.remove(position);
        let node = &mut self.nodes[child.0];
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
        self.relink_siblings(parent);
    }

    /// Removes `node` from its parent, if it has one.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.parent(node) {
            self.remove_child(parent, node);
        }
    }

    fn relink_siblings(&mut self, parent: NodeId) {
        let children = self.nodes[parent.0].children.clone();
        for (index, &child) in children.iter().enumerate() {
            let node = &mut self.nodes[child.0];
            node.prev_sibling = index.checked_sub(1).map(|i| children[i]);
            node.next_sibling = children.get(index + 1).copied();
        }
    }

    /// Get the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Get the parent of a node if that parent is an element.
    #[must_use]
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|&p| self.as_element(p).is_some())
    }

    /// Get all children of a node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Get the element children of a node, skipping text and comments.
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.as_element(c).is_some())
    }

    /// Get the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.next_sibling)
    }

    /// Get the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.prev_sibling)
    }

    /// 1-based position of an element among its parent's element children.
    #[must_use]
    pub fn element_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.element_children(parent)
            .position(|c| c == id)
            .map(|i| i + 1)
    }

    /// [§ 4.2.6 Descendant](https://dom.spec.whatwg.org/#concept-tree-descendant)
    ///
    /// Check if `descendant` is a descendant of `ancestor`.
    #[must_use]
    pub fn is_descendant_of(&self, descendant: NodeId, ancestor: NodeId) -> bool {
        self.ancestors(descendant).any(|id| id == ancestor)
    }

    /// [§ 4.2.1 Connected](https://dom.spec.whatwg.org/#connected)
    ///
    /// True if the node's root is the document.
    #[must_use]
    pub fn is_connected(&self, id: NodeId) -> bool {
        id == NodeId::ROOT || self.is_descendant_of(id, NodeId::ROOT)
    }

    /// Iterate over all ancestors of a node, from parent to root.
    pub fn ancestors(&self, id: NodeId) -> AncestorIterator<'_> {
        AncestorIterator {
            tree: self,
            current: self.parent(id),
        }
    }

    /// Iterate over preceding siblings (from immediately before to first child).
    pub fn preceding_siblings(&self, id: NodeId) -> PrecedingSiblingIterator<'_> {
        PrecedingSiblingIterator {
            tree: self,
            current: self.prev_sibling(id),
        }
    }

    /// All descendants of `id` in tree order, excluding `id` itself.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Get element data if this node is an element.
    #[must_use]
    pub fn as_element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(|n| match &n.node_type {
            NodeType::Element(data) => Some(data),
            _ => None,
        })
    }

    fn as_element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.nodes.get_mut(id.0).and_then(|n| match &mut n.node_type {
            NodeType::Element(data) => Some(data),
            _ => None,
        })
    }

    /// Get text content if this node is a text node.
    #[must_use]
    pub fn as_text(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.node_type {
            NodeType::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// [§ 4.4 textContent](https://dom.spec.whatwg.org/#dom-node-textcontent)
    ///
    /// "The descendant text content of a node is the concatenation of the
    /// data of all the Text node descendants of node, in tree order."
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.as_text(id) {
            return text.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|d| self.as_text(d))
            .collect()
    }

    /// Replace the data of a text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        let Some(node) = self.nodes.get_mut(id.0) else {
            return;
        };
        if let NodeType::Text(data) = &mut node.node_type {
            text.clone_into(data);
            self.queue_mutation(MutationRecord {
                target: id,
                kind: MutationKind::CharacterData,
            });
        }
    }

    /// Read an attribute value.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.as_element(id)
            .and_then(|e| e.attrs.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }

    /// [§ 4.9 setAttribute](https://dom.spec.whatwg.org/#dom-element-setattribute)
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let Some(element) = self.as_element_mut(id) else {
            return;
        };
        let old_value = element.attrs.insert(name.clone(), value.to_string());
        self.queue_mutation(MutationRecord {
            target: id,
            kind: MutationKind::Attributes { name, old_value },
        });
    }

    /// [§ 4.9 removeAttribute](https://dom.spec.whatwg.org/#dom-element-removeattribute)
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        let Some(element) = self.as_element_mut(id) else {
            return;
        };
        let Some(old_value) = element.attrs.remove(&name) else {
            return;
        };
        self.queue_mutation(MutationRecord {
            target: id,
            kind: MutationKind::Attributes {
                name,
                old_value: Some(old_value),
            },
        });
    }

    /// Own properties of an element, if it is one.
    #[must_use]
    pub fn properties(&self, id: NodeId) -> Option<&PropertyMap> {
        self.as_element(id).map(|e| &e.properties)
    }

    /// Assign an own property on an element (`element[name] = value`).
    ///
    /// Property writes are not observable through mutation observers.
    pub fn set_property(&mut self, id: NodeId, name: &str, value: PropertyValue) {
        if let Some(element) = self.as_element_mut(id) {
            let _ = element.properties.insert(name.to_string(), value);
        }
    }

    /// Record an author-level computed value for `property` on an element or
    /// one of its pseudo-elements (`Some("before")`).
    pub fn set_computed_style(
        &mut self,
        id: NodeId,
        pseudo_element: Option<&str>,
        property: &str,
        value: &str,
    ) {
        let key = (id, pseudo_element.map(normalize_pseudo_element));
        let _ = self
            .computed
            .entry(key)
            .or_default()
            .insert(property.to_ascii_lowercase(), value.to_string());
    }

    /// [CSSOM § 9 getComputedStyle](https://drafts.csswg.org/cssom/#dom-window-getcomputedstyle)
    ///
    /// Resolves `property` for an element or one of its pseudo-elements.
    /// Inline style wins over author values, which win over the few
    /// user-agent defaults this tree knows about.
    #[must_use]
    pub fn computed_style(
        &self,
        id: NodeId,
        pseudo_element: Option<&str>,
        property: &str,
    ) -> Option<String> {
        let element = self.as_element(id)?;
        let property = property.to_ascii_lowercase();
        let pseudo = pseudo_element.map(normalize_pseudo_element);

        if pseudo.is_none() {
            if let Some(value) = self.style_property(id, &property) {
                return Some(value);
            }
        }
        if let Some(value) = self
            .computed
            .get(&(id, pseudo.clone()))
            .and_then(|styles| styles.get(&property))
        {
            return Some(value.clone());
        }
        if pseudo.is_some() {
            return None;
        }
        style::user_agent_default(&element.tag_name, &property).map(str::to_string)
    }

    /// [§ 3.1.1 The document element](https://html.spec.whatwg.org/multipage/dom.html#the-html-element-2)
    ///
    /// "The document element of a document is the element whose parent is that
    /// document, if it exists; otherwise null."
    #[must_use]
    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(NodeId::ROOT).next()
    }

    /// [§ 3.1.3 The body element](https://html.spec.whatwg.org/multipage/dom.html#the-body-element-2)
    #[must_use]
    pub fn body(&self) -> Option<NodeId> {
        let html = self.document_element()?;
        self.element_children(html).find(|&id| {
            self.as_element(id)
                .is_some_and(|e| e.tag_name == "body" || e.tag_name == "frameset")
        })
    }
}

/// `::before`, `:before` and `before` all name the same pseudo-element.
fn normalize_pseudo_element(name: &str) -> String {
    name.trim_start_matches(':').to_ascii_lowercase()
}

/// Iterator over ancestors of a node.
pub struct AncestorIterator<'a> {
    tree: &'a DomTree,
    current: Option<NodeId>,
}

impl Iterator for AncestorIterator<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        self.current = self.tree.parent(id);
        Some(id)
    }
}

/// Iterator over preceding siblings of a node.
pub struct PrecedingSiblingIterator<'a> {
    tree: &'a DomTree,
    current: Option<NodeId>,
}

impl Iterator for PrecedingSiblingIterator<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        self.current = self.tree.prev_sibling(id);
        Some(id)
    }
}
