//! [§ 4.3 Mutation observers](https://dom.spec.whatwg.org/#mutation-observers)
//!
//! Observers are registered against a target node and collect records for
//! every matching mutation until the host drains them with
//! [`DomTree::take_records`]. Delivery is pull-based: the tree never calls
//! back into observer code, so a mutation made while records are being
//! processed simply queues another record.

use crate::{DomTree, NodeId};

/// Handle for a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(usize);

/// [§ 4.3.1 MutationObserverInit](https://dom.spec.whatwg.org/#dictdef-mutationobserverinit)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Observe insertions and removals of children.
    pub child_list: bool,
    /// Observe attribute changes.
    pub attributes: bool,
    /// Observe text node data changes.
    pub character_data: bool,
    /// Extend observation to the whole subtree of the target.
    pub subtree: bool,
    /// Restrict attribute observation to these (lowercase) names.
    pub attribute_filter: Option<Vec<String>>,
}

impl ObserveOptions {
    /// Options for watching structure, text and the given attributes of a subtree.
    #[must_use]
    pub fn subtree_with_attributes(filter: &[&str]) -> Self {
        Self {
            child_list: true,
            attributes: true,
            character_data: true,
            subtree: true,
            attribute_filter: Some(filter.iter().map(|s| s.to_ascii_lowercase()).collect()),
        }
    }

    /// Options for watching a single attribute of the target only.
    #[must_use]
    pub fn attribute(name: &str) -> Self {
        Self {
            attributes: true,
            attribute_filter: Some(vec![name.to_ascii_lowercase()]),
            ..Self::default()
        }
    }
}

/// [§ 4.3.5 MutationRecord](https://dom.spec.whatwg.org/#interface-mutationrecord)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Node the mutation happened on (the parent for child list changes).
    pub target: NodeId,
    /// What changed.
    pub kind: MutationKind,
}

/// The type of a mutation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// Children were inserted or removed.
    ChildList {
        /// Inserted nodes.
        added: Vec<NodeId>,
        /// Removed nodes.
        removed: Vec<NodeId>,
    },
    /// An attribute was set or removed.
    Attributes {
        /// Lowercase attribute name.
        name: String,
        /// Value before the change, if the attribute existed.
        old_value: Option<String>,
    },
    /// A text node's data changed.
    CharacterData,
}

#[derive(Debug, Clone)]
struct Registration {
    target: NodeId,
    options: ObserveOptions,
    records: Vec<MutationRecord>,
}

impl Registration {
    fn wants(&self, tree: &DomTree, record: &MutationRecord) -> bool {
        let in_scope = record.target == self.target
            || (self.options.subtree && tree.is_descendant_of(record.target, self.target));
        if !in_scope {
            return false;
        }
        match &record.kind {
            MutationKind::ChildList { .. } => self.options.child_list,
            MutationKind::CharacterData => self.options.character_data,
            MutationKind::Attributes { name, .. } => {
                self.options.attributes
                    && self
                        .options
                        .attribute_filter
                        .as_ref()
                        .is_none_or(|filter| filter.iter().any(|f| f == name))
            }
        }
    }
}

/// Observer slots; a disconnected observer leaves a hole so ids stay unique.
#[derive(Debug, Clone, Default)]
pub(crate) struct ObserverRegistry {
    slots: Vec<Option<Registration>>,
}

impl DomTree {
    /// [§ 4.3.2 observe()](https://dom.spec.whatwg.org/#dom-mutationobserver-observe)
    ///
    /// Registers a new observer for `target`.
    pub fn observe(&mut self, target: NodeId, options: ObserveOptions) -> ObserverId {
        let id = ObserverId(self.observers.slots.len());
        self.observers.slots.push(Some(Registration {
            target,
            options,
            records: Vec::new(),
        }));
        id
    }

    /// [§ 4.3.2 disconnect()](https://dom.spec.whatwg.org/#dom-mutationobserver-disconnect)
    ///
    /// Unregisters the observer and drops its pending records.
    pub fn disconnect(&mut self, observer: ObserverId) {
        if let Some(slot) = self.observers.slots.get_mut(observer.0) {
            *slot = None;
        }
    }

    /// [§ 4.3.2 takeRecords()](https://dom.spec.whatwg.org/#dom-mutationobserver-takerecords)
    pub fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord> {
        self.observers
            .slots
            .get_mut(observer.0)
            .and_then(Option::as_mut)
            .map(|registration| std::mem::take(&mut registration.records))
            .unwrap_or_default()
    }

    /// True if the observer is still registered.
    #[must_use]
    pub fn is_observing(&self, observer: ObserverId) -> bool {
        self.observers
            .slots
            .get(observer.0)
            .is_some_and(Option::is_some)
    }

    /// True if any registered observer has undelivered records.
    #[must_use]
    pub fn has_pending_records(&self) -> bool {
        self.observers
            .slots
            .iter()
            .flatten()
            .any(|registration| !registration.records.is_empty())
    }

    /// [§ 4.3.3 Queue a mutation record](https://dom.spec.whatwg.org/#queueing-a-mutation-record)
    pub(crate) fn queue_mutation(&mut self, record: MutationRecord) {
        if self.observers.slots.iter().all(Option::is_none) {
            return;
        }
        let interested: Vec<usize> = self
            .observers
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .filter(|registration| registration.wants(self, &record))
                    .map(|_| index)
            })
            .collect();
        for index in interested {
            if let Some(registration) = self.observers.slots[index].as_mut() {
                registration.records.push(record.clone());
            }
        }
    }
}
