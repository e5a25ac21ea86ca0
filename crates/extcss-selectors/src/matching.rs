//! [§ 4.1 Selector Matching](https://www.w3.org/TR/selectors-4/#match-a-selector-against-an-element)

use extcss_dom::{DomTree, ElementData, NodeId, NodeType};

use crate::{
    AttributeOperator, AttributeSelector, Combinator, ComplexSelector, CompoundSelector, PseudoClass,
    SimpleSelector,
};

/// Match a complex selector against `node`, with `scope` as the `:scope`
/// element.
pub(crate) fn complex_matches(complex: &ComplexSelector, tree: &DomTree, node: NodeId, scope: NodeId) -> bool {
    compound_matches(&complex.subject, tree, node, scope) && chain_matches(&complex.combinators, tree, node, scope)
}

/// [§ 16 Combinators](https://www.w3.org/TR/selectors-4/#combinators)
///
/// Walks the chain from the subject outward. Descendant and subsequent-sibling
/// steps try every candidate, so `a > b c` finds the `b` whose parent is an
/// `a` even when a nearer `b` ancestor does not qualify.
fn chain_matches(chain: &[(Combinator, CompoundSelector)], tree: &DomTree, node: NodeId, scope: NodeId) -> bool {
    let Some(((combinator, compound), rest)) = chain.split_first() else {
        return true;
    };
    let step = |candidate: NodeId| {
        compound_matches(compound, tree, candidate, scope) && chain_matches(rest, tree, candidate, scope)
    };

    match combinator {
        // "A selector of the form 'A B' represents an element B that is an
        // arbitrary descendant of some ancestor element A."
        Combinator::Descendant => tree.ancestors(node).any(step),

        // "A selector of the form 'A > B' represents an element B that is a
        // direct child of element A."
        Combinator::Child => tree.parent(node).is_some_and(step),

        // "...represents an element B that immediately follows element A,
        // where A and B share the same parent."
        Combinator::NextSibling => previous_element_sibling(tree, node).is_some_and(step),

        // "...represents an element B that follows element A (not necessarily
        // immediately), where A and B share the same parent."
        Combinator::SubsequentSibling => tree
            .preceding_siblings(node)
            .filter(|&sibling| tree.as_element(sibling).is_some())
            .any(step),
    }
}

/// Check if a compound selector matches a node.
///
/// Only elements match, except that a compound made solely of `:scope` also
/// matches a document scoping root.
fn compound_matches(compound: &CompoundSelector, tree: &DomTree, node: NodeId, scope: NodeId) -> bool {
    let Some(element) = tree.as_element(node) else {
        return node == scope
            && compound
                .simple_selectors
                .iter()
                .all(|simple| matches!(simple, SimpleSelector::PseudoClass(PseudoClass::Scope)));
    };
    compound
        .simple_selectors
        .iter()
        .all(|simple| simple_matches(simple, tree, node, element, scope))
}

fn simple_matches(
    simple: &SimpleSelector,
    tree: &DomTree,
    node: NodeId,
    element: &ElementData,
    scope: NodeId,
) -> bool {
    match simple {
        SimpleSelector::Type(name) => element.tag_name.eq_ignore_ascii_case(name),
        SimpleSelector::Class(class_name) => element.classes().contains(class_name.as_str()),
        SimpleSelector::Id(id) => element.id().is_some_and(|el_id| el_id == id),
        SimpleSelector::Universal => true,
        SimpleSelector::NeverMatch => false,
        SimpleSelector::Attribute(attribute) => attribute_matches(attribute, element),
        SimpleSelector::PseudoClass(pc) => pseudo_class_matches(*pc, tree, node, element, scope),
        SimpleSelector::Not(list) => !list.matches_in_tree(tree, node, scope),
        SimpleSelector::Is(list) => list.matches_in_tree(tree, node, scope),
    }
}

/// [§ 6.4 Attribute selectors](https://www.w3.org/TR/selectors-4/#attribute-selectors)
fn attribute_matches(selector: &AttributeSelector, element: &ElementData) -> bool {
    let Some(actual) = element.attrs.get(&selector.name) else {
        return false;
    };
    let Some((operator, expected)) = &selector.operation else {
        return true;
    };
    let (actual, expected) = if selector.case_insensitive {
        (actual.to_lowercase(), expected.to_lowercase())
    } else {
        (actual.clone(), expected.clone())
    };

    match operator {
        AttributeOperator::Equals => actual == expected,
        AttributeOperator::Includes => {
            !expected.is_empty() && actual.split_ascii_whitespace().any(|word| word == expected)
        }
        AttributeOperator::DashMatch => {
            actual == expected || actual.starts_with(&format!("{expected}-"))
        }
        // "If 'val' is the empty string then the selector does not represent anything."
        AttributeOperator::Prefix => !expected.is_empty() && actual.starts_with(&expected),
        AttributeOperator::Suffix => !expected.is_empty() && actual.ends_with(&expected),
        AttributeOperator::Substring => !expected.is_empty() && actual.contains(&expected),
    }
}

/// [§ 4 Pseudo-classes](https://www.w3.org/TR/selectors-4/#pseudo-classes)
fn pseudo_class_matches(
    pc: PseudoClass,
    tree: &DomTree,
    node: NodeId,
    element: &ElementData,
    scope: NodeId,
) -> bool {
    let same_type = |candidate: NodeId| {
        tree.as_element(candidate)
            .is_some_and(|e| e.tag_name.eq_ignore_ascii_case(&element.tag_name))
    };

    match pc {
        // "In HTML, this is the <html> element."
        PseudoClass::Root => tree.document_element() == Some(node),
        PseudoClass::Scope => node == scope,
        PseudoClass::FirstChild => sibling_position(tree, node, |_| true, false) == Some(1),
        PseudoClass::LastChild => sibling_position(tree, node, |_| true, true) == Some(1),
        PseudoClass::OnlyChild => {
            sibling_position(tree, node, |_| true, false) == Some(1)
                && sibling_position(tree, node, |_| true, true) == Some(1)
        }
        PseudoClass::FirstOfType => sibling_position(tree, node, same_type, false) == Some(1),
        PseudoClass::LastOfType => sibling_position(tree, node, same_type, true) == Some(1),
        PseudoClass::OnlyOfType => {
            sibling_position(tree, node, same_type, false) == Some(1)
                && sibling_position(tree, node, same_type, true) == Some(1)
        }
        PseudoClass::NthChild(nth) => {
            sibling_position(tree, node, |_| true, false).is_some_and(|i| nth.matches(i))
        }
        PseudoClass::NthLastChild(nth) => {
            sibling_position(tree, node, |_| true, true).is_some_and(|i| nth.matches(i))
        }
        PseudoClass::NthOfType(nth) => {
            sibling_position(tree, node, same_type, false).is_some_and(|i| nth.matches(i))
        }
        PseudoClass::NthLastOfType(nth) => {
            sibling_position(tree, node, same_type, true).is_some_and(|i| nth.matches(i))
        }

        // "The :empty pseudo-class represents an element that has no children
        // except, optionally, document white space characters."
        PseudoClass::Empty => tree
            .children(node)
            .iter()
            .all(|&c| match tree.get(c).map(|n| &n.node_type) {
                Some(NodeType::Text(t)) => t.trim().is_empty(),
                Some(NodeType::Comment(_)) => true,
                _ => false,
            }),

        PseudoClass::Link => {
            matches!(element.tag_name.as_str(), "a" | "area") && element.attrs.contains_key("href")
        }
        PseudoClass::Disabled => is_form_control(element) && element.attrs.contains_key("disabled"),
        PseudoClass::Enabled => is_form_control(element) && !element.attrs.contains_key("disabled"),
        PseudoClass::Checked => match element.tag_name.as_str() {
            "input" => element.attrs.contains_key("checked"),
            "option" => element.attrs.contains_key("selected"),
            _ => false,
        },
    }
}

fn is_form_control(element: &ElementData) -> bool {
    matches!(
        element.tag_name.as_str(),
        "button" | "input" | "select" | "textarea" | "optgroup" | "option" | "fieldset"
    )
}

/// 1-based position of `node` among its element siblings that satisfy
/// `filter`, counted from the start or from the end. `None` for nodes
/// without a parent.
fn sibling_position(
    tree: &DomTree,
    node: NodeId,
    filter: impl Fn(NodeId) -> bool,
    from_end: bool,
) -> Option<usize> {
    let parent = tree.parent(node)?;
    let mut siblings = tree.element_children(parent).filter(|&c| filter(c));
    let position = if from_end {
        siblings.collect::<Vec<_>>().into_iter().rev().position(|c| c == node)
    } else {
        siblings.position(|c| c == node)
    };
    position.map(|i| i + 1)
}

fn previous_element_sibling(tree: &DomTree, node: NodeId) -> Option<NodeId> {
    tree.preceding_siblings(node)
        .find(|&sibling| tree.as_element(sibling).is_some())
}
