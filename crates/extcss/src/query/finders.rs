//! Absolute finder pseudo-classes: `:nth-ancestor()`, `:upward()` and
//! `:xpath()`.
//!
//! Finders replace each candidate with the elements they locate from it.

use crate::document::Document;
use crate::error::MatchFailure;

/// Largest accepted ancestor depth.
pub const MAX_ANCESTOR_DEPTH: u32 = 255;

/// What `:upward()` climbs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpwardTarget {
    /// A fixed number of levels.
    Depth(u32),
    /// The nearest ancestor matching a native selector.
    Selector(String),
}

/// Parse an ancestor depth in `1..=255`.
///
/// # Errors
///
/// Returns [`MatchFailure::AncestorDepth`] for anything else.
pub fn parse_depth(arg: &str) -> Result<u32, MatchFailure> {
    arg.trim()
        .parse::<u32>()
        .ok()
        .filter(|depth| (1..=MAX_ANCESTOR_DEPTH).contains(depth))
        .ok_or_else(|| MatchFailure::AncestorDepth(arg.trim().to_string()))
}

/// Parse the argument of `:upward()`. Anything that looks like a number is
/// a depth; everything else must be a valid native selector.
///
/// # Errors
///
/// Returns [`MatchFailure::AncestorDepth`] for an out-of-range number and
/// [`MatchFailure::Selector`] for an invalid selector.
pub fn parse_upward<D: Document>(doc: &D, arg: &str) -> Result<UpwardTarget, MatchFailure> {
    let arg = arg.trim();
    if arg.parse::<i64>().is_ok() {
        return parse_depth(arg).map(UpwardTarget::Depth);
    }
    doc.validate_selector(arg)
        .map_err(|e| MatchFailure::Selector(e.reason))?;
    Ok(UpwardTarget::Selector(arg.to_string()))
}

/// Walk `depth` parent elements up from `node`.
///
/// # Errors
///
/// Returns [`MatchFailure::PastRoot`] if the walk leaves the document
/// element behind.
pub fn nth_ancestor<D: Document>(doc: &D, node: D::Node, depth: u32) -> Result<D::Node, MatchFailure> {
    let mut current = node;
    for _ in 0..depth {
        current = doc
            .parent_element(current)
            .ok_or(MatchFailure::PastRoot(depth))?;
    }
    Ok(current)
}

/// Find the `:upward()` target of one candidate.
///
/// # Errors
///
/// Propagates [`nth_ancestor`] failures; a selector target that matches no
/// ancestor yields `Ok(None)`.
pub fn upward<D: Document>(
    doc: &D,
    node: D::Node,
    target: &UpwardTarget,
) -> Result<Option<D::Node>, MatchFailure> {
    match target {
        UpwardTarget::Depth(depth) => nth_ancestor(doc, node, *depth).map(Some),
        UpwardTarget::Selector(selector) => {
            let Some(parent) = doc.parent_element(node) else {
                return Ok(None);
            };
            doc.closest(parent, selector)
                .map_err(|e| MatchFailure::Selector(e.reason))
        }
    }
}

/// Evaluate `expression` from `context`, keeping elements only.
///
/// # Errors
///
/// Returns [`MatchFailure::XPath`] for an invalid expression.
pub fn xpath<D: Document>(doc: &D, context: D::Node, expression: &str) -> Result<Vec<D::Node>, MatchFailure> {
    let nodes = doc
        .evaluate_xpath(context, expression)
        .map_err(MatchFailure::XPath)?;
    Ok(nodes.into_iter().filter(|&n| doc.is_element(n)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_bounds() {
        assert_eq!(parse_depth("1"), Ok(1));
        assert_eq!(parse_depth(" 255 "), Ok(255));
        assert_eq!(parse_depth("0"), Err(MatchFailure::AncestorDepth("0".to_string())));
        assert_eq!(parse_depth("256"), Err(MatchFailure::AncestorDepth("256".to_string())));
        assert_eq!(parse_depth("-1"), Err(MatchFailure::AncestorDepth("-1".to_string())));
        assert_eq!(parse_depth("two"), Err(MatchFailure::AncestorDepth("two".to_string())));
    }
}
