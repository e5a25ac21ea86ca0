//! Collapses `:is()`/`:not()` with plain arguments back into native text.
//!
//! `div:not(.ad)` parses as a regular fragment followed by a relative
//! pseudo-class, but the native engine can run it directly. Collapsing runs
//! bottom-up, so `:not(:is(.a))` becomes one regular fragment.

use crate::ast::{ExtendedSelector, Fragment, PseudoClassNode, Selector, SelectorList};
use crate::pseudo::PseudoClass;

/// Rewrite `list` in place. Never fails.
pub fn optimize(list: &mut SelectorList) {
    for selector in &mut list.selectors {
        optimize_selector(selector);
    }
}

fn optimize_selector(selector: &mut Selector) {
    for fragment in &mut selector.fragments {
        if let Fragment::Extended(ExtendedSelector {
            child: PseudoClassNode::Relative(relative),
        }) = fragment
        {
            optimize(&mut relative.selector_list);
        }
    }

    for fragment in &mut selector.fragments {
        if let Some(text) = native_form(fragment) {
            *fragment = Fragment::regular(text);
        }
    }

    selector.fragments = merge_regular(std::mem::take(&mut selector.fragments));
}

/// Native text for a collapsible `:is()`/`:not()` fragment.
fn native_form(fragment: &Fragment) -> Option<String> {
    let Fragment::Extended(ExtendedSelector {
        child: PseudoClassNode::Relative(relative),
    }) = fragment
    else {
        return None;
    };
    if !matches!(relative.name, PseudoClass::Is | PseudoClass::Not) {
        return None;
    }
    let list = &relative.selector_list;
    if !list.is_regular() || references_root(list) {
        return None;
    }
    Some(format!(":{}({list})", relative.name))
}

/// Join runs of adjacent regular fragments.
fn merge_regular(fragments: Vec<Fragment>) -> Vec<Fragment> {
    let mut merged: Vec<Fragment> = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        if let (Some(Fragment::Regular(previous)), Fragment::Regular(next)) =
            (merged.last_mut(), &fragment)
        {
            previous.value.push_str(&next.value);
            continue;
        }
        merged.push(fragment);
    }
    merged
}

/// True if the list can select the document root element.
///
/// The native engine resolves `:scope` and root-anchored compounds against
/// the query context, while the extended path evaluates `:is()`/`:not()`
/// against the whole document, so these stay extended.
fn references_root(list: &SelectorList) -> bool {
    let text = list.to_string().to_ascii_lowercase();
    text.contains(":root") || text.contains(":scope") || has_type_selector(&text, "html")
}

fn has_type_selector(text: &str, tag: &str) -> bool {
    let bytes = text.as_bytes();
    text.match_indices(tag).any(|(start, _)| {
        let before_ok = start == 0
            || matches!(bytes[start - 1], b' ' | b'>' | b'+' | b'~' | b',' | b'(');
        let end = start + tag.len();
        let after_ok = bytes
            .get(end)
            .is_none_or(|b| !(b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_')));
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::build;

    fn optimized(selector: &str) -> SelectorList {
        let mut list = build(selector).unwrap();
        optimize(&mut list);
        list
    }

    #[test]
    fn collapses_plain_not_into_neighbours() {
        let list = optimized("div:not(.ad, #x) > span");
        assert_eq!(
            list.selectors[0].fragments,
            vec![Fragment::regular("div:not(.ad, #x) > span")]
        );
    }

    #[test]
    fn collapses_nested_bottom_up() {
        let list = optimized("p:not(:is(.a))");
        assert_eq!(list.selectors[0].fragments, vec![Fragment::regular("p:not(:is(.a))")]);
    }

    #[test]
    fn keeps_extended_arguments() {
        let list = optimized("p:not(:contains(ad))");
        assert_eq!(list.selectors[0].fragments.len(), 2);
    }

    #[test]
    fn keeps_has() {
        let list = optimized("div:has(.ad)");
        assert_eq!(list.selectors[0].fragments.len(), 2);
    }

    #[test]
    fn root_references_stay_extended() {
        for selector in ["div:not(:root > *)", "div:is(html div)", "*:not(:scope)"] {
            let list = optimized(selector);
            assert_eq!(list.selectors[0].fragments.len(), 2, "{selector}");
        }
        let list = optimized("div:not(.html)");
        assert_eq!(list.selectors[0].fragments.len(), 1);
    }
}
