//! Tests for evaluating extended selectors against a document.

use extcss::{
    Error, MatchError, MatchFailure, PseudoClass, QueryError, SelectorCache, matches, parse, query,
    select_elements_in, validate, with_shared_cache,
};
use extcss_dom::{DomTree, NodeId, PropertyMap, PropertyValue};

/// `<html><body>` with the body returned.
fn document() -> (DomTree, NodeId) {
    let mut tree = DomTree::new();
    let html = tree.create_element(NodeId::ROOT, "html", &[]);
    let body = tree.create_element(html, "body", &[]);
    (tree, body)
}

fn element_with_text(tree: &mut DomTree, parent: NodeId, tag: &str, attrs: &[(&str, &str)], text: &str) -> NodeId {
    let element = tree.create_element(parent, tag, attrs);
    let _ = tree.create_text(element, text);
    element
}

fn match_failure(error: Error) -> (PseudoClass, MatchFailure) {
    match error {
        Error::Query(QueryError::Match(MatchError::PseudoClass { name, reason, .. })) => (name, reason),
        other => panic!("expected a match error, got {other:?}"),
    }
}

// ========== relative pseudo-classes ==========

#[test]
fn test_has_selects_containers() {
    let (mut tree, body) = document();
    let with_banner = tree.create_element(body, "div", &[]);
    let _ = tree.create_element(with_banner, "span", &[("class", "banner")]);
    let _plain = tree.create_element(body, "div", &[]);

    assert_eq!(query(&tree, "div:has(.banner)").unwrap(), vec![with_banner]);
    assert_eq!(query(&tree, "div:-abp-has(.banner)").unwrap(), vec![with_banner]);
    assert_eq!(query(&tree, "div:if(.banner)").unwrap(), vec![with_banner]);
}

#[test]
fn test_has_with_child_and_sibling_combinators() {
    let (mut tree, body) = document();
    let outer = tree.create_element(body, "div", &[("id", "outer")]);
    let inner = tree.create_element(outer, "div", &[("id", "inner")]);
    let _ = tree.create_element(inner, "a", &[]);
    let _ = tree.create_element(body, "p", &[("class", "next")]);

    assert_eq!(query(&tree, "div:has(> a)").unwrap(), vec![inner]);
    assert_eq!(query(&tree, "div:has(a)").unwrap(), vec![outer, inner]);
    assert_eq!(query(&tree, "div:has(+ .next)").unwrap(), vec![outer]);
    assert_eq!(query(&tree, "div:has(~ p)").unwrap(), vec![outer]);
    assert!(query(&tree, "p:has(+ div)").unwrap().is_empty());
}

#[test]
fn test_if_not_inverts_has() {
    let (mut tree, body) = document();
    let with_img = tree.create_element(body, "div", &[]);
    let _ = tree.create_element(with_img, "img", &[]);
    let without = tree.create_element(body, "div", &[]);

    assert_eq!(query(&tree, "div:if-not(img)").unwrap(), vec![without]);
    assert_eq!(query(&tree, "div:not(:has(img))").unwrap(), vec![without]);
}

#[test]
fn test_is_and_not_with_extended_arguments() {
    let (mut tree, body) = document();
    let ad = element_with_text(&mut tree, body, "p", &[], "buy this ad");
    let story = element_with_text(&mut tree, body, "p", &[], "news story");

    assert_eq!(query(&tree, "p:is(:contains(ad))").unwrap(), vec![ad]);
    assert_eq!(query(&tree, "p:not(:contains(ad))").unwrap(), vec![story]);
}

#[test]
fn test_nested_has_inside_has() {
    let (mut tree, body) = document();
    let section = tree.create_element(body, "section", &[]);
    let card = tree.create_element(section, "div", &[]);
    let _ = element_with_text(&mut tree, card, "span", &[], "Sponsored");
    let _other = tree.create_element(body, "section", &[]);

    assert_eq!(query(&tree, "section:has(div:has(span:contains(Sponsored)))").unwrap(), vec![section]);
}

// ========== text ==========

#[test]
fn test_contains_substring_and_regex() {
    let (mut tree, body) = document();
    let upper = element_with_text(&mut tree, body, "p", &[], "Advertisement");
    let lower = element_with_text(&mut tree, body, "p", &[], "advertisement (paid)");

    assert_eq!(query(&tree, "p:contains(Advert)").unwrap(), vec![upper]);
    assert_eq!(query(&tree, "p:has-text(/^advert/i)").unwrap(), vec![upper, lower]);
    assert_eq!(query(&tree, r"p:-abp-contains(\(paid\))").unwrap(), vec![lower]);
}

#[test]
fn test_contains_then_child_combinator() {
    let (mut tree, body) = document();
    let ad = element_with_text(&mut tree, body, "div", &[], "ad");
    let span = tree.create_element(ad, "span", &[]);
    let other = element_with_text(&mut tree, body, "div", &[], "story");
    let _ = tree.create_element(other, "span", &[]);

    assert_eq!(query(&tree, "div:contains(ad) > span").unwrap(), vec![span]);
}

// ========== computed style ==========

#[test]
fn test_matches_css_on_element_and_pseudo_elements() {
    let (mut tree, body) = document();
    let banner = tree.create_element(body, "div", &[]);
    tree.set_computed_style(banner, None, "background-image", "url(/img/ad.png)");
    tree.set_computed_style(banner, Some("before"), "content", "\"Ad\"");
    let hidden = tree.create_element(body, "div", &[("style", "display: none")]);

    assert_eq!(query(&tree, r"div:matches-css(background-image: /ad\.png/)").unwrap(), vec![banner]);
    assert_eq!(
        query(&tree, r#"div:matches-css(background-image: url("/img/*"))"#).unwrap(),
        vec![banner]
    );
    assert_eq!(query(&tree, "div:matches-css-before(content: Ad)").unwrap(), vec![banner]);
    assert_eq!(query(&tree, "div:matches-css(before, content: Ad)").unwrap(), vec![banner]);
    assert_eq!(query(&tree, "div:matches-css(display: none)").unwrap(), vec![hidden]);
}

#[test]
fn test_matches_css_literal_urls_and_escapes() {
    let (mut tree, body) = document();
    let banner = tree.create_element(body, "div", &[]);
    tree.set_computed_style(banner, None, "background-image", "url(a.png)");
    tree.set_computed_style(banner, None, "width", "calc(100% - 1px)");

    assert_eq!(query(&tree, "div:matches-css(background-image: url(a.png))").unwrap(), vec![banner]);
    assert_eq!(query(&tree, "div:matches-css(background-image: url('a.png'))").unwrap(), vec![banner]);
    assert_eq!(query(&tree, r"div:matches-css(width: calc\(100% - 1px\))").unwrap(), vec![banner]);
    assert!(query(&tree, "div:matches-css(background-image: url(b.png))").unwrap().is_empty());
}

#[test]
fn test_matches_css_rejects_malformed_argument() {
    let (tree, _) = document();
    let (name, reason) = match_failure(query(&tree, "body:matches-css(display)").unwrap_err());
    assert_eq!(name, PseudoClass::MatchesCss);
    assert_eq!(reason, MatchFailure::StyleArgument);
}

// ========== attributes ==========

#[test]
fn test_matches_attr_regex_name_and_value() {
    let (mut tree, body) = document();
    let one = tree.create_element(body, "div", &[("x", ""), ("data-one", "click here")]);
    let _two = tree.create_element(body, "div", &[("x", ""), ("data-two", "other")]);
    let _three = tree.create_element(body, "div", &[("data-three", "click here")]);

    assert_eq!(query(&tree, r#"[x]:matches-attr("/data-/"="/click here/")"#).unwrap(), vec![one]);
}

#[test]
fn test_matches_attr_wildcards_and_presence() {
    let (mut tree, body) = document();
    let tracked = tree.create_element(body, "a", &[("data-track-id", "ad-17")]);
    let _plain = tree.create_element(body, "a", &[("href", "/")]);

    assert_eq!(query(&tree, "a:matches-attr(data-track-*)").unwrap(), vec![tracked]);
    assert_eq!(query(&tree, r#"a:matches-attr("data-track-id"="ad-*")"#).unwrap(), vec![tracked]);
    assert!(query(&tree, r#"a:matches-attr("data-track-id"="ad")"#).unwrap().is_empty());
}

#[test]
fn test_matches_attr_invalid_name() {
    let (tree, _) = document();
    let (_, reason) = match_failure(query(&tree, r#"div:matches-attr("a b"="c")"#).unwrap_err());
    assert_eq!(reason, MatchFailure::AttributeName("a b".to_string()));
}

// ========== properties ==========

fn object(entries: &[(&str, PropertyValue)]) -> PropertyValue {
    PropertyValue::Object(
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.clone()))
            .collect::<PropertyMap>(),
    )
}

#[test]
fn test_matches_property_null_matches_null_and_string() {
    let (mut tree, body) = document();
    let null = tree.create_element(body, "div", &[]);
    tree.set_property(null, "prop", object(&[("inner", PropertyValue::Null)]));
    let string = tree.create_element(body, "div", &[]);
    tree.set_property(string, "prop", object(&[("inner", PropertyValue::String("null".to_string()))]));
    let undefined = tree.create_element(body, "div", &[]);
    tree.set_property(undefined, "prop", object(&[("inner", PropertyValue::Undefined)]));

    assert_eq!(
        query(&tree, r#"div:matches-property("prop.inner"="null")"#).unwrap(),
        vec![null, string]
    );
    assert_eq!(query(&tree, "div:matches-property(prop.inner)").unwrap(), vec![null, string, undefined]);
}

#[test]
fn test_matches_property_regex_segments_and_values() {
    let (mut tree, body) = document();
    let ad = tree.create_element(body, "div", &[]);
    tree.set_property(ad, "__adSlot", object(&[("id", PropertyValue::Number(3.0))]));
    let other = tree.create_element(body, "div", &[]);
    tree.set_property(other, "__slot", object(&[("id", PropertyValue::Number(4.0))]));

    assert_eq!(query(&tree, "div:matches-property(/^__ad/.id=3)").unwrap(), vec![ad]);
    assert_eq!(query(&tree, "div:matches-property(/slot/i.id=/^[34]$/)").unwrap(), vec![ad, other]);
}

// ========== finders ==========

#[test]
fn test_nth_ancestor_bounds() {
    let (mut tree, body) = document();
    let div = tree.create_element(body, "div", &[]);
    let _p = tree.create_element(div, "p", &[]);

    assert_eq!(query(&tree, "p:nth-ancestor(1)").unwrap(), vec![div]);
    assert_eq!(query(&tree, "p:nth-ancestor(2)").unwrap(), vec![body]);

    let (name, reason) = match_failure(query(&tree, "p:nth-ancestor(4)").unwrap_err());
    assert_eq!(name, PseudoClass::NthAncestor);
    assert_eq!(reason, MatchFailure::PastRoot(4));

    for depth in ["0", "256", "-1"] {
        let (_, reason) = match_failure(query(&tree, &format!("p:nth-ancestor({depth})")).unwrap_err());
        assert_eq!(reason, MatchFailure::AncestorDepth(depth.to_string()));
    }
}

#[test]
fn test_nth_ancestor_max_depth() {
    let (mut tree, body) = document();
    let top = tree.create_element(body, "div", &[("id", "top")]);
    let mut current = top;
    for _ in 0..255 {
        current = tree.create_element(current, "div", &[]);
    }
    tree.set_attribute(current, "id", "deepest");

    assert_eq!(query(&tree, "#deepest:nth-ancestor(255)").unwrap(), vec![top]);
}

#[test]
fn test_upward_by_depth_and_selector() {
    let (mut tree, body) = document();
    let card = tree.create_element(body, "div", &[("class", "card")]);
    let inner = tree.create_element(card, "section", &[]);
    let _ = element_with_text(&mut tree, inner, "span", &[], "Sponsored");

    assert_eq!(query(&tree, "span:contains(Sponsored):upward(2)").unwrap(), vec![card]);
    assert_eq!(query(&tree, "span:contains(Sponsored):upward(.card)").unwrap(), vec![card]);
    assert!(query(&tree, "span:upward(.missing)").unwrap().is_empty());

    let (_, reason) = match_failure(query(&tree, "span:upward(0)").unwrap_err());
    assert_eq!(reason, MatchFailure::AncestorDepth("0".to_string()));
    let (_, reason) = match_failure(query(&tree, "span:upward(..bad)").unwrap_err());
    assert!(matches!(reason, MatchFailure::Selector(_)));
}

#[test]
fn test_xpath_from_document_and_candidates() {
    let (mut tree, body) = document();
    let ad = tree.create_element(body, "div", &[("class", "ad")]);
    let _p = tree.create_element(ad, "p", &[]);
    let _story = tree.create_element(body, "div", &[("class", "story")]);

    assert_eq!(query(&tree, r#":xpath(//div[@class="ad"])"#).unwrap(), vec![ad]);
    assert_eq!(query(&tree, "p:xpath(..)").unwrap(), vec![ad]);

    let (name, reason) = match_failure(query(&tree, "div:xpath(//div[)").unwrap_err());
    assert_eq!(name, PseudoClass::Xpath);
    assert!(matches!(reason, MatchFailure::XPath(_)));
}

#[test]
fn test_xpath_with_remove_is_allowed() {
    let (mut tree, body) = document();
    let ad = tree.create_element(body, "div", &[("class", "ad")]);
    assert_eq!(query(&tree, r#":xpath(//div[@class="ad"]):remove()"#).unwrap(), vec![ad]);
}

// ========== entry points ==========

#[test]
fn test_results_are_unique_and_in_document_order() {
    let (mut tree, body) = document();
    let first = element_with_text(&mut tree, body, "p", &[], "ad");
    let second = element_with_text(&mut tree, body, "p", &[], "story");

    assert_eq!(query(&tree, "p:contains(story), p, p:contains(ad)").unwrap(), vec![first, second]);
}

#[test]
fn test_matches_and_validate() {
    let (mut tree, body) = document();
    let ad = element_with_text(&mut tree, body, "p", &[], "ad");

    assert!(matches(&tree, ad, "p:contains(ad)").unwrap());
    assert!(!matches(&tree, ad, "p:contains(story)").unwrap());

    assert!(validate(&tree, "p:contains(ad)").is_ok());
    assert!(matches!(validate(&tree, "p:contains("), Err(Error::Syntax(_))));
    assert!(matches!(validate(&tree, "p:nth-ancestor(999)"), Err(Error::Query(_))));
    assert!(matches!(
        validate(&tree, "p:contains(ad) > ]"),
        Err(Error::Syntax(_) | Error::Query(QueryError::Native(_)))
    ));
}

#[test]
fn test_select_elements_in_context() {
    let (mut tree, body) = document();
    let left = tree.create_element(body, "div", &[]);
    let left_ad = element_with_text(&mut tree, left, "p", &[], "ad");
    let right = tree.create_element(body, "div", &[]);
    let _right_ad = element_with_text(&mut tree, right, "p", &[], "ad");

    let ast = parse("p:contains(ad)").unwrap();
    assert_eq!(select_elements_in(&ast, &tree, left).unwrap(), vec![left_ad]);
}

#[test]
fn test_cache_queries_match_uncached() {
    let (mut tree, body) = document();
    let _ = element_with_text(&mut tree, body, "p", &[], "ad");
    let cache = SelectorCache::new();

    assert_eq!(cache.query(&tree, "p:contains(ad)").unwrap(), query(&tree, "p:contains(ad)").unwrap());
    assert_eq!(cache.len(), 1);
    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_free_functions_share_a_per_thread_cache() {
    let (mut tree, body) = document();
    let ad = element_with_text(&mut tree, body, "p", &[], "ad");
    with_shared_cache(SelectorCache::clear);

    assert_eq!(query(&tree, "p:contains(ad)").unwrap(), vec![ad]);
    assert!(matches(&tree, ad, "p:contains(ad)").unwrap());
    validate(&tree, "p:contains(ad)").unwrap();
    assert_eq!(with_shared_cache(SelectorCache::len), 1);

    assert!(query(&tree, "p:contains(").is_err());
    assert_eq!(with_shared_cache(SelectorCache::len), 1);
}
