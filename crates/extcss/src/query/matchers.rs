//! Absolute predicate pseudo-classes: text, style, attribute and property
//! matching.
//!
//! Arguments are compiled once per fragment into a [`Matcher`], then run
//! against every candidate.

use extcss_dom::{PropertyMap, PropertyValue, UserAgent};
use regex::Regex;

use crate::document::Document;
use crate::error::MatchFailure;
use crate::pseudo::PseudoClass;
use crate::query::pattern::{
    optional_regex, regex_literal, regex_or_wildcard, split_top_level, unquote, wildcard,
};

/// A compiled predicate.
#[derive(Debug)]
pub enum Matcher {
    /// `:contains()` and aliases.
    Text(TextPattern),
    /// `:matches-css()` and the pseudo-element variants.
    Style(StyleMatcher),
    /// `:matches-attr()`
    Attribute(AttributeMatcher),
    /// `:matches-property()`
    Property(PropertyMatcher),
}

/// Text content pattern.
#[derive(Debug)]
pub enum TextPattern {
    /// `/re/flags`
    Regex(Regex),
    /// Plain substring.
    Substring(String),
}

/// Computed style pattern.
#[derive(Debug)]
pub struct StyleMatcher {
    /// `before`/`after`, without colons.
    pub pseudo_element: Option<String>,
    /// Lowercase property name.
    pub property: String,
    /// Pattern for the normalised computed value.
    pub pattern: Regex,
}

/// A name or value pattern: regex, wildcard, or exact string.
#[derive(Debug)]
pub enum StringPattern {
    /// Regex literal or wildcard.
    Regex(Regex),
    /// Exact match.
    Exact(String),
}

/// Attribute name and optional value pattern.
#[derive(Debug)]
pub struct AttributeMatcher {
    /// Attribute name pattern.
    pub name: StringPattern,
    /// Value pattern; any value matches when absent.
    pub value: Option<StringPattern>,
}

/// Property chain and optional value pattern.
#[derive(Debug)]
pub struct PropertyMatcher {
    /// One pattern per property level.
    pub chain: Vec<StringPattern>,
    /// Pattern for the located value.
    pub value: Option<ValuePattern>,
}

/// How a located property value is compared.
#[derive(Debug)]
pub enum ValuePattern {
    /// Regex against the stringified value.
    Regex(Regex),
    /// Typed equality after coercion, or string equality.
    Literal(String),
}

impl StringPattern {
    fn compile(text: &str) -> Result<Self, MatchFailure> {
        if regex_literal(text).is_some() || text.contains('*') {
            return regex_or_wildcard(text).map(Self::Regex);
        }
        Ok(Self::Exact(text.to_string()))
    }

    fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(text),
            Self::Exact(exact) => exact == text,
        }
    }
}

impl Matcher {
    /// Compile the argument of a predicate pseudo-class. Returns `None` for
    /// pseudo-classes that are not predicates.
    ///
    /// # Errors
    ///
    /// Returns a [`MatchFailure`] if the argument is semantically invalid.
    pub fn compile(name: PseudoClass, arg: &str) -> Result<Option<Self>, MatchFailure> {
        let matcher = if name.is_contains() {
            Self::Text(compile_text(arg)?)
        } else if name.is_matches_css() {
            Self::Style(compile_style(name, arg)?)
        } else if name == PseudoClass::MatchesAttr {
            Self::Attribute(compile_attribute(arg)?)
        } else if name == PseudoClass::MatchesProperty {
            Self::Property(compile_property(arg)?)
        } else {
            return Ok(None);
        };
        Ok(Some(matcher))
    }

    /// Test one element. `text_content` is the accessor captured when the
    /// evaluator was built.
    pub fn matches<D: Document>(
        &self,
        doc: &D,
        text_content: fn(&D, D::Node) -> String,
        node: D::Node,
    ) -> bool {
        match self {
            Self::Text(pattern) => {
                let text = text_content(doc, node);
                match pattern {
                    TextPattern::Regex(regex) => regex.is_match(&text),
                    TextPattern::Substring(needle) => text.contains(needle.as_str()),
                }
            }
            Self::Style(style) => doc
                .computed_style(node, style.pseudo_element.as_deref(), &style.property)
                .is_some_and(|value| {
                    let value = normalize_style_value(&style.property, &value, doc.user_agent());
                    style.pattern.is_match(&value)
                }),
            Self::Attribute(attribute) => doc.attributes(node).iter().any(|(name, value)| {
                attribute.name.is_match(name)
                    && attribute.value.as_ref().is_none_or(|pattern| pattern.is_match(value))
            }),
            Self::Property(property) => doc.own_properties(node).is_some_and(|map| {
                let mut found = Vec::new();
                collect_values(map, &property.chain, &mut found);
                match &property.value {
                    None => !found.is_empty(),
                    Some(pattern) => found.into_iter().any(|value| value_matches(pattern, value)),
                }
            }),
        }
    }
}

fn compile_text(arg: &str) -> Result<TextPattern, MatchFailure> {
    if let Some(regex) = optional_regex(arg)? {
        return Ok(TextPattern::Regex(regex));
    }
    Ok(TextPattern::Substring(unescape_literal(arg)))
}

/// Drop the backslashes a selector needs around brackets and quotes.
fn unescape_literal(text: &str) -> String {
    text.replace("\\(", "(")
        .replace("\\)", ")")
        .replace("\\[", "[")
        .replace("\\]", "]")
        .replace("\\\"", "\"")
}

/// `before`, `:after` or `::before` ahead of the first comma.
fn pseudo_element_prefix(head: &str) -> Option<String> {
    let head = head.trim();
    let name = head
        .strip_prefix("::")
        .or_else(|| head.strip_prefix(':'))
        .unwrap_or(head);
    let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '-');
    valid.then(|| name.to_string())
}

fn compile_style(name: PseudoClass, arg: &str) -> Result<StyleMatcher, MatchFailure> {
    let mut pseudo_element = match name {
        PseudoClass::MatchesCssBefore => Some("before".to_string()),
        PseudoClass::MatchesCssAfter => Some("after".to_string()),
        _ => None,
    };
    let mut declaration = arg;
    if let Some((head, tail)) = arg.split_once(',') {
        if let Some(pseudo) = pseudo_element_prefix(head) {
            pseudo_element = Some(pseudo);
            declaration = tail;
        }
    }

    let (property, pattern) = declaration
        .split_once(':')
        .ok_or(MatchFailure::StyleArgument)?;
    let property = property.trim().to_ascii_lowercase();
    let pattern = pattern.trim();
    if property.is_empty() || pattern.is_empty() {
        return Err(MatchFailure::StyleArgument);
    }

    let pattern = match optional_regex(pattern)? {
        Some(regex) => regex,
        None => {
            // Same url quoting as the computed side.
            let literal = unescape_literal(pattern);
            match property.as_str() {
                "background" | "background-image" => wildcard(&quote_urls(&literal))?,
                _ => wildcard(&literal)?,
            }
        }
    };

    Ok(StyleMatcher {
        pseudo_element,
        property,
        pattern,
    })
}

/// Computed values as the matcher compares them.
fn normalize_style_value(property: &str, value: &str, user_agent: UserAgent) -> String {
    match property {
        "content" => unquote(value).to_string(),
        "background" | "background-image" => quote_urls(value),
        "opacity" if user_agent == UserAgent::Safari => value
            .trim()
            .parse::<f64>()
            .map_or_else(|_| value.to_string(), |v| ((v * 100.0).round() / 100.0).to_string()),
        _ => value.to_string(),
    }
}

/// `url(x)` and `url('x')` become `url("x")`.
fn quote_urls(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    let mut rest = value;
    while let Some(start) = rest.find("url(") {
        let after = &rest[start + 4..];
        let Some(end) = after.find(')') else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str("url(\"");
        out.push_str(unquote(&after[..end]));
        out.push_str("\")");
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn is_valid_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| {
            !c.is_whitespace()
                && !c.is_control()
                && !matches!(c, '"' | '\'' | '>' | '/' | '=' | '(' | ')' | '[' | ']')
        })
}

fn compile_attribute(arg: &str) -> Result<AttributeMatcher, MatchFailure> {
    let (name, value) = split_top_level(arg, '=');
    let name = unquote(name);
    let name = if regex_literal(name).is_some() {
        StringPattern::compile(name)?
    } else if is_valid_attribute_name(name) {
        if name.contains('*') {
            StringPattern::Regex(wildcard(&name.to_ascii_lowercase())?)
        } else {
            StringPattern::Exact(name.to_ascii_lowercase())
        }
    } else {
        return Err(MatchFailure::AttributeName(name.to_string()));
    };
    let value = value.map(|v| StringPattern::compile(unquote(v))).transpose()?;
    Ok(AttributeMatcher { name, value })
}

/// Split a property chain on dots outside regex segments.
fn split_chain(chain: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut in_regex = false;
    let mut escaped = false;
    for (index, c) in chain.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '/' if index == start => in_regex = true,
            '/' if in_regex => in_regex = false,
            '.' if !in_regex => {
                segments.push(&chain[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    segments.push(&chain[start..]);
    segments
}

fn compile_property(arg: &str) -> Result<PropertyMatcher, MatchFailure> {
    let (chain_text, value) = split_top_level(arg, '=');
    let chain_text = unquote(chain_text);
    let chain = split_chain(chain_text)
        .into_iter()
        .map(|segment| {
            if segment.is_empty() {
                Err(MatchFailure::PropertyChain(chain_text.to_string()))
            } else {
                StringPattern::compile(segment)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let value = value
        .map(|v| {
            let v = unquote(v);
            optional_regex(v).map(|regex| {
                regex.map_or_else(|| ValuePattern::Literal(v.to_string()), ValuePattern::Regex)
            })
        })
        .transpose()?;
    Ok(PropertyMatcher { chain, value })
}

/// Depth-first walk of the own-property graph. Pattern segments fan out to
/// every matching key at their level.
fn collect_values<'a>(map: &'a PropertyMap, chain: &[StringPattern], found: &mut Vec<&'a PropertyValue>) {
    let Some((segment, rest)) = chain.split_first() else {
        return;
    };
    for (key, value) in map {
        if !segment.is_match(key) {
            continue;
        }
        if rest.is_empty() {
            found.push(value);
        } else if let Some(inner) = value.as_object() {
            collect_values(inner, rest, found);
        }
    }
}

/// The literal as a typed script value, when it spells one.
fn coerce_literal(text: &str) -> Option<PropertyValue> {
    match text {
        "null" => Some(PropertyValue::Null),
        "undefined" => Some(PropertyValue::Undefined),
        "true" => Some(PropertyValue::Bool(true)),
        "false" => Some(PropertyValue::Bool(false)),
        "NaN" => Some(PropertyValue::Number(f64::NAN)),
        _ => text.parse::<f64>().ok().map(PropertyValue::Number),
    }
}

fn value_matches(pattern: &ValuePattern, value: &PropertyValue) -> bool {
    match pattern {
        ValuePattern::Regex(regex) => regex.is_match(&value.to_string()),
        ValuePattern::Literal(text) => {
            let typed = coerce_literal(text).is_some_and(|typed| match (&typed, value) {
                (PropertyValue::Number(a), PropertyValue::Number(b)) if a.is_nan() => b.is_nan(),
                _ => typed.strict_equals(value),
            });
            typed || value.to_string() == *text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_unescapes_literals() {
        let Ok(Some(Matcher::Text(TextPattern::Substring(text)))) =
            Matcher::compile(PseudoClass::Contains, r"\(ad\)")
        else {
            panic!("expected substring pattern");
        };
        assert_eq!(text, "(ad)");
    }

    #[test]
    fn style_argument_with_pseudo_element_prefix() {
        let Ok(Some(Matcher::Style(style))) =
            Matcher::compile(PseudoClass::MatchesCss, "before, content: Ad*")
        else {
            panic!("expected style matcher");
        };
        assert_eq!(style.pseudo_element.as_deref(), Some("before"));
        assert_eq!(style.property, "content");
        assert!(style.pattern.is_match("Advertisement"));
    }

    #[test]
    fn style_argument_errors() {
        assert_eq!(
            Matcher::compile(PseudoClass::MatchesCss, "display").unwrap_err(),
            MatchFailure::StyleArgument
        );
        assert!(matches!(
            Matcher::compile(PseudoClass::MatchesCss, "display: /(/").unwrap_err(),
            MatchFailure::Regex { .. }
        ));
    }

    #[test]
    fn style_literals_are_unescaped_and_url_normalized() {
        let Ok(Some(Matcher::Style(style))) =
            Matcher::compile(PseudoClass::MatchesCss, "background-image: url(a.png)")
        else {
            panic!("expected style matcher");
        };
        assert!(style.pattern.is_match(r#"url("a.png")"#));

        let Ok(Some(Matcher::Style(style))) =
            Matcher::compile(PseudoClass::MatchesCss, r"background-image: url\(*\)")
        else {
            panic!("expected style matcher");
        };
        assert!(style.pattern.is_match(r#"url("b.png")"#));

        let Ok(Some(Matcher::Style(style))) =
            Matcher::compile(PseudoClass::MatchesCss, r"width: calc\(100% - 1px\)")
        else {
            panic!("expected style matcher");
        };
        assert!(style.pattern.is_match("calc(100% - 1px)"));
    }

    #[test]
    fn normalizes_computed_values() {
        assert_eq!(normalize_style_value("content", "\"Ad\"", UserAgent::Generic), "Ad");
        assert_eq!(
            normalize_style_value("background-image", "url(a.png), url('b.png')", UserAgent::Generic),
            r#"url("a.png"), url("b.png")"#
        );
        assert_eq!(normalize_style_value("opacity", "0.8999999761581421", UserAgent::Safari), "0.9");
        assert_eq!(
            normalize_style_value("opacity", "0.8999999761581421", UserAgent::Generic),
            "0.8999999761581421"
        );
    }

    #[test]
    fn attribute_names_are_validated() {
        assert_eq!(
            Matcher::compile(PseudoClass::MatchesAttr, r#""a b"="x""#).unwrap_err(),
            MatchFailure::AttributeName("a b".to_string())
        );
        assert!(Matcher::compile(PseudoClass::MatchesAttr, "data-*").is_ok());
    }

    #[test]
    fn property_chain_keeps_regex_dots() {
        assert_eq!(split_chain(r"/a.b/.c"), vec![r"/a.b/", "c"]);
        assert_eq!(
            Matcher::compile(PseudoClass::MatchesProperty, "a..b").unwrap_err(),
            MatchFailure::PropertyChain("a..b".to_string())
        );
    }

    #[test]
    fn literal_values_compare_typed_or_as_strings() {
        let literal = ValuePattern::Literal("null".to_string());
        assert!(value_matches(&literal, &PropertyValue::Null));
        assert!(value_matches(&literal, &PropertyValue::from("null")));
        assert!(!value_matches(&literal, &PropertyValue::Undefined));

        let nan = ValuePattern::Literal("NaN".to_string());
        assert!(value_matches(&nan, &PropertyValue::Number(f64::NAN)));

        let three = ValuePattern::Literal("3".to_string());
        assert!(value_matches(&three, &PropertyValue::Number(3.0)));
        assert!(value_matches(&three, &PropertyValue::from("3")));
    }

    #[test]
    fn other_pseudo_classes_are_not_predicates() {
        assert!(Matcher::compile(PseudoClass::Upward, "2").unwrap().is_none());
    }
}
