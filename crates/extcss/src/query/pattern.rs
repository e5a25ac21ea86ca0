//! Argument patterns shared by the absolute matchers.
//!
//! Arguments are either `/regex/flags` literals or plain strings. Plain
//! strings are matched as substrings (`:contains()`), as wildcards where `*`
//! stands for any run of characters (`:matches-css()`, `:matches-attr()`),
//! or by equality.

use regex::{Regex, RegexBuilder};

use crate::error::MatchFailure;

/// Flags a regex literal may carry. Only `i`, `m` and `s` change matching;
/// `g`, `u` and `y` are accepted and ignored.
const REGEX_FLAGS: &str = "gimsuy";

/// Split `/pattern/flags` into its parts.
#[must_use]
pub fn regex_literal(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let (pattern, flags) = (&rest[..end], &rest[end + 1..]);
    if pattern.is_empty() || !flags.chars().all(|c| REGEX_FLAGS.contains(c)) {
        return None;
    }
    Some((pattern, flags))
}

/// Compile the body of a regex literal.
///
/// # Errors
///
/// Returns [`MatchFailure::Regex`] if the pattern does not compile.
pub fn compile_regex(pattern: &str, flags: &str) -> Result<Regex, MatchFailure> {
    let source = pattern.replace("\\/", "/");
    RegexBuilder::new(&source)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|e| MatchFailure::Regex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// `text` as a regex if it is a literal, else `None`.
///
/// # Errors
///
/// Returns [`MatchFailure::Regex`] for a literal that does not compile.
pub fn optional_regex(text: &str) -> Result<Option<Regex>, MatchFailure> {
    regex_literal(text)
        .map(|(pattern, flags)| compile_regex(pattern, flags))
        .transpose()
}

/// Anchored regex for a plain pattern where `*` matches anything.
///
/// # Errors
///
/// Never fails in practice; the escaped pattern always compiles.
pub fn wildcard(text: &str) -> Result<Regex, MatchFailure> {
    let body = text
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    let source = format!("^{body}$");
    Regex::new(&source).map_err(|e| MatchFailure::Regex {
        pattern: text.to_string(),
        reason: e.to_string(),
    })
}

/// `text` as a regex literal or a wildcard pattern.
///
/// # Errors
///
/// Returns [`MatchFailure::Regex`] for a literal that does not compile.
pub fn regex_or_wildcard(text: &str) -> Result<Regex, MatchFailure> {
    match optional_regex(text)? {
        Some(regex) => Ok(regex),
        None => wildcard(text),
    }
}

/// Strip one pair of matching surrounding quotes.
#[must_use]
pub fn unquote(text: &str) -> &str {
    let text = text.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

/// Split on the first `separator` outside quotes and regex literals.
#[must_use]
pub fn split_top_level(text: &str, separator: char) -> (&str, Option<&str>) {
    let mut quote: Option<char> = None;
    let mut in_regex = false;
    let mut escaped = false;
    for (index, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            c if quote == Some(c) => quote = None,
            _ if quote.is_some() => {}
            '/' if in_regex => in_regex = false,
            _ if in_regex => {}
            '"' | '\'' => quote = Some(c),
            '/' if text[..index].trim_end().is_empty() => in_regex = true,
            c if c == separator => {
                return (&text[..index], Some(&text[index + c.len_utf8()..]));
            }
            _ => {}
        }
    }
    (text, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_literals() {
        assert_eq!(regex_literal("/ad/i"), Some(("ad", "i")));
        assert_eq!(regex_literal(r"/a\/b/"), Some((r"a\/b", "")));
        assert_eq!(regex_literal("/ad/x"), None);
        assert_eq!(regex_literal("ad"), None);
        assert_eq!(regex_literal("//"), None);
    }

    #[test]
    fn flags_change_matching() {
        let regex = compile_regex("^AD$", "i").unwrap();
        assert!(regex.is_match("ad"));
        let regex = compile_regex(r"a\/b", "").unwrap();
        assert!(regex.is_match("a/b"));
        assert!(compile_regex("(", "").is_err());
    }

    #[test]
    fn wildcards_are_anchored_and_escaped() {
        let regex = wildcard("url(*.png)").unwrap();
        assert!(regex.is_match("url(ad.png)"));
        assert!(!regex.is_match("url(ad.png) x"));
        assert!(wildcard("block").unwrap().is_match("block"));
        assert!(!wildcard("block").unwrap().is_match("inline-block"));
    }

    #[test]
    fn splits_outside_quotes_and_regex() {
        assert_eq!(split_top_level(r#""a=b"="c""#, '='), (r#""a=b""#, Some(r#""c""#)));
        assert_eq!(split_top_level("/a=b/=c", '='), ("/a=b/", Some("c")));
        assert_eq!(split_top_level("name", '='), ("name", None));
    }

    #[test]
    fn unquotes() {
        assert_eq!(unquote(r#" "x" "#), "x");
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote(r#""x'"#), r#""x'"#);
    }
}
