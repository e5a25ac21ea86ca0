//! Selector text to [`SelectorList`].
//!
//! [§ 4 Selector syntax](https://www.w3.org/TR/selectors-4/#syntax)

use crate::{
    AttributeOperator, AttributeSelector, Combinator, ComplexSelector, CompoundSelector, Nth,
    PseudoClass, SelectorError, SelectorList, SimpleSelector,
};

/// Interactive and UI states that are valid syntax but never hold in a
/// static document.
const NEVER_MATCHING_PSEUDO_CLASSES: &[&str] = &[
    "hover",
    "active",
    "focus",
    "focus-visible",
    "focus-within",
    "visited",
    "target",
    "target-within",
    "current",
    "past",
    "future",
    "playing",
    "paused",
    "autofill",
    "fullscreen",
    "placeholder-shown",
    "user-invalid",
    "user-valid",
];

/// CSS2 pseudo-elements that may be written with a single colon.
const LEGACY_PSEUDO_ELEMENTS: &[&str] = &["before", "after", "first-line", "first-letter"];

/// Parse a comma-separated selector list.
///
/// # Errors
///
/// Returns [`SelectorError`] for an empty entry or any malformed selector.
pub fn parse_selector_list(raw: &str) -> Result<SelectorList, SelectorError> {
    let selectors = split_top_level(raw)?
        .into_iter()
        .map(parse_selector)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SelectorList { selectors })
}

/// Parse a single complex selector (no top-level commas).
///
/// # Errors
///
/// Returns [`SelectorError`] if the text is not a valid complex selector.
pub fn parse_selector(raw: &str) -> Result<ComplexSelector, SelectorError> {
    Parser::new(raw).parse_complex()
}

/// Split on commas outside of parentheses, brackets and strings.
fn split_top_level(raw: &str) -> Result<Vec<&str>, SelectorError> {
    let mut parts = Vec::new();
    let mut depth = 0u32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (index, c) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&raw[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);

    if parts.iter().any(|part| part.trim().is_empty()) {
        return Err(SelectorError::Empty);
    }
    Ok(parts)
}

/// [§ 4.3.10 ident-start code point](https://www.w3.org/TR/css-syntax-3/#ident-start-code-point)
const fn is_ident_start_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

/// [§ 4.3.9 ident code point](https://www.w3.org/TR/css-syntax-3/#ident-code-point)
const fn is_ident_char(c: char) -> bool {
    is_ident_start_char(c) || c.is_ascii_digit() || c == '-'
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(raw: &str) -> Self {
        Self {
            chars: raw.trim().chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// [§ 4.3.4 Consume an ident-like token](https://www.w3.org/TR/css-syntax-3/#consume-ident-like-token),
    /// restricted to names: ident code points and escapes.
    fn read_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                name.push(self.read_escape());
            } else if is_ident_char(c) {
                name.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        name
    }

    /// [§ 4.3.7 Consume an escaped code point](https://www.w3.org/TR/css-syntax-3/#consume-escaped-code-point)
    fn read_escape(&mut self) -> char {
        let Some(first) = self.next_char() else {
            return char::REPLACEMENT_CHARACTER;
        };
        if !first.is_ascii_hexdigit() {
            return first;
        }
        let mut hex = String::from(first);
        while hex.len() < 6 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            hex.extend(self.next_char());
        }
        if self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .filter(|&code| code != 0)
            .and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    /// Read the text of a parenthesized argument; the opening `(` has been
    /// consumed. Nested parentheses and strings are kept verbatim.
    fn read_argument(&mut self) -> Result<String, SelectorError> {
        let mut arg = String::new();
        let mut depth = 1u32;
        let mut quote: Option<char> = None;
        while let Some(c) = self.next_char() {
            match (quote, c) {
                (_, '\\') => {
                    arg.push(c);
                    arg.extend(self.next_char());
                    continue;
                }
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(c),
                (None, '(') => depth += 1,
                (None, ')') => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(arg);
                    }
                }
                _ => {}
            }
            arg.push(c);
        }
        Err(SelectorError::Unterminated("parenthesis"))
    }

    /// [§ 4.3 Complex selectors](https://www.w3.org/TR/selectors-4/#complex)
    ///
    /// Compounds and combinators are collected left to right, then the chain
    /// is reversed so matching can walk from the subject outward.
    fn parse_complex(&mut self) -> Result<ComplexSelector, SelectorError> {
        if self.chars.is_empty() {
            return Err(SelectorError::Empty);
        }

        let mut compounds: Vec<CompoundSelector> = Vec::new();
        let mut combinators: Vec<Combinator> = Vec::new();
        let mut current: Vec<SimpleSelector> = Vec::new();
        // Whitespace after a compound becomes a descendant combinator unless
        // an explicit combinator follows.
        let mut pending_descendant = false;

        while let Some(c) = self.peek() {
            match c {
                c if c.is_whitespace() => {
                    self.skip_whitespace();
                    if !current.is_empty() {
                        compounds.push(CompoundSelector {
                            simple_selectors: std::mem::take(&mut current),
                        });
                        pending_descendant = true;
                    }
                }
                '>' | '+' | '~' => {
                    self.pos += 1;
                    if !current.is_empty() {
                        compounds.push(CompoundSelector {
                            simple_selectors: std::mem::take(&mut current),
                        });
                    }
                    pending_descendant = false;
                    if compounds.len() != combinators.len() + 1 {
                        return Err(SelectorError::DanglingCombinator);
                    }
                    combinators.push(match c {
                        '>' => Combinator::Child,
                        '+' => Combinator::NextSibling,
                        _ => Combinator::SubsequentSibling,
                    });
                    self.skip_whitespace();
                }
                _ => {
                    if pending_descendant {
                        combinators.push(Combinator::Descendant);
                        pending_descendant = false;
                    }
                    let simple = self.parse_simple(current.is_empty())?;
                    current.push(simple);
                }
            }
        }

        if !current.is_empty() {
            compounds.push(CompoundSelector {
                simple_selectors: current,
            });
        }
        if compounds.len() != combinators.len() + 1 {
            return Err(SelectorError::DanglingCombinator);
        }

        let Some(subject) = compounds.pop() else {
            return Err(SelectorError::Empty);
        };
        // For "A > B C": compounds [A, B], combinators [Child, Descendant]
        // become [(Descendant, B), (Child, A)].
        let chain = compounds
            .into_iter()
            .zip(combinators)
            .rev()
            .map(|(compound, combinator)| (combinator, compound))
            .collect();

        Ok(ComplexSelector {
            subject,
            combinators: chain,
        })
    }

    fn parse_simple(&mut self, at_compound_start: bool) -> Result<SimpleSelector, SelectorError> {
        let Some(c) = self.peek() else {
            return Err(SelectorError::Empty);
        };
        match c {
            '*' if at_compound_start => {
                self.pos += 1;
                Ok(SimpleSelector::Universal)
            }
            '.' | '#' => {
                self.pos += 1;
                let name = self.read_name();
                if name.is_empty() {
                    return Err(SelectorError::MissingName(c));
                }
                Ok(if c == '.' {
                    SimpleSelector::Class(name)
                } else {
                    SimpleSelector::Id(name)
                })
            }
            '[' => {
                self.pos += 1;
                self.parse_attribute().map(SimpleSelector::Attribute)
            }
            ':' => {
                self.pos += 1;
                self.parse_pseudo()
            }
            c if at_compound_start && (is_ident_start_char(c) || c == '-' || c == '\\') => {
                Ok(SimpleSelector::Type(self.read_name().to_ascii_lowercase()))
            }
            other => Err(SelectorError::UnexpectedChar(other)),
        }
    }

    /// [§ 6.4 Attribute selectors](https://www.w3.org/TR/selectors-4/#attribute-selectors)
    fn parse_attribute(&mut self) -> Result<AttributeSelector, SelectorError> {
        self.skip_whitespace();
        let name = self.read_name().to_ascii_lowercase();
        if name.is_empty() {
            return Err(SelectorError::MissingName('['));
        }
        self.skip_whitespace();

        let operator = match (self.peek(), self.peek_at(1)) {
            (Some(']'), _) => {
                self.pos += 1;
                return Ok(AttributeSelector {
                    name,
                    operation: None,
                    case_insensitive: false,
                });
            }
            (Some('='), _) => {
                self.pos += 1;
                AttributeOperator::Equals
            }
            (Some(op @ ('~' | '|' | '^' | '$' | '*')), Some('=')) => {
                self.pos += 2;
                match op {
                    '~' => AttributeOperator::Includes,
                    '|' => AttributeOperator::DashMatch,
                    '^' => AttributeOperator::Prefix,
                    '$' => AttributeOperator::Suffix,
                    _ => AttributeOperator::Substring,
                }
            }
            (Some(other), _) => return Err(SelectorError::UnexpectedChar(other)),
            (None, _) => return Err(SelectorError::Unterminated("attribute selector")),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.pos += 1;
                let mut value = String::new();
                loop {
                    match self.next_char() {
                        Some(c) if c == q => break,
                        Some('\\') => value.push(self.read_escape()),
                        Some(c) => value.push(c),
                        None => return Err(SelectorError::Unterminated("string")),
                    }
                }
                value
            }
            _ => {
                let value = self.read_name();
                if value.is_empty() {
                    return Err(SelectorError::MissingName('='));
                }
                value
            }
        };

        self.skip_whitespace();
        let mut case_insensitive = false;
        if let Some(flag @ ('i' | 'I' | 's' | 'S')) = self.peek() {
            self.pos += 1;
            case_insensitive = flag.eq_ignore_ascii_case(&'i');
            self.skip_whitespace();
        }
        match self.next_char() {
            Some(']') => Ok(AttributeSelector {
                name,
                operation: Some((operator, value)),
                case_insensitive,
            }),
            Some(other) => Err(SelectorError::UnexpectedChar(other)),
            None => Err(SelectorError::Unterminated("attribute selector")),
        }
    }

    /// [§ 3.5 Pseudo-classes](https://www.w3.org/TR/selectors-4/#pseudo-classes)
    /// [§ 3.6 Pseudo-elements](https://www.w3.org/TR/selectors-4/#pseudo-elements)
    fn parse_pseudo(&mut self) -> Result<SimpleSelector, SelectorError> {
        let is_pseudo_element = self.peek() == Some(':');
        if is_pseudo_element {
            self.pos += 1;
        }
        let name = self.read_name().to_ascii_lowercase();
        if name.is_empty() {
            return Err(SelectorError::MissingName(':'));
        }
        let argument = if self.peek() == Some('(') {
            self.pos += 1;
            Some(self.read_argument()?)
        } else {
            None
        };

        if is_pseudo_element || LEGACY_PSEUDO_ELEMENTS.contains(&name.as_str()) {
            return Ok(SimpleSelector::NeverMatch);
        }

        let Some(arg) = argument else {
            let pseudo = match name.as_str() {
                "root" => PseudoClass::Root,
                "scope" => PseudoClass::Scope,
                "first-child" => PseudoClass::FirstChild,
                "last-child" => PseudoClass::LastChild,
                "only-child" => PseudoClass::OnlyChild,
                "first-of-type" => PseudoClass::FirstOfType,
                "last-of-type" => PseudoClass::LastOfType,
                "only-of-type" => PseudoClass::OnlyOfType,
                "empty" => PseudoClass::Empty,
                "link" | "any-link" => PseudoClass::Link,
                "enabled" => PseudoClass::Enabled,
                "disabled" => PseudoClass::Disabled,
                "checked" => PseudoClass::Checked,
                "not" | "is" | "where" | "matches" | "nth-child" | "nth-last-child"
                | "nth-of-type" | "nth-last-of-type" => {
                    return Err(SelectorError::MissingArgument(name));
                }
                other if NEVER_MATCHING_PSEUDO_CLASSES.contains(&other) => {
                    return Ok(SimpleSelector::NeverMatch);
                }
                _ => return Err(SelectorError::UnknownPseudoClass(name)),
            };
            return Ok(SimpleSelector::PseudoClass(pseudo));
        };

        let nth = |name: &str| {
            parse_nth(&arg).ok_or_else(|| SelectorError::InvalidArgument {
                name: name.to_string(),
                arg: arg.clone(),
            })
        };
        Ok(match name.as_str() {
            "not" => SimpleSelector::Not(parse_selector_list(&arg)?),
            "is" | "where" | "matches" => SimpleSelector::Is(parse_selector_list(&arg)?),
            "nth-child" => SimpleSelector::PseudoClass(PseudoClass::NthChild(nth(&name)?)),
            "nth-last-child" => SimpleSelector::PseudoClass(PseudoClass::NthLastChild(nth(&name)?)),
            "nth-of-type" => SimpleSelector::PseudoClass(PseudoClass::NthOfType(nth(&name)?)),
            "nth-last-of-type" => {
                SimpleSelector::PseudoClass(PseudoClass::NthLastOfType(nth(&name)?))
            }
            _ => return Err(SelectorError::UnknownPseudoClass(name)),
        })
    }
}

/// Parse `An+B`, `odd` or `even`.
fn parse_nth(raw: &str) -> Option<Nth> {
    let text: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    match text.as_str() {
        "odd" => return Some(Nth { a: 2, b: 1 }),
        "even" => return Some(Nth { a: 2, b: 0 }),
        "" => return None,
        _ => {}
    }

    let Some(n_pos) = text.find('n') else {
        return text.parse().ok().map(|b| Nth { a: 0, b });
    };
    let (a_text, rest) = text.split_at(n_pos);
    let a = match a_text {
        "" | "+" => 1,
        "-" => -1,
        other => other.parse().ok()?,
    };
    let b_text = &rest[1..];
    let b = if b_text.is_empty() {
        0
    } else {
        if !b_text.starts_with(['+', '-']) {
            return None;
        }
        b_text.parse().ok()?
    };
    Some(Nth { a, b })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nth_forms() {
        assert_eq!(parse_nth("odd"), Some(Nth { a: 2, b: 1 }));
        assert_eq!(parse_nth(" 2n + 1 "), Some(Nth { a: 2, b: 1 }));
        assert_eq!(parse_nth("-n+3"), Some(Nth { a: -1, b: 3 }));
        assert_eq!(parse_nth("n"), Some(Nth { a: 1, b: 0 }));
        assert_eq!(parse_nth("4"), Some(Nth { a: 0, b: 4 }));
        assert_eq!(parse_nth("2n1"), None);
        assert_eq!(parse_nth("x"), None);
    }

    #[test]
    fn split_respects_nesting() {
        assert_eq!(
            split_top_level("a, :is(b, c), [title='x,y']").unwrap(),
            vec!["a", " :is(b, c)", " [title='x,y']"]
        );
        assert_eq!(split_top_level("a,,b"), Err(SelectorError::Empty));
    }

    #[test]
    fn escapes_in_names() {
        let complex = parse_selector(r".a\:b #\31 23").unwrap();
        assert_eq!(
            complex.subject.simple_selectors,
            vec![SimpleSelector::Id("123".to_string())]
        );
        assert_eq!(
            complex.combinators[0].1.simple_selectors,
            vec![SimpleSelector::Class("a:b".to_string())]
        );
    }
}
