//! Native CSS selector engine
//!
//! This crate implements selector parsing and matching per
//! [Selectors Level 4](https://www.w3.org/TR/selectors-4/), covering the part
//! of the grammar a browser's `querySelectorAll` accepts for static documents.
//! It is the "native" engine extended selectors delegate to for every plain
//! CSS fragment.
//!
//! Unlike a style engine, the parser is strict: an unknown pseudo-class or a
//! malformed compound is an error, the same way `querySelectorAll` throws a
//! `SyntaxError`. Interactive states (`:hover`) and pseudo-elements are valid
//! but never match.

mod matching;
mod parser;

use extcss_dom::{DomTree, NodeId};

pub use parser::{parse_selector, parse_selector_list};

/// Errors raised for selectors the native engine rejects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    /// Nothing but whitespace (also an empty entry between commas).
    #[error("empty selector")]
    Empty,
    /// A character that cannot start or continue a simple selector.
    #[error("unexpected character `{0}` in selector")]
    UnexpectedChar(char),
    /// A combinator with no compound selector on one of its sides.
    #[error("dangling combinator")]
    DanglingCombinator,
    /// `.`, `#` or `[` not followed by a name.
    #[error("expected a name after `{0}`")]
    MissingName(char),
    /// A bracket, parenthesis or string that is never closed.
    #[error("unterminated {0}")]
    Unterminated(&'static str),
    /// A pseudo-class this engine does not know.
    #[error("unknown pseudo-class `:{0}`")]
    UnknownPseudoClass(String),
    /// A functional pseudo-class written without its argument list.
    #[error("`:{0}` requires an argument")]
    MissingArgument(String),
    /// An argument the pseudo-class cannot parse.
    #[error("invalid argument `{arg}` for `:{name}()`")]
    InvalidArgument {
        /// Pseudo-class name.
        name: String,
        /// Raw argument text.
        arg: String,
    },
}

/// [§ 5 Elemental selectors](https://www.w3.org/TR/selectors-4/#elemental-selectors)
/// [§ 6 Attribute selectors](https://www.w3.org/TR/selectors-4/#attribute-selectors)
///
/// A simple selector is a single condition on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimpleSelector {
    /// [§ 5.1 Type selector](https://www.w3.org/TR/selectors-4/#type-selectors)
    ///
    /// Stored lowercase; HTML element names compare case-insensitively.
    Type(String),

    /// [§ 6.6 Class selector](https://www.w3.org/TR/selectors-4/#class-html)
    Class(String),

    /// [§ 6.7 ID selector](https://www.w3.org/TR/selectors-4/#id-selectors)
    Id(String),

    /// [§ 5.2 Universal selector](https://www.w3.org/TR/selectors-4/#universal-selector)
    Universal,

    /// Interactive states (`:hover`, `:focus`, `:visited`) and pseudo-elements
    /// (`::before`, `:after`). Valid syntax that never matches in a static
    /// document.
    NeverMatch,

    /// [§ 4 Pseudo-classes](https://www.w3.org/TR/selectors-4/#pseudo-classes)
    PseudoClass(PseudoClass),

    /// [§ 6.4 Attribute selectors](https://www.w3.org/TR/selectors-4/#attribute-selectors)
    Attribute(AttributeSelector),

    /// [§ 4.3 :not()](https://www.w3.org/TR/selectors-4/#negation)
    /// "The negation pseudo-class, :not(), is a functional pseudo-class taking
    /// a selector list as an argument. It represents an element that is not
    /// represented by its argument."
    Not(SelectorList),

    /// [§ 4.2 :is()](https://www.w3.org/TR/selectors-4/#matches) and `:where()`
    /// "The matches-any pseudo-class, :is(), is a functional pseudo-class
    /// taking a selector list as its argument."
    Is(SelectorList),
}

/// Tree-structural and state pseudo-classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoClass {
    /// [§ 14.1 :root](https://www.w3.org/TR/selectors-4/#the-root-pseudo)
    Root,
    /// [§ 9.4 :scope](https://www.w3.org/TR/selectors-4/#the-scope-pseudo)
    ///
    /// Matches the scoping root of the query, which may be the document node
    /// itself when the query runs from the document.
    Scope,
    /// [§ 14.4.3 :first-child](https://www.w3.org/TR/selectors-4/#the-first-child-pseudo)
    FirstChild,
    /// [§ 14.4.4 :last-child](https://www.w3.org/TR/selectors-4/#the-last-child-pseudo)
    LastChild,
    /// [§ 14.4.5 :only-child](https://www.w3.org/TR/selectors-4/#the-only-child-pseudo)
    OnlyChild,
    /// [§ 14.5.3 :first-of-type](https://www.w3.org/TR/selectors-4/#the-first-of-type-pseudo)
    FirstOfType,
    /// [§ 14.5.4 :last-of-type](https://www.w3.org/TR/selectors-4/#the-last-of-type-pseudo)
    LastOfType,
    /// [§ 14.5.5 :only-of-type](https://www.w3.org/TR/selectors-4/#the-only-of-type-pseudo)
    OnlyOfType,
    /// [§ 14.2 :empty](https://www.w3.org/TR/selectors-4/#the-empty-pseudo)
    Empty,
    /// [§ 8.2 :link](https://www.w3.org/TR/selectors-4/#the-link-pseudo) and `:any-link`
    ///
    /// Every link counts as unvisited.
    Link,
    /// `:enabled`
    Enabled,
    /// `:disabled`
    Disabled,
    /// [§ 13.3.3 :checked](https://www.w3.org/TR/selectors-4/#checked)
    Checked,
    /// [§ 14.4.1 :nth-child()](https://www.w3.org/TR/selectors-4/#the-nth-child-pseudo)
    NthChild(Nth),
    /// [§ 14.4.2 :nth-last-child()](https://www.w3.org/TR/selectors-4/#the-nth-last-child-pseudo)
    NthLastChild(Nth),
    /// [§ 14.5.1 :nth-of-type()](https://www.w3.org/TR/selectors-4/#the-nth-of-type-pseudo)
    NthOfType(Nth),
    /// [§ 14.5.2 :nth-last-of-type()](https://www.w3.org/TR/selectors-4/#the-nth-last-of-type-pseudo)
    NthLastOfType(Nth),
}

/// [CSS Syntax § 6 The An+B microsyntax](https://www.w3.org/TR/css-syntax-3/#anb-microsyntax)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nth {
    /// Step.
    pub a: i32,
    /// Offset.
    pub b: i32,
}

impl Nth {
    /// "The An+B notation defines an integer step (A) and offset (B), and
    /// represents the An+Bth elements in a list, for every positive integer
    /// or zero value of n, with the first element in the list having index 1."
    #[must_use]
    pub fn matches(self, index: usize) -> bool {
        let Ok(index) = i32::try_from(index) else {
            return false;
        };
        let delta = index - self.b;
        if self.a == 0 {
            return delta == 0;
        }
        delta % self.a == 0 && delta / self.a >= 0
    }
}

/// Attribute selectors per [§ 6.4](https://www.w3.org/TR/selectors-4/#attribute-selectors)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    /// Lowercase attribute name.
    pub name: String,
    /// Operator and value; `None` for `[attr]`.
    pub operation: Option<(AttributeOperator, String)>,
    /// `[attr=value i]`
    pub case_insensitive: bool,
}

/// [§ 6.1 Attribute presence and value selectors](https://www.w3.org/TR/selectors-4/#attribute-representation)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOperator {
    /// `[attr=value]` exact match
    Equals,
    /// `[attr~=value]` whitespace-separated word
    Includes,
    /// `[attr|=value]` exact or `value-` prefix
    DashMatch,
    /// `[attr^=value]` prefix
    Prefix,
    /// `[attr$=value]` suffix
    Suffix,
    /// `[attr*=value]` substring
    Substring,
}

/// [§ 4.2 Compound selectors](https://www.w3.org/TR/selectors-4/#compound)
///
/// "A compound selector is a sequence of simple selectors that are not
/// separated by a combinator, and represents a set of simultaneous
/// conditions on a single element."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundSelector {
    /// The list of simple selectors that make up this compound selector.
    pub simple_selectors: Vec<SimpleSelector>,
}

/// [§ 16 Combinators](https://www.w3.org/TR/selectors-4/#combinators)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// [§ 16.1 Descendant combinator](https://www.w3.org/TR/selectors-4/#descendant-combinators)
    Descendant,
    /// [§ 16.2 Child combinator](https://www.w3.org/TR/selectors-4/#child-combinators)
    Child,
    /// [§ 16.3 Next-sibling combinator](https://www.w3.org/TR/selectors-4/#adjacent-sibling-combinators)
    NextSibling,
    /// [§ 16.4 Subsequent-sibling combinator](https://www.w3.org/TR/selectors-4/#general-sibling-combinators)
    SubsequentSibling,
}

/// [§ 4.3 Complex selectors](https://www.w3.org/TR/selectors-4/#complex)
///
/// Example: `div.container > ul.nav li a.active`
/// This would be parsed as:
/// ```text
/// [div.container] --(Child)--> [ul.nav] --(Descendant)--> [li] --(Descendant)--> [a.active]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexSelector {
    /// The rightmost compound selector (the subject of the selector).
    pub subject: CompoundSelector,

    /// Chain of (combinator, compound) pairs going left from the subject.
    ///
    /// For `A > B C`, this is `[(Descendant, B), (Child, A)]`.
    pub combinators: Vec<(Combinator, CompoundSelector)>,
}

/// [§ 4.1 Selector lists](https://www.w3.org/TR/selectors-4/#grouping)
///
/// "A list of simple/compound/complex selectors is a comma-separated list"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    /// The alternatives, in source order.
    pub selectors: Vec<ComplexSelector>,
}

impl SelectorList {
    /// True if `node` matches any selector in the list, with `scope` as the
    /// element (or document) `:scope` refers to.
    #[must_use]
    pub fn matches_in_tree(&self, tree: &DomTree, node: NodeId, scope: NodeId) -> bool {
        self.selectors
            .iter()
            .any(|complex| matching::complex_matches(complex, tree, node, scope))
    }

    /// [§ 4.2.6 querySelectorAll()](https://dom.spec.whatwg.org/#dom-parentnode-queryselectorall)
    ///
    /// All element descendants of `context` that match, in tree order.
    /// Combinators may reach outside `context`; only the subject has to be
    /// inside it.
    #[must_use]
    pub fn query_all(&self, tree: &DomTree, context: NodeId) -> Vec<NodeId> {
        tree.descendants(context)
            .into_iter()
            .filter(|&node| tree.as_element(node).is_some() && self.matches_in_tree(tree, node, context))
            .collect()
    }
}

/// Parse `selector` and run it from `context`.
///
/// # Errors
///
/// Returns [`SelectorError`] if the selector list does not parse.
pub fn query_selector_all(tree: &DomTree, context: NodeId, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
    Ok(parse_selector_list(selector)?.query_all(tree, context))
}

/// [§ 4.2.6 matches()](https://dom.spec.whatwg.org/#dom-element-matches)
///
/// # Errors
///
/// Returns [`SelectorError`] if the selector list does not parse.
pub fn matches(tree: &DomTree, element: NodeId, selector: &str) -> Result<bool, SelectorError> {
    let list = parse_selector_list(selector)?;
    Ok(tree.as_element(element).is_some() && list.matches_in_tree(tree, element, element))
}

/// [§ 4.2.6 closest()](https://dom.spec.whatwg.org/#dom-element-closest)
///
/// The nearest inclusive ancestor element of `element` matching `selector`.
///
/// # Errors
///
/// Returns [`SelectorError`] if the selector list does not parse.
pub fn closest(tree: &DomTree, element: NodeId, selector: &str) -> Result<Option<NodeId>, SelectorError> {
    let list = parse_selector_list(selector)?;
    Ok(std::iter::once(element)
        .chain(tree.ancestors(element))
        .filter(|&node| tree.as_element(node).is_some())
        .find(|&node| list.matches_in_tree(tree, node, element)))
}

/// Check that `selector` is accepted by the native engine.
///
/// # Errors
///
/// Returns [`SelectorError`] describing the first problem found.
pub fn validate(selector: &str) -> Result<(), SelectorError> {
    parse_selector_list(selector).map(|_| ())
}
