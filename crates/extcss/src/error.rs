//! Error types for parsing, evaluation and engine configuration.

use thiserror::Error;

use crate::pseudo::PseudoClass;

/// A malformed selector. Always surfaced from [`crate::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} in selector `{selector}`")]
pub struct SyntaxError {
    /// What went wrong.
    pub kind: SyntaxErrorKind,
    /// The full selector text passed to the parser.
    pub selector: String,
}

/// The individual reasons a selector is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    /// No selector at all.
    #[error("empty selector")]
    EmptySelector,
    /// Nothing between two commas, or after the last one.
    #[error("empty selector between commas")]
    EmptyListEntry,
    /// `(` without `)` or the reverse.
    #[error("unbalanced parentheses")]
    UnbalancedParentheses,
    /// `[` without `]` or the reverse.
    #[error("unbalanced brackets")]
    UnbalancedBrackets,
    /// A string never closed.
    #[error("unbalanced quotes")]
    UnbalancedQuotes,
    /// An extended pseudo-class written without an argument list.
    #[error("missing parentheses after `:{0}`")]
    MissingParentheses(PseudoClass),
    /// `:contains()` and friends with nothing inside.
    #[error("empty argument for `:{0}()`")]
    EmptyArgument(PseudoClass),
    /// `:remove(x)`
    #[error("`:remove()` takes no argument")]
    RemoveArgument,
    /// `:remove()` followed by more selector text.
    #[error("`:remove()` must be the last part of a selector")]
    RemoveNotLast,
    /// `:remove()` inside a relative pseudo-class.
    #[error("`:remove()` cannot be nested in `:{0}()`")]
    NestedRemove(PseudoClass),
    /// A finder followed by anything other than `:remove()`.
    #[error("`:{0}()` must be the last part of a selector")]
    FinderNotLast(PseudoClass),
    /// A selector starting with `>`, `+` or `~` outside `:has()`.
    #[error("selector cannot start with combinator `{0}`")]
    LeadingCombinator(char),
    /// A selector ending with a combinator.
    #[error("selector cannot end with combinator `{0}`")]
    TrailingCombinator(char),
    /// `a > + b`
    #[error("two consecutive combinators")]
    DoubleCombinator,
    /// A character the builder cannot place, e.g. `)` outside any argument.
    #[error("unexpected `{0}`")]
    Unexpected(char),
}

impl SyntaxError {
    pub(crate) fn new(kind: SyntaxErrorKind, selector: &str) -> Self {
        Self {
            kind,
            selector: selector.to_string(),
        }
    }
}

/// Why an absolute pseudo-class could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchFailure {
    /// A `/regex/flags` argument the regex engine rejects.
    #[error("invalid regular expression `{pattern}`: {reason}")]
    Regex {
        /// Regex source without delimiters.
        pattern: String,
        /// Compiler message.
        reason: String,
    },
    /// `:matches-css()` without `property: pattern`.
    #[error("expected `property: pattern`")]
    StyleArgument,
    /// An attribute name that is neither a regex nor a valid literal.
    #[error("invalid attribute name `{0}`")]
    AttributeName(String),
    /// An empty segment in a `:matches-property()` chain.
    #[error("invalid property chain `{0}`")]
    PropertyChain(String),
    /// Ancestor depth outside 1..=255.
    #[error("`{0}` is not an integer between 1 and 255")]
    AncestorDepth(String),
    /// Walking up passed the document element.
    #[error("no ancestor {0} levels up")]
    PastRoot(u32),
    /// The selector argument of `:upward()` is not a valid native selector.
    #[error("invalid selector: {0}")]
    Selector(String),
    /// The path expression of `:xpath()` does not evaluate.
    #[error("invalid xpath: {0}")]
    XPath(String),
}

/// An extended pseudo-class failed while evaluating a selector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// The pseudo-class, its raw argument and the underlying failure.
    #[error("`:{name}({arg})`: {reason}")]
    PseudoClass {
        /// Pseudo-class as written.
        name: PseudoClass,
        /// Raw argument text.
        arg: String,
        /// What went wrong.
        #[source]
        reason: MatchFailure,
    },
}

/// The document's native selector engine rejected a generated selector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("native selector `{selector}` rejected: {reason}")]
pub struct NativeSelectorError {
    /// Selector text handed to the document.
    pub selector: String,
    /// Engine message.
    pub reason: String,
}

/// Evaluation errors of [`crate::select_elements_by_ast`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A native fragment was rejected by the document.
    #[error(transparent)]
    Native(#[from] NativeSelectorError),
    /// An extended pseudo-class failed.
    #[error(transparent)]
    Match(#[from] MatchError),
}

/// Problems with an engine configuration, reported by [`crate::ExtCss::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration has no rules.
    #[error("no rules supplied")]
    NoRules,
    /// A zero throttle delay would reapply on every notification.
    #[error("throttle delay must be positive")]
    ZeroThrottle,
}

/// Crate-level error for entry points that parse and evaluate in one call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The selector does not parse.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// The selector parsed but could not be evaluated.
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl From<MatchError> for Error {
    fn from(error: MatchError) -> Self {
        Self::Query(QueryError::Match(error))
    }
}

impl From<NativeSelectorError> for Error {
    fn from(error: NativeSelectorError) -> Self {
        Self::Query(QueryError::Native(error))
    }
}
