//! Extended CSS selectors and self-healing style application.
//!
//! # Scope
//!
//! This crate implements:
//! - **Selector parsing**
//!   - Tokenizer and AST builder for selector lists mixing native CSS with
//!     extended pseudo-classes
//!   - AST optimizer that collapses regular `:is()`/`:not()` into native
//!     selectors and merges adjacent regular fragments
//!
//! - **Extended pseudo-classes**
//!   - Relative: `:has()` (alias `:-abp-has()`), `:if()`, `:if-not()`, `:is()`, `:not()`
//!   - Absolute matchers: `:contains()` (aliases `:has-text()`, `:-abp-contains()`),
//!     `:matches-css()` and its `-before`/`-after` forms, `:matches-attr()`,
//!     `:matches-property()`
//!   - Finders: `:xpath()`, `:nth-ancestor()`, `:upward()`
//!   - `:remove()`
//!
//! - **Query evaluation** against any [`Document`], left to right, with the
//!   native engine doing the regular fragments
//!
//! - **Rule engine** ([`ExtCss`])
//!   - Style and removal rules applied as `!important` inline style
//!   - Mutation-driven reapplication, throttled through the host's event loop
//!   - Style protection against page scripts, with runaway-loop limits
//!   - Revert on unmatch and on dispose

/// Selector AST, builder and optimizer.
pub mod ast;
/// The host document seam.
pub mod document;
/// Rule application, protection and scheduling.
pub mod engine;
/// Error types.
pub mod error;
/// Extended pseudo-class names.
pub mod pseudo;
/// Selector evaluation and the absolute matchers.
pub mod query;
/// Selector text tokenizer.
pub mod tokenizer;

// Re-exports for convenience
pub use ast::{Fragment, PseudoClassNode, Selector, SelectorList};
pub use document::Document;
pub use engine::rule::{Declaration, RuleInput, RuleStats};
pub use engine::scheduler::{EventLoop, SchedulerState, THROTTLE_DELAY, Ticket};
pub use engine::{AffectedElement, ExtCss, ExtCssConfig, MAX_REMOVE_ATTEMPTS, MAX_STYLE_PROTECTION_COUNT};
pub use error::{
    ConfigError, Error, MatchError, MatchFailure, NativeSelectorError, QueryError, SyntaxError,
    SyntaxErrorKind,
};
pub use pseudo::PseudoClass;
pub use query::{
    SelectorCache, matches, parse, query, select_elements_by_ast, select_elements_in, validate,
    with_shared_cache,
};
