//! Selector AST.
//!
//! A [`SelectorList`] holds [`Selector`]s, each an ordered run of fragments.
//! [`RegularSelector`] fragments carry text the native engine can query
//! directly; [`ExtendedSelector`] fragments carry one pseudo-class the
//! evaluator has to run itself.
//!
//! `Display` produces selector text that parses back to an equal tree.

pub mod builder;
pub mod optimizer;

use std::fmt;

use serde::Serialize;

use crate::pseudo::PseudoClass;

/// Root of every parse result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub struct SelectorList {
    /// Never empty once built.
    pub selectors: Vec<Selector>,
}

/// One comma-separated entry of a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub struct Selector {
    /// The first fragment is always regular.
    pub fragments: Vec<Fragment>,
}

/// One step of a selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Fragment {
    /// Native selector text.
    Regular(RegularSelector),
    /// An extended pseudo-class.
    Extended(ExtendedSelector),
}

/// Text the native selection primitive accepts.
///
/// A fragment following an extended one starts with its combinator
/// (`" > span"`, `" span"`) or continues the compound (`".x"`). A first
/// fragment inside `:has()` may start with a combinator (`"> a"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub struct RegularSelector {
    /// Selector text.
    pub value: String,
}

/// Wrapper around exactly one pseudo-class node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub struct ExtendedSelector {
    /// The pseudo-class.
    pub child: PseudoClassNode,
}

/// Absolute or relative pseudo-class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PseudoClassNode {
    /// Raw argument.
    Absolute(AbsolutePseudoClass),
    /// Nested selector list argument.
    Relative(RelativePseudoClass),
}

/// A pseudo-class whose argument is parsed lazily by its matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub struct AbsolutePseudoClass {
    /// Pseudo-class name.
    pub name: PseudoClass,
    /// Argument exactly as written between the parentheses.
    pub value: String,
}

/// A pseudo-class whose argument is itself a selector list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub struct RelativePseudoClass {
    /// Pseudo-class name.
    pub name: PseudoClass,
    /// Parsed argument.
    pub selector_list: SelectorList,
}

impl Fragment {
    /// Shorthand for a regular fragment.
    #[must_use]
    pub fn regular(value: impl Into<String>) -> Self {
        Self::Regular(RegularSelector {
            value: value.into(),
        })
    }

    /// Shorthand for an absolute pseudo-class fragment.
    #[must_use]
    pub fn absolute(name: PseudoClass, value: impl Into<String>) -> Self {
        Self::Extended(ExtendedSelector {
            child: PseudoClassNode::Absolute(AbsolutePseudoClass {
                name,
                value: value.into(),
            }),
        })
    }

    /// Shorthand for a relative pseudo-class fragment.
    #[must_use]
    pub const fn relative(name: PseudoClass, selector_list: SelectorList) -> Self {
        Self::Extended(ExtendedSelector {
            child: PseudoClassNode::Relative(RelativePseudoClass {
                name,
                selector_list,
            }),
        })
    }

    /// The pseudo-class name of an extended fragment.
    #[must_use]
    pub const fn pseudo_class(&self) -> Option<PseudoClass> {
        match self {
            Self::Regular(_) => None,
            Self::Extended(extended) => Some(extended.child.name()),
        }
    }
}

impl PseudoClassNode {
    /// Pseudo-class name.
    #[must_use]
    pub const fn name(&self) -> PseudoClass {
        match self {
            Self::Absolute(node) => node.name,
            Self::Relative(node) => node.name,
        }
    }
}

impl SelectorList {
    /// True if any fragment at any depth is extended.
    #[must_use]
    pub fn has_extended(&self) -> bool {
        self.selectors
            .iter()
            .any(|selector| selector.fragments.iter().any(|f| matches!(f, Fragment::Extended(_))))
    }

    /// True if every selector is a single regular fragment.
    #[must_use]
    pub fn is_regular(&self) -> bool {
        self.selectors.iter().all(|selector| {
            matches!(selector.fragments.as_slice(), [Fragment::Regular(_)])
        })
    }
}

impl Selector {
    /// True if the selector ends with `:remove()`.
    #[must_use]
    pub fn ends_with_remove(&self) -> bool {
        self.fragments
            .last()
            .and_then(Fragment::pseudo_class)
            .is_some_and(|pc| pc == PseudoClass::Remove)
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, selector) in self.selectors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{selector}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for fragment in &self.fragments {
            match fragment {
                Fragment::Regular(regular) => f.write_str(&regular.value)?,
                Fragment::Extended(extended) => write!(f, "{}", extended.child)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for PseudoClassNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute(node) => write!(f, ":{}({})", node.name, node.value),
            Self::Relative(node) => write!(f, ":{}({})", node.name, node.selector_list),
        }
    }
}
