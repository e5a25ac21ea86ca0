//! The extended pseudo-class table.
//!
//! Names are matched case-insensitively. Anything not listed here is left to
//! the native selector engine.

use serde::Serialize;
use strum_macros::{Display, EnumString, IntoStaticStr};

/// An extended pseudo-class, by the name it is written with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum PseudoClass {
    /// `:contains(text|/re/)`
    Contains,
    /// Alias of `:contains()`.
    HasText,
    /// Alias of `:contains()`.
    #[strum(serialize = "-abp-contains")]
    #[serde(rename = "-abp-contains")]
    AbpContains,
    /// `:matches-css([pseudo,] prop: pattern)`
    MatchesCss,
    /// `:matches-css()` on `::before`.
    MatchesCssBefore,
    /// `:matches-css()` on `::after`.
    MatchesCssAfter,
    /// `:matches-attr(name[=value])`
    MatchesAttr,
    /// `:matches-property(chain[=value])`
    MatchesProperty,
    /// `:xpath(expr)`
    Xpath,
    /// `:nth-ancestor(n)`
    NthAncestor,
    /// `:upward(n|selector)`
    Upward,
    /// `:remove()`
    Remove,
    /// `:has(list)`
    Has,
    /// Alias of `:has()`.
    #[strum(serialize = "-abp-has")]
    #[serde(rename = "-abp-has")]
    AbpHas,
    /// Alias of `:has()`.
    If,
    /// `:is(list)`
    Is,
    /// `:not(list)`
    Not,
    /// Negated `:has()`.
    IfNot,
}

impl PseudoClass {
    /// Takes a nested selector list as its argument.
    #[must_use]
    pub const fn is_relative(self) -> bool {
        matches!(
            self,
            Self::Has | Self::AbpHas | Self::If | Self::Is | Self::Not | Self::IfNot
        )
    }

    /// Takes a raw argument string.
    #[must_use]
    pub const fn is_absolute(self) -> bool {
        !self.is_relative()
    }

    /// Scoped to the candidate's subtree and siblings; allows a leading
    /// combinator in the argument.
    #[must_use]
    pub const fn is_has_like(self) -> bool {
        matches!(self, Self::Has | Self::AbpHas | Self::If | Self::IfNot)
    }

    /// Replaces the candidate set instead of filtering it.
    #[must_use]
    pub const fn is_finder(self) -> bool {
        matches!(self, Self::Xpath | Self::NthAncestor | Self::Upward)
    }

    /// Text match family.
    #[must_use]
    pub const fn is_contains(self) -> bool {
        matches!(self, Self::Contains | Self::HasText | Self::AbpContains)
    }

    /// Computed style family.
    #[must_use]
    pub const fn is_matches_css(self) -> bool {
        matches!(
            self,
            Self::MatchesCss | Self::MatchesCssBefore | Self::MatchesCssAfter
        )
    }

    /// Arguments that may hold quoted strings with unbalanced parentheses.
    #[must_use]
    pub(crate) const fn tracks_quotes(self) -> bool {
        matches!(
            self,
            Self::MatchesAttr | Self::MatchesProperty | Self::Xpath | Self::Upward
        )
    }

    /// Arguments that may hold `/regex/` literals.
    #[must_use]
    pub(crate) const fn tracks_regex(self) -> bool {
        self.is_contains()
            || self.is_matches_css()
            || matches!(self, Self::MatchesAttr | Self::MatchesProperty)
    }

    /// Look a name up, ignoring case. `None` means the name is native.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        name.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for name in [
            "contains",
            "has-text",
            "-abp-contains",
            "matches-css-before",
            "matches-attr",
            "nth-ancestor",
            "-abp-has",
            "if-not",
        ] {
            let pc = PseudoClass::lookup(name).unwrap();
            assert_eq!(pc.to_string(), name);
        }
    }

    #[test]
    fn lookup_ignores_case_and_rejects_native() {
        assert_eq!(PseudoClass::lookup("HAS"), Some(PseudoClass::Has));
        assert_eq!(PseudoClass::lookup("Matches-CSS"), Some(PseudoClass::MatchesCss));
        assert_eq!(PseudoClass::lookup("first-child"), None);
        assert_eq!(PseudoClass::lookup("nth-child"), None);
    }

    #[test]
    fn kinds() {
        assert!(PseudoClass::If.is_has_like());
        assert!(!PseudoClass::Not.is_has_like());
        assert!(PseudoClass::Not.is_relative());
        assert!(PseudoClass::Upward.is_finder());
        assert!(PseudoClass::Remove.is_absolute());
    }
}
