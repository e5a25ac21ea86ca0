//! Rule compilation.
//!
//! A rule pairs a selector with ordered declarations. Two property names
//! are reserved: `remove: true` removes matched elements instead of styling
//! them and `debug: true|global` turns on timing logs.

use std::rc::Rc;
use std::time::Duration;

use extcss_dom::style::strip_important;
use serde::{Deserialize, Serialize};

use crate::ast::SelectorList;
use crate::query::SelectorCache;

/// Reserved property that turns a rule into a removal rule.
pub const REMOVE_PROPERTY: &str = "remove";
/// Reserved property that turns on timing logs.
pub const DEBUG_PROPERTY: &str = "debug";

/// A rule as supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleInput {
    /// Extended selector text.
    pub selector: String,
    /// `(property, value)` pairs in source order.
    #[serde(default)]
    pub declarations: Vec<(String, String)>,
}

impl RuleInput {
    /// A rule from borrowed parts.
    #[must_use]
    pub fn new(selector: &str, declarations: &[(&str, &str)]) -> Self {
        Self {
            selector: selector.to_string(),
            declarations: declarations
                .iter()
                .map(|(property, value)| ((*property).to_string(), (*value).to_string()))
                .collect(),
        }
    }
}

/// One style declaration, applied as `!important` inline style.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Declaration {
    /// Lowercase property name.
    pub property: String,
    /// Value with any `!important` stripped.
    pub value: String,
}

impl Declaration {
    /// Normalise a raw declaration.
    #[must_use]
    pub fn new(property: &str, value: &str) -> Self {
        let value = value.trim();
        Self {
            property: property.trim().to_ascii_lowercase(),
            value: strip_important(value).unwrap_or(value).to_string(),
        }
    }
}

/// Timing logs requested by `debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugMode {
    /// No logs.
    #[default]
    Off,
    /// `debug: true`: log this rule.
    Rule,
    /// `debug: global`: log every rule.
    Global,
}

/// Evaluation timings of one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuleStats {
    /// Completed evaluations.
    pub runs: u32,
    /// Sum of evaluation times.
    pub total: Duration,
    /// Slowest evaluation.
    pub max: Duration,
    /// Elements matched by the last successful evaluation.
    pub last_matches: usize,
}

impl RuleStats {
    /// Record one evaluation.
    pub fn record(&mut self, elapsed: Duration, matches: usize) {
        self.runs += 1;
        self.total += elapsed;
        self.max = self.max.max(elapsed);
        self.last_matches = matches;
    }

    /// Mean evaluation time.
    #[must_use]
    pub fn mean(&self) -> Duration {
        if self.runs == 0 {
            Duration::ZERO
        } else {
            self.total / self.runs
        }
    }
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    selector: String,
    ast: Rc<SelectorList>,
    declarations: Vec<Declaration>,
    remove: bool,
    debug: DebugMode,
    stats: RuleStats,
}

impl Rule {
    /// Compile `input`, parsing through `cache`. Invalid rules are logged
    /// and yield `None`.
    #[must_use]
    pub fn compile(input: &RuleInput, cache: &SelectorCache) -> Option<Self> {
        let ast = match cache.get_or_parse(&input.selector) {
            Ok(ast) => ast,
            Err(e) => {
                log::warn!(target: "extcss", "skipping rule: {e}");
                return None;
            }
        };

        let mut remove = ast.selectors.iter().any(|s| s.ends_with_remove());
        let mut debug = DebugMode::Off;
        let mut declarations: Vec<Declaration> = Vec::new();
        for (property, value) in &input.declarations {
            let declaration = Declaration::new(property, value);
            match declaration.property.as_str() {
                REMOVE_PROPERTY if declaration.value == "true" => remove = true,
                REMOVE_PROPERTY => {
                    log::warn!(
                        target: "extcss",
                        "skipping rule '{}': invalid remove value '{}'",
                        input.selector,
                        declaration.value
                    );
                    return None;
                }
                DEBUG_PROPERTY => {
                    debug = match declaration.value.as_str() {
                        "true" => DebugMode::Rule,
                        "global" => DebugMode::Global,
                        _ => DebugMode::Off,
                    };
                }
                "" => {}
                _ => match declarations
                    .iter_mut()
                    .find(|d| d.property == declaration.property)
                {
                    Some(existing) => existing.value = declaration.value,
                    None => declarations.push(declaration),
                },
            }
        }

        if remove && !declarations.is_empty() {
            log::warn!(
                target: "extcss",
                "skipping rule '{}': remove cannot be combined with style declarations",
                input.selector
            );
            return None;
        }
        if !remove && declarations.is_empty() {
            log::warn!(target: "extcss", "skipping rule '{}': no declarations", input.selector);
            return None;
        }

        Some(Self {
            selector: input.selector.clone(),
            ast,
            declarations,
            remove,
            debug,
            stats: RuleStats::default(),
        })
    }

    /// Selector text as written.
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Parsed selector.
    #[must_use]
    pub fn ast(&self) -> &SelectorList {
        &self.ast
    }

    /// Style declarations, last value per property.
    #[must_use]
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// True for removal rules.
    #[must_use]
    pub const fn is_remove(&self) -> bool {
        self.remove
    }

    /// Requested timing logs.
    #[must_use]
    pub const fn debug(&self) -> DebugMode {
        self.debug
    }

    /// Timings so far.
    #[must_use]
    pub const fn stats(&self) -> &RuleStats {
        &self.stats
    }

    pub(crate) const fn stats_mut(&mut self) -> &mut RuleStats {
        &mut self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(selector: &str, declarations: &[(&str, &str)]) -> Option<Rule> {
        Rule::compile(&RuleInput::new(selector, declarations), &SelectorCache::new())
    }

    #[test]
    fn strips_important_and_lowercases() {
        let rule = compile("div", &[("Display", "none !important")]).unwrap();
        assert_eq!(rule.declarations(), &[Declaration::new("display", "none")]);
        assert_eq!(rule.declarations()[0].value, "none");
    }

    #[test]
    fn later_values_win() {
        let rule = compile("div", &[("color", "red"), ("display", "none"), ("color", "blue")]).unwrap();
        let values: Vec<_> = rule
            .declarations()
            .iter()
            .map(|d| (d.property.as_str(), d.value.as_str()))
            .collect();
        assert_eq!(values, vec![("color", "blue"), ("display", "none")]);
    }

    #[test]
    fn trailing_remove_implies_removal() {
        let rule = compile("div:contains(ad):remove()", &[]).unwrap();
        assert!(rule.is_remove());
        assert!(compile("div", &[("remove", "true")]).unwrap().is_remove());
    }

    #[test]
    fn rejects_bad_rules() {
        assert!(compile("div", &[]).is_none());
        assert!(compile("div", &[("debug", "true")]).is_none());
        assert!(compile("div", &[("remove", "true"), ("display", "none")]).is_none());
        assert!(compile("div", &[("remove", "yes")]).is_none());
        assert!(compile("div:has(", &[("display", "none")]).is_none());
    }

    #[test]
    fn debug_modes() {
        let rule = compile("div", &[("display", "none"), ("debug", "global")]).unwrap();
        assert_eq!(rule.debug(), DebugMode::Global);
        let rule = compile("div", &[("debug", "true"), ("display", "none")]).unwrap();
        assert_eq!(rule.debug(), DebugMode::Rule);
    }

    #[test]
    fn stats_accumulate() {
        let mut stats = RuleStats::default();
        stats.record(Duration::from_millis(2), 3);
        stats.record(Duration::from_millis(4), 1);
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.max, Duration::from_millis(4));
        assert_eq!(stats.mean(), Duration::from_millis(3));
        assert_eq!(stats.last_matches, 1);
    }
}
