//! Rule application.
//!
//! [`ExtCss`] evaluates its rules, styles or removes what they select, keeps
//! the styles in place against page scripts, and undoes everything when
//! elements stop matching or the engine is disposed.
//!
//! The engine is driven by its host. After DOM changes the host calls
//! [`ExtCss::process_mutations`]; when the engine wants to run it asks the
//! host's [`EventLoop`] for a callback and the host answers with
//! [`ExtCss::on_animation_frame`] or [`ExtCss::on_timeout`], passing back
//! the [`Ticket`] it was given.
//!
//! A cycle runs with the main observer disconnected:
//!
//! 1. every rule is evaluated
//! 2. elements that are no longer selected get their original `style`
//!    attribute back
//! 3. selected elements are styled or removed
//! 4. styled elements get a protection observer
//! 5. the main observer is reconnected

pub mod effects;
pub mod rule;
pub mod scheduler;

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use extcss_common::warning::Warnings;

use crate::document::Document;
use crate::error::{ConfigError, Error};
use crate::query::{SelectorCache, select_elements_by_ast};

use effects::STYLE_ATTRIBUTE;
use rule::{DebugMode, Declaration, Rule, RuleInput};
use scheduler::{EventLoop, Scheduler, SchedulerState, THROTTLE_DELAY, Ticket};

/// Removals of one element path before the engine stops fighting the page.
pub const MAX_REMOVE_ATTEMPTS: u32 = 10;

/// Style restorations of one element before protection is dropped.
pub const MAX_STYLE_PROTECTION_COUNT: u32 = 50;

/// Callback run before an element is styled; returns what to apply.
pub type BeforeStyleApplied<N> = Box<dyn FnMut(N, &[Declaration]) -> Vec<Declaration>>;

/// Engine configuration.
pub struct ExtCssConfig<D: Document> {
    /// Rules in priority order; later rules win on conflicting properties.
    pub rules: Vec<RuleInput>,
    /// Optional per-element declaration rewrite.
    pub before_style_applied: Option<BeforeStyleApplied<D::Node>>,
    /// Minimum spacing between cycles.
    pub throttle_delay: Duration,
}

impl<D: Document> ExtCssConfig<D> {
    /// A configuration with the default throttle and no hook.
    #[must_use]
    pub fn new(rules: Vec<RuleInput>) -> Self {
        Self {
            rules,
            before_style_applied: None,
            throttle_delay: THROTTLE_DELAY,
        }
    }

    /// Set the `before_style_applied` hook.
    #[must_use]
    pub fn with_before_style_applied(
        mut self,
        hook: impl FnMut(D::Node, &[Declaration]) -> Vec<Declaration> + 'static,
    ) -> Self {
        self.before_style_applied = Some(Box::new(hook));
        self
    }

    /// Override the throttle delay.
    #[must_use]
    pub const fn with_throttle_delay(mut self, delay: Duration) -> Self {
        self.throttle_delay = delay;
        self
    }
}

/// Snapshot of one element the engine has touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectedElement<N> {
    /// The element.
    pub node: N,
    /// Indices into [`ExtCss::rules`] of the rules selecting it.
    pub rules: Vec<usize>,
    /// Declarations currently applied.
    pub declarations: Vec<Declaration>,
    /// Times its style has been restored after a page write.
    pub protection_count: u32,
    /// True if the engine removed it.
    pub removed: bool,
    /// Position in the document; for a removed element, where it was
    /// before removal.
    pub path: String,
}

#[derive(Debug, Clone, Copy)]
enum Protection<O> {
    Unwatched,
    Watching(O),
    /// Limit reached; the element is left alone.
    Exhausted,
}

#[derive(Debug, Clone)]
struct Affected<O> {
    rules: Vec<usize>,
    declarations: Vec<Declaration>,
    /// `style` attribute before the first write.
    baseline: Option<String>,
    protection: Protection<O>,
    protection_count: u32,
    removed: bool,
    /// Path at removal, and the cycle it happened in.
    removal: Option<(String, u64)>,
}

impl<O> Affected<O> {
    const fn new(baseline: Option<String>) -> Self {
        Self {
            rules: Vec::new(),
            declarations: Vec::new(),
            baseline,
            protection: Protection::Unwatched,
            protection_count: 0,
            removed: false,
            removal: None,
        }
    }
}

/// An extended CSS engine bound to one document.
pub struct ExtCss<D: Document> {
    rules: Vec<Rule>,
    /// Last successful result per rule.
    matches: Vec<Vec<D::Node>>,
    cache: SelectorCache,
    before_style_applied: Option<BeforeStyleApplied<D::Node>>,
    scheduler: Scheduler,
    main_observer: Option<D::Observer>,
    affected: HashMap<D::Node, Affected<D::Observer>>,
    remove_attempts: HashMap<String, RemoveAttempts>,
    warnings: Warnings,
    /// Cycles run so far.
    cycle: u64,
}

/// Removals of one element path, and the cycle of the latest.
#[derive(Debug, Clone, Copy)]
struct RemoveAttempts {
    count: u32,
    last_cycle: u64,
}

impl<D: Document> ExtCss<D> {
    /// Compile the configured rules. Rules that fail to parse or carry
    /// invalid declarations are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an empty rule list or a zero throttle.
    pub fn new(config: ExtCssConfig<D>) -> Result<Self, ConfigError> {
        if config.rules.is_empty() {
            return Err(ConfigError::NoRules);
        }
        if config.throttle_delay.is_zero() {
            return Err(ConfigError::ZeroThrottle);
        }
        let cache = SelectorCache::new();
        let rules: Vec<Rule> = config
            .rules
            .iter()
            .filter_map(|input| Rule::compile(input, &cache))
            .collect();
        log::debug!(target: "extcss", "compiled {} of {} rules", rules.len(), config.rules.len());
        Ok(Self {
            matches: vec![Vec::new(); rules.len()],
            rules,
            cache,
            before_style_applied: config.before_style_applied,
            scheduler: Scheduler::new(config.throttle_delay),
            main_observer: None,
            affected: HashMap::new(),
            remove_attempts: HashMap::new(),
            warnings: Warnings::new(),
            cycle: 0,
        })
    }

    /// Compiled rules.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Scheduler state.
    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Run one cycle now. Any pending callback becomes a no-op.
    pub fn apply(&mut self, doc: &mut D, host: &mut impl EventLoop) {
        if self.scheduler.state() == SchedulerState::Running {
            return;
        }
        self.scheduler.begin();
        self.run_cycle(doc);
        self.scheduler.finish(host.now());
    }

    /// Handle pending mutation records: restore protected styles, then
    /// schedule a cycle if the document changed.
    pub fn process_mutations(&mut self, doc: &mut D, host: &mut impl EventLoop) {
        self.restore_protected(doc);
        let changed = self
            .main_observer
            .is_some_and(|observer| doc.take_mutations(observer) > 0);
        if changed && self.scheduler.notify(host) {
            log::trace!(target: "extcss", "cycle scheduled");
        }
    }

    /// The animation frame requested through [`EventLoop::request_animation_frame`].
    /// Does nothing unless `ticket` is the pending request.
    pub fn on_animation_frame(&mut self, doc: &mut D, host: &mut impl EventLoop, ticket: Ticket) {
        self.run_scheduled(doc, host, ticket);
    }

    /// The timer requested through [`EventLoop::set_timeout`].
    /// Does nothing unless `ticket` is the pending request.
    pub fn on_timeout(&mut self, doc: &mut D, host: &mut impl EventLoop, ticket: Ticket) {
        self.run_scheduled(doc, host, ticket);
    }

    /// Stop observing, undo every style, and drop pending work.
    pub fn dispose(&mut self, doc: &mut D) {
        if let Some(observer) = self.main_observer.take() {
            doc.disconnect(observer);
        }
        for (node, entry) in self.affected.drain() {
            revert(doc, node, &entry);
        }
        self.remove_attempts.clear();
        self.scheduler.cancel();
        self.warnings.clear();
    }

    /// Every element currently styled or removed, in document order.
    #[must_use]
    pub fn affected_elements(&self, doc: &D) -> Vec<AffectedElement<D::Node>> {
        let mut nodes: Vec<D::Node> = self.affected.keys().copied().collect();
        doc.sort_in_document_order(&mut nodes);
        nodes
            .into_iter()
            .filter_map(|node| {
                self.affected.get(&node).map(|entry| AffectedElement {
                    node,
                    rules: entry.rules.clone(),
                    declarations: entry.declarations.clone(),
                    protection_count: entry.protection_count,
                    removed: entry.removed,
                    path: match &entry.removal {
                        Some((path, _)) if entry.removed => path.clone(),
                        _ => effects::element_path(doc, node),
                    },
                })
            })
            .collect()
    }

    /// [`crate::query`] through this engine's selector cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Syntax`] or [`Error::Query`].
    pub fn query(&self, doc: &D, selector: &str) -> Result<Vec<D::Node>, Error> {
        self.cache.query(doc, selector)
    }

    /// [`crate::matches`] through this engine's selector cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Syntax`] or [`Error::Query`].
    pub fn matches(&self, doc: &D, element: D::Node, selector: &str) -> Result<bool, Error> {
        self.cache.matches(doc, element, selector)
    }

    fn run_scheduled(&mut self, doc: &mut D, host: &mut impl EventLoop, ticket: Ticket) {
        if !self.scheduler.begin_scheduled(ticket) {
            log::trace!(target: "extcss", "stale callback {ticket:?} ignored");
            return;
        }
        self.run_cycle(doc);
        self.scheduler.finish(host.now());
    }

    fn run_cycle(&mut self, doc: &mut D) {
        self.cycle += 1;
        if let Some(observer) = self.main_observer.take() {
            doc.disconnect(observer);
        }
        self.evaluate(doc);
        let selected = self.selection(doc);
        self.revert_stale(doc, &selected);
        self.apply_effects(doc, &selected);
        self.protect(doc);
        self.prune(doc);
        let root = doc.root();
        self.main_observer = Some(doc.observe_subtree(root));
        self.log_stats();
    }

    fn evaluate(&mut self, doc: &D) {
        for (rule, matches) in self.rules.iter_mut().zip(&mut self.matches) {
            let started = Instant::now();
            match select_elements_by_ast(rule.ast(), doc) {
                Ok(found) => {
                    rule.stats_mut().record(started.elapsed(), found.len());
                    *matches = found;
                }
                Err(e) => log::error!(target: "extcss", "rule '{}' failed: {e}", rule.selector()),
            }
        }
    }

    /// Connected selected elements in document order with the indices of
    /// the rules selecting each.
    fn selection(&self, doc: &D) -> Vec<(D::Node, Vec<usize>)> {
        let mut by_node: HashMap<D::Node, Vec<usize>> = HashMap::new();
        for (index, matches) in self.matches.iter().enumerate() {
            for &node in matches.iter().filter(|&&node| doc.is_connected(node)) {
                by_node.entry(node).or_default().push(index);
            }
        }
        let mut nodes: Vec<D::Node> = by_node.keys().copied().collect();
        doc.sort_in_document_order(&mut nodes);
        nodes
            .into_iter()
            .filter_map(|node| by_node.remove(&node).map(|rules| (node, rules)))
            .collect()
    }

    fn revert_stale(&mut self, doc: &mut D, selected: &[(D::Node, Vec<usize>)]) {
        let current: HashSet<D::Node> = selected.iter().map(|(node, _)| *node).collect();
        let mut stale: Vec<D::Node> = self
            .affected
            .iter()
            .filter(|&(node, entry)| !current.contains(node) && (!entry.removed || doc.is_connected(*node)))
            .map(|(node, _)| *node)
            .collect();
        doc.sort_in_document_order(&mut stale);
        for node in stale {
            if let Some(entry) = self.affected.remove(&node) {
                revert(doc, node, &entry);
            }
        }
    }

    fn apply_effects(&mut self, doc: &mut D, selected: &[(D::Node, Vec<usize>)]) {
        for (node, indices) in selected {
            let rules: Vec<&Rule> = indices.iter().filter_map(|&i| self.rules.get(i)).collect();
            if rules.iter().any(|rule| rule.is_remove()) {
                self.remove_element(doc, *node, indices);
                continue;
            }
            let merged = effects::merge_declarations(rules.iter().copied().map(Rule::declarations));
            let declarations = match self.before_style_applied.as_mut() {
                Some(hook) => hook(*node, &merged),
                None => merged,
            };
            self.style_element(doc, *node, indices, declarations);
        }
    }

    fn style_element(&mut self, doc: &mut D, node: D::Node, rules: &[usize], declarations: Vec<Declaration>) {
        let entry = self
            .affected
            .entry(node)
            .or_insert_with(|| Affected::new(doc.attribute(node, STYLE_ATTRIBUTE)));
        rules.clone_into(&mut entry.rules);
        if entry.removed {
            entry.removed = false;
            entry.baseline = doc.attribute(node, STYLE_ATTRIBUTE);
        }
        if entry.declarations == declarations && effects::is_applied(doc, node, &declarations) {
            return;
        }

        if let Protection::Watching(observer) = entry.protection {
            doc.disconnect(observer);
            entry.protection = Protection::Unwatched;
        }
        if entry.declarations != declarations && !entry.declarations.is_empty() {
            effects::restore_style(doc, node, entry.baseline.as_deref());
        }
        effects::write_declarations(doc, node, &declarations);
        entry.declarations = declarations;
    }

    fn remove_element(&mut self, doc: &mut D, node: D::Node, rules: &[usize]) {
        let path = effects::element_path(doc, node);
        let attempts = self.remove_attempts.entry(path.clone()).or_insert(RemoveAttempts {
            count: 0,
            last_cycle: self.cycle,
        });
        if attempts.count >= MAX_REMOVE_ATTEMPTS {
            let _ = self
                .warnings
                .warn_once("engine", &format!("removal limit reached for {path}"));
            if let Some(entry) = self.affected.remove(&node) {
                revert(doc, node, &entry);
            }
            return;
        }
        attempts.count += 1;
        attempts.last_cycle = self.cycle;

        let entry = self
            .affected
            .entry(node)
            .or_insert_with(|| Affected::new(doc.attribute(node, STYLE_ATTRIBUTE)));
        if let Protection::Watching(observer) = entry.protection {
            doc.disconnect(observer);
        }
        entry.protection = Protection::Unwatched;
        rules.clone_into(&mut entry.rules);
        entry.declarations.clear();
        entry.removed = true;
        doc.remove(node);
        log::debug!(target: "extcss", "removed {path}");
        entry.removal = Some((path, self.cycle));
    }

    /// Forget removals older than this cycle whose element is still
    /// detached, and removal counters this cycle did not touch. Counters at
    /// the limit stay so the path remains given up.
    fn prune(&mut self, doc: &D) {
        let cycle = self.cycle;
        self.affected.retain(|node, entry| match &entry.removal {
            Some((_, removed_in)) if entry.removed => *removed_in == cycle || doc.is_connected(*node),
            _ => true,
        });
        self.remove_attempts
            .retain(|_, attempts| attempts.count >= MAX_REMOVE_ATTEMPTS || attempts.last_cycle == cycle);
    }

    fn protect(&mut self, doc: &mut D) {
        for (&node, entry) in &mut self.affected {
            if entry.removed || entry.declarations.is_empty() {
                continue;
            }
            if matches!(entry.protection, Protection::Unwatched) {
                entry.protection = Protection::Watching(doc.observe_style(node));
            }
        }
    }

    /// Put back declarations a page script has overwritten.
    fn restore_protected(&mut self, doc: &mut D) {
        let warnings = &mut self.warnings;
        for (&node, entry) in &mut self.affected {
            let Protection::Watching(observer) = entry.protection else {
                continue;
            };
            if doc.take_mutations(observer) == 0 || effects::is_applied(doc, node, &entry.declarations) {
                continue;
            }
            entry.protection_count += 1;
            doc.disconnect(observer);
            if entry.protection_count > MAX_STYLE_PROTECTION_COUNT {
                entry.protection = Protection::Exhausted;
                let path = effects::element_path(doc, node);
                let _ = warnings.warn_once("engine", &format!("style protection limit reached for {path}"));
                continue;
            }
            effects::write_declarations(doc, node, &entry.declarations);
            entry.protection = Protection::Watching(doc.observe_style(node));
        }
    }

    fn log_stats(&self) {
        let global = self.rules.iter().any(|rule| rule.debug() == DebugMode::Global);
        for rule in &self.rules {
            if !global && rule.debug() == DebugMode::Off {
                continue;
            }
            let stats = rule.stats();
            log::info!(
                target: "extcss",
                "{}: runs={} mean={:?} max={:?} matched={}",
                rule.selector(),
                stats.runs,
                stats.mean(),
                stats.max,
                stats.last_matches
            );
        }
    }
}

fn revert<D: Document>(doc: &mut D, node: D::Node, entry: &Affected<D::Observer>) {
    if let Protection::Watching(observer) = entry.protection {
        doc.disconnect(observer);
    }
    if !entry.removed {
        effects::restore_style(doc, node, entry.baseline.as_deref());
    }
}
