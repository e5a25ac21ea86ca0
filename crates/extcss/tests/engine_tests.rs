//! Tests for rule application, reapplication scheduling, style protection
//! and revert.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use extcss::{
    ConfigError, Declaration, EventLoop, ExtCss, ExtCssConfig, MAX_REMOVE_ATTEMPTS,
    MAX_STYLE_PROTECTION_COUNT, RuleInput, SchedulerState, THROTTLE_DELAY, Ticket,
};
use extcss_dom::{DomTree, NodeId, ObserveOptions};

/// Host clock and callback requests, advanced by hand.
#[derive(Debug, Default)]
struct FakeLoop {
    now: Duration,
    frames: Vec<Ticket>,
    timeouts: Vec<(Duration, Ticket)>,
}

impl FakeLoop {
    fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    fn last_frame(&self) -> Ticket {
        *self.frames.last().unwrap()
    }

    fn last_timeout(&self) -> Ticket {
        self.timeouts.last().unwrap().1
    }

    fn delays(&self) -> Vec<Duration> {
        self.timeouts.iter().map(|(delay, _)| *delay).collect()
    }
}

impl EventLoop for FakeLoop {
    fn now(&self) -> Duration {
        self.now
    }

    fn request_animation_frame(&mut self, ticket: Ticket) {
        self.frames.push(ticket);
    }

    fn set_timeout(&mut self, delay: Duration, ticket: Ticket) {
        self.timeouts.push((delay, ticket));
    }
}

fn page() -> (DomTree, NodeId) {
    let mut tree = DomTree::new();
    let html = tree.create_element(NodeId::ROOT, "html", &[]);
    let body = tree.create_element(html, "body", &[]);
    (tree, body)
}

fn engine(rules: Vec<RuleInput>) -> ExtCss<DomTree> {
    let _ = env_logger::builder().is_test(true).try_init();
    ExtCss::new(ExtCssConfig::new(rules)).unwrap()
}

fn hide(selector: &str) -> RuleInput {
    RuleInput::new(selector, &[("display", "none")])
}

fn is_hidden(tree: &DomTree, node: NodeId) -> bool {
    tree.style_property(node, "display").as_deref() == Some("none")
        && tree.style_property_is_important(node, "display")
}

// ========== configuration ==========

#[test]
fn test_config_requires_rules() {
    let result = ExtCss::<DomTree>::new(ExtCssConfig::new(Vec::new()));
    assert_eq!(result.err(), Some(ConfigError::NoRules));
}

#[test]
fn test_config_rejects_zero_throttle() {
    let config = ExtCssConfig::<DomTree>::new(vec![hide("div")]).with_throttle_delay(Duration::ZERO);
    assert_eq!(ExtCss::new(config).err(), Some(ConfigError::ZeroThrottle));
}

#[test]
fn test_invalid_rules_are_skipped() {
    let engine = engine(vec![
        hide("div:has("),
        RuleInput::new("div", &[]),
        RuleInput::new("p", &[("remove", "true"), ("color", "red")]),
        hide("p"),
    ]);
    assert_eq!(engine.rules().len(), 1);
    assert_eq!(engine.rules()[0].selector(), "p");
}

// ========== apply and revert ==========

#[test]
fn test_has_rule_hides_and_reverts() {
    let (mut tree, body) = page();
    let wrap = tree.create_element(body, "div", &[("style", "color: red;")]);
    let banner = tree.create_element(wrap, "span", &[("class", "banner")]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![hide("div:has(.banner)")]);

    engine.apply(&mut tree, &mut host);
    assert!(is_hidden(&tree, wrap));
    assert_eq!(tree.style_property(wrap, "color").as_deref(), Some("red"));
    let affected = engine.affected_elements(&tree);
    assert_eq!(affected.len(), 1);
    assert_eq!(affected[0].node, wrap);
    assert_eq!(affected[0].rules, vec![0]);
    assert_eq!(affected[0].declarations, vec![Declaration::new("display", "none")]);

    tree.remove_child(wrap, banner);
    host.advance(Duration::from_secs(1));
    engine.process_mutations(&mut tree, &mut host);
    assert_eq!(host.frames.len(), 1);
    assert_eq!(engine.state(), SchedulerState::Scheduled);

    let frame = host.last_frame();
    engine.on_animation_frame(&mut tree, &mut host, frame);
    assert_eq!(engine.state(), SchedulerState::Idle);
    assert_eq!(tree.attribute(wrap, "style"), Some("color: red;"));
    assert!(engine.affected_elements(&tree).is_empty());
}

#[test]
fn test_revert_removes_style_attribute_it_added() {
    let (mut tree, body) = page();
    let ad = tree.create_element(body, "div", &[("class", "ad")]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![hide(".ad")]);

    engine.apply(&mut tree, &mut host);
    assert!(is_hidden(&tree, ad));

    tree.set_attribute(ad, "class", "story");
    host.advance(Duration::from_secs(1));
    engine.process_mutations(&mut tree, &mut host);
    let frame = host.last_frame();
    engine.on_animation_frame(&mut tree, &mut host, frame);
    assert_eq!(tree.attribute(ad, "style"), None);
}

#[test]
fn test_second_apply_writes_nothing() {
    let (mut tree, body) = page();
    let ad = tree.create_element(body, "div", &[("class", "ad")]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![hide(".ad")]);

    engine.apply(&mut tree, &mut host);
    let watcher = tree.observe(ad, ObserveOptions::attribute("style"));
    engine.apply(&mut tree, &mut host);

    assert!(tree.take_records(watcher).is_empty());
    assert!(is_hidden(&tree, ad));
}

#[test]
fn test_rules_merge_in_order() {
    let (mut tree, body) = page();
    let element = tree.create_element(body, "div", &[("class", "x")]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![
        RuleInput::new("div", &[("color", "red"), ("visibility", "hidden")]),
        RuleInput::new(".x", &[("color", "blue !important")]),
    ]);

    engine.apply(&mut tree, &mut host);
    assert_eq!(tree.style_property(element, "color").as_deref(), Some("blue"));
    assert_eq!(tree.style_property(element, "visibility").as_deref(), Some("hidden"));
    let affected = engine.affected_elements(&tree);
    assert_eq!(affected[0].rules, vec![0, 1]);
}

#[test]
fn test_before_style_applied_rewrites_declarations() {
    let (mut tree, body) = page();
    let ad = tree.create_element(body, "div", &[("class", "ad")]);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_by_hook = Rc::clone(&seen);
    let config = ExtCssConfig::<DomTree>::new(vec![hide(".ad")]).with_before_style_applied(
        move |node: NodeId, declarations: &[Declaration]| {
            seen_by_hook.borrow_mut().push((node, declarations.to_vec()));
            vec![Declaration::new("visibility", "hidden")]
        },
    );
    let mut engine = ExtCss::new(config).unwrap();
    let mut host = FakeLoop::default();

    engine.apply(&mut tree, &mut host);
    assert_eq!(tree.style_property(ad, "visibility").as_deref(), Some("hidden"));
    assert_eq!(tree.style_property(ad, "display"), None);
    assert_eq!(seen.borrow().as_slice(), &[(ad, vec![Declaration::new("display", "none")])]);
}

#[test]
fn test_failed_evaluation_keeps_previous_effects() {
    let (mut tree, body) = page();
    let html = tree.parent(body).unwrap();
    let div = tree.create_element(body, "div", &[]);
    let section = tree.create_element(div, "section", &[]);
    let _ = tree.create_element(section, "p", &[]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![hide("p:nth-ancestor(3)")]);

    engine.apply(&mut tree, &mut host);
    assert!(is_hidden(&tree, body));

    // Too shallow for three levels: the rule now fails.
    let _ = tree.create_element(html, "p", &[]);
    engine.apply(&mut tree, &mut host);
    assert!(is_hidden(&tree, body));
    assert_eq!(engine.rules()[0].stats().runs, 1);
}

#[test]
fn test_dispose_reverts_everything() {
    let (mut tree, body) = page();
    let ad = tree.create_element(body, "div", &[("class", "ad"), ("style", "margin: 0;")]);
    let other = tree.create_element(body, "p", &[]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![hide(".ad"), hide("p")]);

    engine.apply(&mut tree, &mut host);
    engine.dispose(&mut tree);

    assert_eq!(tree.attribute(ad, "style"), Some("margin: 0;"));
    assert_eq!(tree.attribute(other, "style"), None);
    assert!(engine.affected_elements(&tree).is_empty());
    assert!(!tree.has_pending_records());
}

// ========== removal ==========

#[test]
fn test_remove_rule_detaches_elements() {
    let (mut tree, body) = page();
    let ad = tree.create_element(body, "div", &[("class", "ad")]);
    let keep = tree.create_element(body, "div", &[]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![RuleInput::new("div.ad:remove()", &[])]);

    engine.apply(&mut tree, &mut host);
    assert!(!tree.is_connected(ad));
    assert!(tree.is_connected(keep));
    let affected = engine.affected_elements(&tree);
    assert_eq!(affected.len(), 1);
    assert!(affected[0].removed);
}

#[test]
fn test_removal_cap_stops_reinsertion_race() {
    let (mut tree, body) = page();
    let ad = tree.create_element(body, "div", &[("class", "ad")]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![RuleInput::new("div.ad", &[("remove", "true")])]);

    for _ in 0..MAX_REMOVE_ATTEMPTS {
        engine.apply(&mut tree, &mut host);
        assert!(!tree.is_connected(ad));
        tree.append_child(body, ad);
    }

    engine.apply(&mut tree, &mut host);
    assert!(tree.is_connected(ad));
    assert!(engine.affected_elements(&tree).is_empty());
}

#[test]
fn test_removed_elements_keep_their_path() {
    let (mut tree, body) = page();
    let _ = tree.create_element(body, "p", &[]);
    let ad = tree.create_element(body, "div", &[("id", "ad")]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![RuleInput::new("div#ad:remove()", &[])]);

    engine.apply(&mut tree, &mut host);
    assert!(!tree.is_connected(ad));
    let affected = engine.affected_elements(&tree);
    assert_eq!(
        affected[0].path,
        "html:nth-child(1) > body:nth-child(1) > div#ad:nth-child(2)"
    );
}

#[test]
fn test_detached_removals_are_forgotten() {
    let (mut tree, body) = page();
    let ad = tree.create_element(body, "div", &[("class", "ad")]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![RuleInput::new("div.ad:remove()", &[])]);

    engine.apply(&mut tree, &mut host);
    assert_eq!(engine.affected_elements(&tree).len(), 1);

    engine.apply(&mut tree, &mut host);
    assert!(!tree.is_connected(ad));
    assert!(engine.affected_elements(&tree).is_empty());
}

#[test]
fn test_quiet_cycle_resets_removal_count() {
    let (mut tree, body) = page();
    let ad = tree.create_element(body, "div", &[("class", "ad")]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![RuleInput::new("div.ad:remove()", &[])]);

    for _ in 0..MAX_REMOVE_ATTEMPTS - 1 {
        engine.apply(&mut tree, &mut host);
        assert!(!tree.is_connected(ad));
        tree.append_child(body, ad);
    }

    // The page takes the element out itself; nothing is removed this cycle.
    tree.remove_child(body, ad);
    engine.apply(&mut tree, &mut host);

    for _ in 0..MAX_REMOVE_ATTEMPTS {
        tree.append_child(body, ad);
        engine.apply(&mut tree, &mut host);
        assert!(!tree.is_connected(ad));
    }
}

// ========== protection ==========

#[test]
fn test_protection_restores_until_limit() {
    let (mut tree, body) = page();
    let ad = tree.create_element(body, "div", &[("class", "ad")]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![hide(".ad")]);
    engine.apply(&mut tree, &mut host);

    for _ in 0..MAX_STYLE_PROTECTION_COUNT {
        tree.set_style_property(ad, "display", "block", false);
        engine.process_mutations(&mut tree, &mut host);
        assert!(is_hidden(&tree, ad));
    }

    tree.set_style_property(ad, "display", "block", false);
    engine.process_mutations(&mut tree, &mut host);
    assert_eq!(tree.style_property(ad, "display").as_deref(), Some("block"));
    assert_eq!(
        engine.affected_elements(&tree)[0].protection_count,
        MAX_STYLE_PROTECTION_COUNT + 1
    );

    // Given up: further writes stay.
    tree.set_style_property(ad, "display", "flex", false);
    engine.process_mutations(&mut tree, &mut host);
    assert_eq!(tree.style_property(ad, "display").as_deref(), Some("flex"));
}

#[test]
fn test_unrelated_style_writes_are_left_alone() {
    let (mut tree, body) = page();
    let ad = tree.create_element(body, "div", &[("class", "ad")]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![hide(".ad")]);
    engine.apply(&mut tree, &mut host);

    tree.set_style_property(ad, "color", "green", false);
    engine.process_mutations(&mut tree, &mut host);
    assert_eq!(tree.style_property(ad, "color").as_deref(), Some("green"));
    assert_eq!(engine.affected_elements(&tree)[0].protection_count, 0);
}

// ========== scheduling ==========

#[test]
fn test_recent_run_defers_with_timer() {
    let (mut tree, body) = page();
    let element = tree.create_element(body, "div", &[]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![hide(".ad")]);
    engine.apply(&mut tree, &mut host);

    tree.set_attribute(element, "class", "ad");
    host.advance(Duration::from_millis(100));
    engine.process_mutations(&mut tree, &mut host);
    assert_eq!(host.delays(), vec![THROTTLE_DELAY - Duration::from_millis(100)]);
    assert!(host.frames.is_empty());
    assert!(!is_hidden(&tree, element));

    host.advance(Duration::from_millis(50));
    let timeout = host.last_timeout();
    engine.on_timeout(&mut tree, &mut host, timeout);
    assert!(is_hidden(&tree, element));
}

#[test]
fn test_mutation_bursts_coalesce() {
    let (mut tree, body) = page();
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![hide(".ad")]);
    engine.apply(&mut tree, &mut host);
    host.advance(Duration::from_secs(1));

    for _ in 0..3 {
        let _ = tree.create_element(body, "div", &[("class", "ad")]);
        engine.process_mutations(&mut tree, &mut host);
    }
    assert_eq!(host.frames.len(), 1);

    let frame = host.last_frame();
    engine.on_animation_frame(&mut tree, &mut host, frame);
    assert_eq!(engine.affected_elements(&tree).len(), 3);
}

#[test]
fn test_explicit_apply_makes_pending_callback_stale() {
    let (mut tree, body) = page();
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![hide(".ad")]);
    engine.apply(&mut tree, &mut host);
    host.advance(Duration::from_secs(1));

    let ad = tree.create_element(body, "div", &[("class", "ad")]);
    engine.process_mutations(&mut tree, &mut host);
    engine.apply(&mut tree, &mut host);
    assert!(is_hidden(&tree, ad));
    let runs = engine.rules()[0].stats().runs;

    let frame = host.last_frame();
    engine.on_animation_frame(&mut tree, &mut host, frame);
    assert_eq!(engine.rules()[0].stats().runs, runs);
}

#[test]
fn test_superseded_frame_cannot_run_inside_throttle_window() {
    let (mut tree, body) = page();
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![hide(".ad")]);
    engine.apply(&mut tree, &mut host);
    host.advance(Duration::from_secs(1));

    let _ = tree.create_element(body, "div", &[("class", "ad")]);
    engine.process_mutations(&mut tree, &mut host);
    let superseded = host.last_frame();
    engine.apply(&mut tree, &mut host);
    let runs = engine.rules()[0].stats().runs;

    host.advance(Duration::from_millis(10));
    let late = tree.create_element(body, "div", &[("class", "ad")]);
    engine.process_mutations(&mut tree, &mut host);
    assert_eq!(host.delays(), vec![THROTTLE_DELAY - Duration::from_millis(10)]);

    engine.on_animation_frame(&mut tree, &mut host, superseded);
    assert_eq!(engine.rules()[0].stats().runs, runs);
    assert!(!is_hidden(&tree, late));
    assert_eq!(engine.state(), SchedulerState::Scheduled);

    host.advance(THROTTLE_DELAY - Duration::from_millis(10));
    let timeout = host.last_timeout();
    engine.on_timeout(&mut tree, &mut host, timeout);
    assert_eq!(engine.rules()[0].stats().runs, runs + 1);
    assert!(is_hidden(&tree, late));
}

#[test]
fn test_own_writes_do_not_schedule() {
    let (mut tree, body) = page();
    let _ = tree.create_element(body, "div", &[("class", "ad")]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![hide(".ad")]);

    engine.apply(&mut tree, &mut host);
    engine.process_mutations(&mut tree, &mut host);
    assert!(host.frames.is_empty());
    assert!(host.timeouts.is_empty());
    assert_eq!(engine.state(), SchedulerState::Idle);
}

// ========== statistics and queries ==========

#[test]
fn test_stats_and_cached_queries() {
    let (mut tree, body) = page();
    let ad = tree.create_element(body, "div", &[("class", "ad")]);
    let mut host = FakeLoop::default();
    let mut engine = engine(vec![RuleInput::new(".ad", &[("display", "none"), ("debug", "true")])]);

    engine.apply(&mut tree, &mut host);
    engine.apply(&mut tree, &mut host);
    let stats = engine.rules()[0].stats();
    assert_eq!(stats.runs, 2);
    assert_eq!(stats.last_matches, 1);
    assert!(stats.max <= stats.total);

    assert_eq!(engine.query(&tree, "div.ad").unwrap(), vec![ad]);
    assert!(engine.matches(&tree, ad, "div:matches-attr(class=ad)").unwrap());
}
