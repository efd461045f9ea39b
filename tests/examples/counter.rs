//! Counter integration tests.
//!
//! A counter component that a rule keeps incrementing until it reaches a
//! limit. Validates: rule chaining, termination, and the entry kill switch.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use synclog::engine::{
    ActionEntry, ActionPattern, Arg, EngineConfig, FilterStep, Frame, Invocation, Outcome,
    Registry, Rule, Signature, SyncEngine, Term,
};
use synclog::foundation::{ErrorKind, Fields, SemanticLimit, Value, fields};

/// Registers `Counter.start` (external) and `Counter.increment`.
fn registry(counter: &Arc<AtomicI64>) -> Registry {
    let mut registry = Registry::new();
    registry
        .declare(Signature::new("Counter.start").inputs(["limit"]))
        .unwrap();

    let counter = Arc::clone(counter);
    registry
        .operation(
            Signature::new("Counter.increment").outputs(["value"]),
            move |_: &Fields| {
                let value = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Outcome::success(fields! { "value" => value })
            },
        )
        .unwrap();
    registry
}

/// Creates the counter rules.
///
/// `start` kicks off the first increment; `keep-counting` increments again
/// while the latest value is below the limit given at start.
fn rules() -> Vec<Rule> {
    let start = Rule::new("start")
        .when(ActionPattern::new("Counter.start"))
        .then(Invocation::new("Counter.increment"));

    let below_limit = FilterStep::new("value < limit", ["value", "limit"], |f: &Frame| {
        match (
            f.get("value").and_then(Value::as_int),
            f.get("limit").and_then(Value::as_int),
        ) {
            (Some(value), Some(limit)) => value < limit,
            _ => false,
        }
    });

    let keep_counting = Rule::new("keep-counting")
        .when(ActionPattern::new("Counter.start").input("limit", Term::var("limit")))
        .when(ActionPattern::new("Counter.increment").output("value", Term::var("value")))
        .filter(below_limit)
        .then(Invocation::new("Counter.increment"));

    vec![start, keep_counting]
}

fn engine(counter: &Arc<AtomicI64>, config: EngineConfig) -> SyncEngine {
    SyncEngine::compile(registry(counter), rules(), config).unwrap()
}

fn start(limit: i64) -> ActionEntry {
    ActionEntry::new("Counter.start", fields! { "limit" => limit }, Outcome::ok())
}

#[test]
fn counter_increments_to_limit() {
    let counter = Arc::new(AtomicI64::new(0));
    let engine = engine(&counter, EngineConfig::testing());

    let report = engine.run(start(5)).unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 5);
    assert_eq!(report.entries_named("Counter.increment").count(), 5);
    assert_eq!(report.fired("start"), 1);
    assert_eq!(report.fired("keep-counting"), 4);
}

#[test]
fn counter_chain_terminates_at_quiescence() {
    let counter = Arc::new(AtomicI64::new(0));
    let engine = engine(&counter, EngineConfig::testing());

    let report = engine.run(start(1)).unwrap();

    // The first increment already reaches the limit.
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(report.entries().len(), 2);
    assert!(report.responses().is_empty());
}

#[test]
fn each_increment_matches_only_once() {
    let counter = Arc::new(AtomicI64::new(0));
    let engine = engine(&counter, EngineConfig::testing());

    let report = engine.run(start(4)).unwrap();

    // Each increment is the new entry in exactly one keep-counting firing.
    let triggers: Vec<Vec<usize>> = report
        .firings
        .iter()
        .filter(|f| &*f.rule == "keep-counting")
        .map(|f| f.frame.matched().collect())
        .collect();
    assert_eq!(triggers, vec![vec![0, 1], vec![0, 2], vec![0, 3]]);
}

#[test]
fn counter_kill_switch() {
    let counter = Arc::new(AtomicI64::new(0));
    let config = EngineConfig::testing().with_max_entries_per_trace(10);
    let engine = engine(&counter, config);

    let err = engine.run(start(1_000)).unwrap_err();

    assert!(matches!(
        err.kind,
        ErrorKind::LimitExceeded(SemanticLimit::MaxEntriesPerTrace { limit: 10, .. })
    ));
    // Effects up to the limit happened and are not rolled back.
    assert_eq!(counter.load(Ordering::SeqCst), 10);
}

#[test]
fn literal_arguments_reach_the_operation() {
    let counter = Arc::new(AtomicI64::new(0));
    let mut registry = registry(&counter);
    registry
        .operation(
            Signature::new("Counter.reset").inputs(["to"]),
            |inputs: &Fields| match inputs.get("to").and_then(Value::as_int) {
                Some(0) => Outcome::ok(),
                _ => Outcome::error("can only reset to zero"),
            },
        )
        .unwrap();
    let rule = Rule::new("reset")
        .when(ActionPattern::new("Counter.start"))
        .then(Invocation::new("Counter.reset").arg("to", Arg::lit(0)));
    let engine = SyncEngine::compile(registry, vec![rule], EngineConfig::testing()).unwrap();

    let report = engine.run(start(3)).unwrap();
    let reset = report.entries_named("Counter.reset").next().unwrap();
    assert!(!reset.is_error());
}
