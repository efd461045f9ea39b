//! The synchronization engine.
//!
//! One call to [`SyncEngine::run`] processes one trace from its seed entry to
//! quiescence. New entries go onto a trace-scoped FIFO work queue; each entry
//! taken off the queue is matched against the rules indexed under its action
//! name, expanded, and dispatched, which may append further entries.
//!
//! Entries are processed in append order, and the join stage only looks at
//! older entries, so re-evaluating a sealed log in index order reproduces the
//! original evaluation exactly. That is what [`SyncEngine::replay`] does.

use std::collections::VecDeque;
use std::sync::Arc;

use synclog_foundation::{Error, Result, SemanticLimit};

use crate::action::{ActionEntry, EntryRef, TraceId};
use crate::config::EngineConfig;
use crate::dispatch::{ActionDispatcher, PlannedInvocation};
use crate::expand::FrameExpander;
use crate::frame::Frame;
use crate::log::{ActionLog, SealedTrace};
use crate::pattern::PatternMatcher;
use crate::registry::Registry;
use crate::rule::{Rule, RuleSet};

// =============================================================================
// Reports
// =============================================================================

/// One dispatched frame of one rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Firing {
    /// The rule that fired.
    pub rule: Arc<str>,
    /// The frame it dispatched.
    pub frame: Frame,
    /// Entries appended by its invocations, in order.
    pub produced: Vec<EntryRef>,
}

/// Everything that happened in one trace.
#[derive(Clone, Debug)]
pub struct TraceReport {
    /// The trace id.
    pub trace: TraceId,
    /// All entries, in append order.
    pub sealed: SealedTrace,
    /// Every firing, in dispatch order.
    pub firings: Vec<Firing>,
    /// Indices of the terminal response entries.
    pub terminal: Vec<usize>,
}

impl TraceReport {
    /// All entries of the trace.
    #[must_use]
    pub fn entries(&self) -> &[ActionEntry] {
        &self.sealed.entries
    }

    /// Every terminal response entry. A well-formed trace has exactly one.
    #[must_use]
    pub fn responses(&self) -> Vec<&ActionEntry> {
        self.terminal
            .iter()
            .filter_map(|&i| self.sealed.entries.get(i))
            .collect()
    }

    /// The terminal response, if there is exactly one.
    #[must_use]
    pub fn response(&self) -> Option<&ActionEntry> {
        match self.terminal.as_slice() {
            [only] => self.sealed.entries.get(*only),
            _ => None,
        }
    }

    /// Entries with the given action name, in append order.
    pub fn entries_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ActionEntry> {
        self.sealed.entries_named(name)
    }

    /// Number of frames the named rule dispatched.
    #[must_use]
    pub fn fired(&self, rule: &str) -> usize {
        self.firings.iter().filter(|f| &*f.rule == rule).count()
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Runs traces against an immutable rule set.
///
/// `Send + Sync`; independent traces may run concurrently from many threads
/// against one engine.
#[derive(Debug)]
pub struct SyncEngine {
    registry: Arc<Registry>,
    rules: RuleSet,
    config: EngineConfig,
    log: ActionLog,
}

impl SyncEngine {
    /// Creates an engine from an already compiled rule set.
    #[must_use]
    pub fn new(registry: Arc<Registry>, rules: RuleSet, config: EngineConfig) -> Self {
        let log = ActionLog::new().with_retention(config.retain_closed_traces);
        Self {
            registry,
            rules,
            config,
            log,
        }
    }

    /// Validates `rules` against `registry` and creates an engine.
    ///
    /// # Errors
    /// Returns the first rule-authoring error found.
    pub fn compile(
        registry: Registry,
        rules: impl IntoIterator<Item = Rule>,
        config: EngineConfig,
    ) -> Result<Self> {
        let rules = RuleSet::compile(rules, &registry)?;
        Ok(Self::new(Arc::new(registry), rules, config))
    }

    /// The registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The rule set.
    #[must_use]
    pub const fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The action log.
    #[must_use]
    pub const fn log(&self) -> &ActionLog {
        &self.log
    }

    /// Runs a new trace seeded with `seed` until no rule fires.
    ///
    /// The trace is closed when the run ends, successfully or not.
    ///
    /// # Errors
    /// Returns an error if a kill switch trips, or if a query or operation
    /// is missing at runtime. Operation failures are not errors; they are
    /// entries.
    #[tracing::instrument(skip_all, fields(seed = %seed.name, trace = tracing::field::Empty))]
    pub fn run(&self, seed: ActionEntry) -> Result<TraceReport> {
        let trace = self.log.open_trace();
        tracing::Span::current().record("trace", tracing::field::display(trace));

        let mut seed = seed.in_trace(trace);
        seed.cause = None;
        let seed_ref = self.log.append(seed);

        let result = self.drain(trace, seed_ref.index);
        let sealed = self.log.close_trace(trace);
        let firings = result?;

        let terminal: Vec<usize> = sealed
            .entries
            .iter()
            .filter(|e| e.name == self.config.terminal_action)
            .map(|e| e.index)
            .collect();
        tracing::debug!(
            entries = sealed.len(),
            firings = firings.len(),
            responses = terminal.len(),
            "trace complete"
        );

        Ok(TraceReport {
            trace,
            sealed,
            firings,
            terminal,
        })
    }

    /// Processes the work queue of one trace.
    fn drain(&self, trace: TraceId, seed: usize) -> Result<Vec<Firing>> {
        let dispatcher = ActionDispatcher::new(&self.registry, &self.log);
        let mut queue = VecDeque::from([seed]);
        let mut firings = Vec::new();

        while let Some(index) = queue.pop_front() {
            let entries = self.log.entries_in_trace(trace);
            for (rule, frame) in self.evaluate(&entries, index)? {
                let produced = dispatcher.dispatch(rule, &frame)?;
                queue.extend(produced.iter().map(|r| r.index));
                firings.push(Firing {
                    rule: Arc::clone(&rule.name),
                    frame,
                    produced,
                });

                let len = self.log.trace_len(trace);
                if len > self.config.max_entries_per_trace {
                    tracing::warn!(
                        rule = %rule.name,
                        limit = self.config.max_entries_per_trace,
                        "entry limit exceeded"
                    );
                    return Err(Error::limit_exceeded(SemanticLimit::MaxEntriesPerTrace {
                        limit: self.config.max_entries_per_trace,
                        context: Some(rule.name.to_string()),
                    }));
                }
            }
        }
        Ok(firings)
    }

    /// Matches and expands every candidate rule for the entry at `index`.
    ///
    /// Returns the frames each rule would dispatch, in rule registration
    /// order. Calls only read-only queries.
    fn evaluate(
        &self,
        entries: &[Arc<ActionEntry>],
        index: usize,
    ) -> Result<Vec<(&Rule, Frame)>> {
        let Some(entry) = entries.get(index) else {
            return Ok(Vec::new());
        };

        let mut selected = Vec::new();
        for rule in self.rules.candidates(&entry.name) {
            let frames = PatternMatcher::match_rule(&rule.when, entries, index);
            if frames.is_empty() {
                continue;
            }
            let matched = frames.len();

            let expander =
                FrameExpander::new(&self.registry, &rule.name, self.config.max_frames_per_step);
            let expanded = expander.expand(&rule.steps, frames)?;
            let before = selected.len();
            selected.extend(
                expanded
                    .into_iter()
                    .filter(|f| rule.dispatches(f))
                    .map(|f| (rule, f)),
            );

            tracing::debug!(
                rule = %rule.name,
                entry = index,
                matched,
                dispatching = selected.len() - before,
                "rule activated"
            );
        }
        Ok(selected)
    }

    /// Re-evaluates a sealed log and returns the invocations it would dispatch.
    ///
    /// Nothing is appended and no operation is called; queries are re-run.
    /// Replaying the same log against the same rules and component state
    /// yields the same plans in the same order.
    ///
    /// # Errors
    /// Returns an error under the same conditions as [`run`](Self::run).
    pub fn replay(&self, entries: &[ActionEntry]) -> Result<Vec<PlannedInvocation>> {
        let entries: Vec<Arc<ActionEntry>> = entries.iter().cloned().map(Arc::new).collect();
        let mut plans = Vec::new();
        for index in 0..entries.len() {
            for (rule, frame) in self.evaluate(&entries, index)? {
                plans.extend(ActionDispatcher::plan(rule, &frame)?);
            }
        }
        Ok(plans)
    }
}
