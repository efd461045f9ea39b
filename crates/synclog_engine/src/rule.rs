//! Rules and the immutable rule set.
//!
//! A rule is `when` patterns, ordered enrichment steps, and `then`
//! invocations. Rules are validated once by [`RuleCompiler`] and then held in
//! a [`RuleSet`] that the engine shares read-only across traces.

pub mod compiler;

pub use compiler::RuleCompiler;

use std::collections::HashMap;
use std::sync::Arc;

use synclog_foundation::{Error, ErrorKind, Result};

use crate::dispatch::Invocation;
use crate::expand::{AttachStep, EnrichmentStep, FilterStep, QueryStep};
use crate::frame::Frame;
use crate::pattern::ActionPattern;
use crate::registry::Registry;

// =============================================================================
// Rule
// =============================================================================

/// Which frames a rule dispatches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Branch {
    /// Frames that passed every step.
    #[default]
    Main,
    /// Frames halted by a precondition failure.
    Halted,
}

/// A declarative synchronization rule.
#[derive(Clone, Debug)]
pub struct Rule {
    /// Unique rule name.
    pub name: Arc<str>,
    /// Patterns that must all match within one trace.
    pub when: Vec<ActionPattern>,
    /// Enrichment steps, in order.
    pub steps: Vec<EnrichmentStep>,
    /// Follow-up invocations, in order.
    pub then: Vec<Invocation>,
    /// Which frames are dispatched.
    pub branch: Branch,
}

impl Rule {
    /// Creates an empty rule.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            when: Vec::new(),
            steps: Vec::new(),
            then: Vec::new(),
            branch: Branch::Main,
        }
    }

    /// Adds a `when` pattern.
    #[must_use]
    pub fn when(mut self, pattern: ActionPattern) -> Self {
        self.when.push(pattern);
        self
    }

    /// Adds an enrichment step.
    #[must_use]
    pub fn step(mut self, step: impl Into<EnrichmentStep>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Adds a query step.
    #[must_use]
    pub fn query(self, step: QueryStep) -> Self {
        self.step(step)
    }

    /// Adds a filter step.
    #[must_use]
    pub fn filter(self, step: FilterStep) -> Self {
        self.step(step)
    }

    /// Adds an attach step.
    #[must_use]
    pub fn attach(self, step: AttachStep) -> Self {
        self.step(step)
    }

    /// Adds a follow-up invocation.
    #[must_use]
    pub fn then(mut self, invocation: Invocation) -> Self {
        self.then.push(invocation);
        self
    }

    /// Makes this rule dispatch halted frames instead of live ones.
    #[must_use]
    pub fn halted_branch(mut self) -> Self {
        self.branch = Branch::Halted;
        self
    }

    /// Returns true if this rule dispatches `frame`.
    #[must_use]
    pub const fn dispatches(&self, frame: &Frame) -> bool {
        match self.branch {
            Branch::Main => !frame.is_halted(),
            Branch::Halted => frame.is_halted(),
        }
    }

    /// Action names that can trigger this rule.
    pub fn triggers(&self) -> impl Iterator<Item = &str> {
        self.when.iter().map(|p| &*p.action)
    }
}

// =============================================================================
// Rule Set
// =============================================================================

/// Validated, immutable rules indexed by triggering action.
///
/// Cheap to clone; all clones share the same rules.
#[derive(Clone, Debug, Default)]
pub struct RuleSet {
    rules: Arc<[Rule]>,
    by_action: Arc<HashMap<Arc<str>, Vec<usize>>>,
}

impl RuleSet {
    /// Validates `rules` against `registry` and builds the set.
    ///
    /// # Errors
    /// Returns the first authoring error found, with the rule name as context.
    pub fn compile(rules: impl IntoIterator<Item = Rule>, registry: &Registry) -> Result<Self> {
        let rules: Vec<Rule> = rules.into_iter().collect();
        let mut by_action: HashMap<Arc<str>, Vec<usize>> = HashMap::new();
        let mut names = HashMap::new();

        for (position, rule) in rules.iter().enumerate() {
            if names.insert(Arc::clone(&rule.name), position).is_some() {
                return Err(Error::new(ErrorKind::DuplicateRule(rule.name.to_string())));
            }
            RuleCompiler::check(rule, registry)?;

            for action in rule.triggers() {
                let indices = by_action.entry(Arc::from(action)).or_default();
                if indices.last() != Some(&position) {
                    indices.push(position);
                }
            }
        }

        tracing::debug!(rules = rules.len(), actions = by_action.len(), "rule set compiled");
        Ok(Self {
            rules: rules.into(),
            by_action: Arc::new(by_action),
        })
    }

    /// All rules in registration order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Looks up a rule by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| &*r.name == name)
    }

    /// Rules with a pattern on `action`, in registration order.
    pub fn candidates<'a>(&'a self, action: &str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.by_action
            .get(action)
            .into_iter()
            .flatten()
            .map(|&i| &self.rules[i])
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
