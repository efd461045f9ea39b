//! Action patterns and the pattern matcher.
//!
//! A rule's `when` clause is a list of [`ActionPattern`]s. Matching a single
//! pattern is unification against one entry. Matching several patterns is a
//! relational join over the entries of one trace, performed by
//! [`PatternMatcher::match_rule`].

use std::sync::Arc;

use synclog_foundation::Value;

use crate::action::{ActionEntry, Outcome};
use crate::frame::Frame;

// =============================================================================
// Pattern Types
// =============================================================================

/// What a pattern field binds or requires.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    /// Bind to a variable, or agree with its existing binding.
    Var(Arc<str>),
    /// Require exact equality.
    Literal(Value),
    /// Require presence; bind nothing.
    Wildcard,
}

impl Term {
    /// Creates a variable term.
    #[must_use]
    pub fn var(name: impl Into<Arc<str>>) -> Self {
        Self::Var(name.into())
    }

    /// Creates a literal term.
    #[must_use]
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Returns the variable this term binds, if any.
    #[must_use]
    pub fn var_name(&self) -> Option<&str> {
        match self {
            Self::Var(name) => Some(name),
            _ => None,
        }
    }
}

/// The expected shape of an entry's outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputPattern {
    /// Matches successful entries; each listed field must unify.
    Success(Vec<(Arc<str>, Term)>),
    /// Matches failed entries; the term unifies with the error reason.
    Failure(Term),
    /// Matches either shape and binds nothing.
    Any,
}

/// A pattern over one action entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionPattern {
    /// The action name the entry must carry.
    pub action: Arc<str>,
    /// Input field constraints.
    pub inputs: Vec<(Arc<str>, Term)>,
    /// Outcome constraint.
    pub outputs: OutputPattern,
}

impl ActionPattern {
    /// Creates a pattern that matches any entry of `action`.
    #[must_use]
    pub fn new(action: impl Into<Arc<str>>) -> Self {
        Self {
            action: action.into(),
            inputs: Vec::new(),
            outputs: OutputPattern::Any,
        }
    }

    /// Adds an input constraint.
    #[must_use]
    pub fn input(mut self, field: impl Into<Arc<str>>, term: Term) -> Self {
        self.inputs.push((field.into(), term));
        self
    }

    /// Requires success and adds an output constraint.
    #[must_use]
    pub fn output(mut self, field: impl Into<Arc<str>>, term: Term) -> Self {
        let field = field.into();
        match &mut self.outputs {
            OutputPattern::Success(fields) => fields.push((field, term)),
            _ => self.outputs = OutputPattern::Success(vec![(field, term)]),
        }
        self
    }

    /// Requires success without constraining any output field.
    #[must_use]
    pub fn succeeds(mut self) -> Self {
        if !matches!(self.outputs, OutputPattern::Success(_)) {
            self.outputs = OutputPattern::Success(Vec::new());
        }
        self
    }

    /// Requires failure; the error reason unifies with `term`.
    #[must_use]
    pub fn fails(mut self, term: Term) -> Self {
        self.outputs = OutputPattern::Failure(term);
        self
    }

    /// All variables this pattern binds, in declaration order.
    #[must_use]
    pub fn variables(&self) -> Vec<&str> {
        let mut vars: Vec<&str> = self.inputs.iter().filter_map(|(_, t)| t.var_name()).collect();
        match &self.outputs {
            OutputPattern::Success(fields) => {
                vars.extend(fields.iter().filter_map(|(_, t)| t.var_name()));
            }
            OutputPattern::Failure(term) => vars.extend(term.var_name()),
            OutputPattern::Any => {}
        }
        vars
    }
}

// =============================================================================
// Pattern Matching
// =============================================================================

/// Matches patterns against entries of the action log.
pub struct PatternMatcher;

impl PatternMatcher {
    /// Unifies one pattern with one entry, extending `frame`.
    ///
    /// Literals require equality, variables bind or must agree, wildcards
    /// require presence, and absent fields mean no match.
    #[must_use]
    pub fn unify(pattern: &ActionPattern, entry: &ActionEntry, frame: &Frame) -> Option<Frame> {
        if pattern.action != entry.name {
            return None;
        }

        let mut frame = frame.clone();
        for (field, term) in &pattern.inputs {
            frame = Self::unify_term(term, entry.inputs.get(&**field), &frame)?;
        }

        match (&pattern.outputs, &entry.outcome) {
            (OutputPattern::Any, _) => Some(frame),
            (OutputPattern::Success(fields), Outcome::Success(outputs)) => {
                for (field, term) in fields {
                    frame = Self::unify_term(term, outputs.get(&**field), &frame)?;
                }
                Some(frame)
            }
            (OutputPattern::Failure(term), Outcome::Error(reason)) => {
                Self::unify_term(term, Some(&Value::String(Arc::clone(reason))), &frame)
            }
            // Success patterns never see error entries and vice versa.
            _ => None,
        }
    }

    fn unify_term(term: &Term, value: Option<&Value>, frame: &Frame) -> Option<Frame> {
        let value = value?;
        match term {
            Term::Wildcard => Some(frame.clone()),
            Term::Literal(expected) => (expected == value).then(|| frame.clone()),
            Term::Var(var) => frame.unify(var, value),
        }
    }

    /// Finds every frame for a rule triggered by the entry at `new_index`.
    ///
    /// This is the join stage. The new entry must take part in every
    /// combination; the other patterns draw from strictly older entries of
    /// the same trace, and no entry fills two positions. A combination is
    /// therefore produced exactly once, when its newest entry is processed.
    /// Variables shared between patterns must agree.
    ///
    /// Frames come out ordered by the position the new entry fills, then by
    /// the append order of the other entries.
    #[must_use]
    pub fn match_rule(
        patterns: &[ActionPattern],
        entries: &[Arc<ActionEntry>],
        new_index: usize,
    ) -> Vec<Frame> {
        let Some(new_entry) = entries.get(new_index) else {
            return Vec::new();
        };
        let older = &entries[..new_index];
        let mut results = Vec::new();

        for (position, pattern) in patterns.iter().enumerate() {
            let Some(seed) = Self::unify(pattern, new_entry, &Frame::new(new_entry.trace)) else {
                continue;
            };

            let mut partial = vec![(seed, Self::assignment(patterns.len(), position, new_index))];
            for (other, other_pattern) in patterns.iter().enumerate() {
                if other == position {
                    continue;
                }
                partial = Self::join_step(&partial, other, other_pattern, older);
                if partial.is_empty() {
                    break;
                }
            }

            results.extend(partial.into_iter().map(|(frame, assigned)| {
                assigned
                    .into_iter()
                    .flatten()
                    .fold(frame, |f, index| f.with_matched(index))
            }));
        }

        results
    }

    fn assignment(len: usize, position: usize, index: usize) -> Vec<Option<usize>> {
        let mut assigned = vec![None; len];
        assigned[position] = Some(index);
        assigned
    }

    /// Extends each partial combination with every older entry matching `pattern`.
    fn join_step(
        partial: &[(Frame, Vec<Option<usize>>)],
        position: usize,
        pattern: &ActionPattern,
        older: &[Arc<ActionEntry>],
    ) -> Vec<(Frame, Vec<Option<usize>>)> {
        let mut next = Vec::new();
        for (frame, assigned) in partial {
            for entry in older {
                if assigned.contains(&Some(entry.index)) {
                    continue;
                }
                if let Some(extended) = Self::unify(pattern, entry, frame) {
                    let mut assigned = assigned.clone();
                    assigned[position] = Some(entry.index);
                    next.push((extended, assigned));
                }
            }
        }
        next
    }
}
