//! Action entries: the immutable records the log is made of.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use synclog_foundation::{Fields, Value};

// =============================================================================
// Trace Identity
// =============================================================================

/// Opaque identifier of one trace (all entries descending from one request).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceId(u64);

impl TraceId {
    /// Creates a trace id from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trace-{}", self.0)
    }
}

/// Reference to an appended entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryRef {
    /// The trace the entry belongs to.
    pub trace: TraceId,
    /// Position in the trace, in append order.
    pub index: usize,
}

// =============================================================================
// Outcome
// =============================================================================

/// The result of an operation: named success fields, or a single error.
///
/// Success and failure are symmetric values; rules react to either shape
/// by declaring a matching pattern.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Outcome {
    /// Named output fields.
    Success(Fields),
    /// A failure reason.
    Error(Arc<str>),
}

impl Outcome {
    /// Creates a success outcome with the given fields.
    #[must_use]
    pub fn success(fields: Fields) -> Self {
        Self::Success(fields)
    }

    /// Creates a success outcome with no fields.
    #[must_use]
    pub fn ok() -> Self {
        Self::Success(Fields::new())
    }

    /// Creates an error outcome.
    #[must_use]
    pub fn error(reason: impl Into<Arc<str>>) -> Self {
        Self::Error(reason.into())
    }

    /// Returns true if this is an error outcome.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns the error reason, if any.
    #[must_use]
    pub fn error_reason(&self) -> Option<&str> {
        match self {
            Self::Error(reason) => Some(reason),
            Self::Success(_) => None,
        }
    }

    /// Returns the success fields, if any.
    #[must_use]
    pub const fn outputs(&self) -> Option<&Fields> {
        match self {
            Self::Success(fields) => Some(fields),
            Self::Error(_) => None,
        }
    }

    /// Views this outcome as a row of named fields.
    ///
    /// An error outcome becomes a row with the single field `error`.
    #[must_use]
    pub fn as_row(&self) -> Fields {
        match self {
            Self::Success(fields) => fields.clone(),
            Self::Error(reason) => {
                Fields::new().insert(Arc::from("error"), Value::String(Arc::clone(reason)))
            }
        }
    }
}

// =============================================================================
// Action Entry
// =============================================================================

/// Why an entry was appended: which rule fired, over which matched entries.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cause {
    /// The rule whose dispatch produced the entry.
    pub rule: Arc<str>,
    /// Indices of the entries the rule's patterns matched, in pattern order.
    pub matched: Vec<usize>,
}

/// One executed operation: its name, resolved inputs, and outcome.
///
/// Immutable once appended to the [`ActionLog`](crate::ActionLog).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ActionEntry {
    /// Operation name, e.g. `Documents.delete`.
    pub name: Arc<str>,
    /// Resolved input values.
    pub inputs: Fields,
    /// Success fields or an error.
    pub outcome: Outcome,
    /// The trace this entry belongs to.
    pub trace: TraceId,
    /// Position in the trace; assigned on append.
    pub index: usize,
    /// Provenance; `None` for seed entries.
    pub cause: Option<Cause>,
}

impl ActionEntry {
    /// Creates an entry not yet bound to a trace.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, inputs: Fields, outcome: Outcome) -> Self {
        Self {
            name: name.into(),
            inputs,
            outcome,
            trace: TraceId::new(0),
            index: 0,
            cause: None,
        }
    }

    /// Places the entry in a trace.
    #[must_use]
    pub fn in_trace(mut self, trace: TraceId) -> Self {
        self.trace = trace;
        self
    }

    /// Records the rule and matched entries that produced this entry.
    #[must_use]
    pub fn caused_by(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Returns an input value by field name.
    #[must_use]
    pub fn input(&self, field: &str) -> Option<&Value> {
        self.inputs.get(field)
    }

    /// Returns a success output value by field name.
    #[must_use]
    pub fn output(&self, field: &str) -> Option<&Value> {
        self.outcome.outputs().and_then(|o| o.get(field))
    }

    /// Returns true if the entry records a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.outcome.is_error()
    }

    /// Returns true if the entry was seeded from outside the engine.
    #[must_use]
    pub const fn is_seed(&self) -> bool {
        self.cause.is_none()
    }

    /// Returns a reference to this entry.
    #[must_use]
    pub const fn entry_ref(&self) -> EntryRef {
        EntryRef {
            trace: self.trace,
            index: self.index,
        }
    }
}
