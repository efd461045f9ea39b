//! Binding frames.
//!
//! A frame is an immutable set of variable bindings produced while matching
//! and expanding one rule. Steps return new frames; a frame is only ever
//! extended or dropped, never rebound.

use std::fmt;
use std::sync::Arc;

use synclog_foundation::{Error, Fields, Result, SlVec, Value};

use crate::action::TraceId;

// =============================================================================
// Arguments
// =============================================================================

/// Where an argument value comes from: a bound variable or a literal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Arg {
    /// Read from the frame.
    Var(Arc<str>),
    /// A constant.
    Literal(Value),
}

impl Arg {
    /// Creates a variable argument.
    #[must_use]
    pub fn var(name: impl Into<Arc<str>>) -> Self {
        Self::Var(name.into())
    }

    /// Creates a literal argument.
    #[must_use]
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Returns the variable name, if this argument reads one.
    #[must_use]
    pub fn var_name(&self) -> Option<&str> {
        match self {
            Self::Var(name) => Some(name),
            Self::Literal(_) => None,
        }
    }
}

// =============================================================================
// Frame
// =============================================================================

/// Variable bindings for one candidate firing of a rule.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Frame {
    trace: TraceId,
    bindings: Fields,
    matched: SlVec<usize>,
    halted: bool,
}

impl Frame {
    /// Creates an empty frame in a trace.
    #[must_use]
    pub fn new(trace: TraceId) -> Self {
        Self {
            trace,
            bindings: Fields::new(),
            matched: SlVec::new(),
            halted: false,
        }
    }

    /// The trace this frame belongs to.
    #[must_use]
    pub const fn trace(&self) -> TraceId {
        self.trace
    }

    /// All bindings, in variable-name order.
    #[must_use]
    pub const fn bindings(&self) -> &Fields {
        &self.bindings
    }

    /// Indices of the entries matched by the rule's patterns, in pattern order.
    pub fn matched(&self) -> impl Iterator<Item = usize> + '_ {
        self.matched.iter().copied()
    }

    /// Returns true if the frame took a precondition-error branch.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Returns the value bound to `var`.
    #[must_use]
    pub fn get(&self, var: &str) -> Option<&Value> {
        self.bindings.get(var)
    }

    /// Returns the value bound to `var`, or an unbound-variable error.
    ///
    /// # Errors
    /// Returns an error if `var` is not bound.
    pub fn require(&self, var: &str) -> Result<&Value> {
        self.get(var).ok_or_else(|| Error::unbound_variable(var))
    }

    /// Returns a new frame with `var` bound to `value`.
    ///
    /// Binding a variable to the value it already holds is a no-op.
    ///
    /// # Errors
    /// Returns a rebinding error if `var` holds a different value.
    pub fn bind(&self, var: &str, value: Value) -> Result<Self> {
        match self.bindings.get(var) {
            Some(existing) if *existing == value => Ok(self.clone()),
            Some(_) => Err(Error::rebinding(var)),
            None => Ok(Self {
                bindings: self.bindings.insert(Arc::from(var), value),
                ..self.clone()
            }),
        }
    }

    /// Unifies `var` with `value`: binds it if free, otherwise requires equality.
    ///
    /// Returns `None` when the existing binding disagrees.
    #[must_use]
    pub fn unify(&self, var: &str, value: &Value) -> Option<Self> {
        self.bind(var, value.clone()).ok()
    }

    /// Returns a halted copy of this frame carrying `value` under `var`.
    ///
    /// # Errors
    /// Returns a rebinding error if `var` holds a different value.
    pub fn halt(&self, var: &str, value: Value) -> Result<Self> {
        let mut halted = self.bind(var, value)?;
        halted.halted = true;
        Ok(halted)
    }

    /// Records a matched entry index.
    #[must_use]
    pub fn with_matched(&self, index: usize) -> Self {
        Self {
            matched: self.matched.push_back(index),
            ..self.clone()
        }
    }

    /// Resolves one argument against this frame.
    ///
    /// # Errors
    /// Returns an error if the argument reads an unbound variable.
    pub fn resolve(&self, arg: &Arg) -> Result<Value> {
        match arg {
            Arg::Var(var) => self.require(var).cloned(),
            Arg::Literal(value) => Ok(value.clone()),
        }
    }

    /// Resolves a parameter-to-argument mapping into a record.
    ///
    /// # Errors
    /// Returns an error if any argument reads an unbound variable.
    pub fn resolve_all(&self, args: &[(Arc<str>, Arg)]) -> Result<Fields> {
        args.iter().try_fold(Fields::new(), |record, (param, arg)| {
            Ok(record.insert(Arc::clone(param), self.resolve(arg)?))
        })
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Frame");
        s.field("trace", &self.trace)
            .field("bindings", &self.bindings)
            .field("matched", &self.matched);
        if self.halted {
            s.field("halted", &true);
        }
        s.finish()
    }
}
