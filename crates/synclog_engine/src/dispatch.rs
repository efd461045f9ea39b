//! The action dispatcher.
//!
//! The only component that calls mutating operations. Each invocation's
//! outcome becomes a new entry in the frame's trace, which may in turn
//! trigger further rules.

use std::sync::Arc;

use synclog_foundation::{Fields, Result, Value};

use crate::action::{ActionEntry, Cause, EntryRef};
use crate::frame::{Arg, Frame};
use crate::log::ActionLog;
use crate::registry::Registry;
use crate::rule::Rule;

// =============================================================================
// Invocation
// =============================================================================

/// A follow-up operation call declared in a rule's `then` list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// Operation name.
    pub operation: Arc<str>,
    /// Parameter to argument mapping.
    pub args: Vec<(Arc<str>, Arg)>,
}

impl Invocation {
    /// Creates an invocation with no arguments.
    #[must_use]
    pub fn new(operation: impl Into<Arc<str>>) -> Self {
        Self {
            operation: operation.into(),
            args: Vec::new(),
        }
    }

    /// Passes an argument.
    #[must_use]
    pub fn arg(mut self, param: impl Into<Arc<str>>, arg: Arg) -> Self {
        self.args.push((param.into(), arg));
        self
    }

    /// Passes the value bound to `var`.
    #[must_use]
    pub fn var(self, param: impl Into<Arc<str>>, var: impl Into<Arc<str>>) -> Self {
        self.arg(param, Arg::Var(var.into()))
    }

    /// Passes a constant.
    #[must_use]
    pub fn literal(self, param: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.arg(param, Arg::Literal(value.into()))
    }
}

/// An invocation resolved against a frame but not executed.
///
/// Produced by replay; two plans are equal when they would call the same
/// operation with the same inputs on behalf of the same rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlannedInvocation {
    /// The rule that would dispatch.
    pub rule: Arc<str>,
    /// The operation that would be called.
    pub operation: Arc<str>,
    /// The resolved inputs.
    pub inputs: Fields,
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Executes a rule's invocations for surviving frames.
pub struct ActionDispatcher<'a> {
    registry: &'a Registry,
    log: &'a ActionLog,
}

impl<'a> ActionDispatcher<'a> {
    /// Creates a dispatcher appending to `log`.
    #[must_use]
    pub const fn new(registry: &'a Registry, log: &'a ActionLog) -> Self {
        Self { registry, log }
    }

    /// Runs every invocation of `rule` for `frame`, in declaration order.
    ///
    /// Each outcome, success or error, is appended to the frame's trace.
    /// A failed invocation does not stop the ones after it and nothing is
    /// rolled back.
    ///
    /// # Errors
    /// Returns an error if an argument is unbound or an operation is not
    /// registered.
    pub fn dispatch(&self, rule: &Rule, frame: &Frame) -> Result<Vec<EntryRef>> {
        let cause = Cause {
            rule: Arc::clone(&rule.name),
            matched: frame.matched().collect(),
        };

        let mut appended = Vec::with_capacity(rule.then.len());
        for invocation in &rule.then {
            let inputs = frame
                .resolve_all(&invocation.args)
                .map_err(|e| e.in_rule(&rule.name))?;
            let outcome = self
                .registry
                .invoke(&invocation.operation, &inputs)
                .map_err(|e| e.in_rule(&rule.name))?;

            if let Some(reason) = outcome.error_reason() {
                tracing::debug!(
                    rule = %rule.name,
                    operation = %invocation.operation,
                    reason,
                    "operation returned an error"
                );
            } else {
                tracing::debug!(rule = %rule.name, operation = %invocation.operation, "dispatched");
            }

            let entry = ActionEntry::new(Arc::clone(&invocation.operation), inputs, outcome)
                .in_trace(frame.trace())
                .caused_by(cause.clone());
            appended.push(self.log.append(entry));
        }
        Ok(appended)
    }

    /// Resolves every invocation of `rule` for `frame` without calling anything.
    ///
    /// # Errors
    /// Returns an error if an argument is unbound.
    pub fn plan(rule: &Rule, frame: &Frame) -> Result<Vec<PlannedInvocation>> {
        rule.then
            .iter()
            .map(|invocation| {
                Ok(PlannedInvocation {
                    rule: Arc::clone(&rule.name),
                    operation: Arc::clone(&invocation.operation),
                    inputs: frame
                        .resolve_all(&invocation.args)
                        .map_err(|e| e.in_rule(&rule.name))?,
                })
            })
            .collect()
    }
}
