//! The frame expander.
//!
//! Runs a rule's enrichment steps left to right over the frames produced by
//! the matcher. Query steps fan out, filter steps prune, attach steps stage
//! values. A frame dropped at one step never reaches the next.
//!
//! A step may carry a [`Halt`]. Instead of dropping the frame, it is then
//! marked halted with the staged error attached. Halted frames skip every
//! remaining step and are only dispatched by a rule's halted branch.

use std::fmt;
use std::sync::Arc;

use synclog_foundation::{Error, Result, SemanticLimit, Value};

use crate::authorize::Relationship;
use crate::frame::{Arg, Frame};
use crate::registry::Registry;

/// Boolean test over a frame's bindings.
pub type Predicate = Arc<dyn Fn(&Frame) -> bool + Send + Sync>;

/// Value computed from a frame's bindings.
pub type Compute = Arc<dyn Fn(&Frame) -> Value + Send + Sync>;

// =============================================================================
// Steps
// =============================================================================

/// Staged error for a frame that fails a step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Halt {
    /// Variable the error value is bound to.
    pub var: Arc<str>,
    /// The error value.
    pub value: Value,
}

impl Halt {
    /// Creates a halt binding `value` under `var`.
    #[must_use]
    pub fn new(var: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        Self {
            var: var.into(),
            value: value.into(),
        }
    }
}

/// Calls a read-only query and binds fields of each row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryStep {
    /// Query name.
    pub query: Arc<str>,
    /// Parameter to argument mapping.
    pub args: Vec<(Arc<str>, Arg)>,
    /// Row field to variable mapping.
    pub outputs: Vec<(Arc<str>, Arc<str>)>,
    /// Halt instead of dropping when no row survives.
    pub on_empty: Option<Halt>,
}

impl QueryStep {
    /// Creates a query step with no arguments or bindings.
    #[must_use]
    pub fn new(query: impl Into<Arc<str>>) -> Self {
        Self {
            query: query.into(),
            args: Vec::new(),
            outputs: Vec::new(),
            on_empty: None,
        }
    }

    /// Passes `arg` as the query parameter `param`.
    #[must_use]
    pub fn arg(mut self, param: impl Into<Arc<str>>, arg: Arg) -> Self {
        self.args.push((param.into(), arg));
        self
    }

    /// Binds the row field `field` to `var`.
    #[must_use]
    pub fn bind(mut self, field: impl Into<Arc<str>>, var: impl Into<Arc<str>>) -> Self {
        self.outputs.push((field.into(), var.into()));
        self
    }

    /// Halts the frame with `value` under `var` when no row survives.
    #[must_use]
    pub fn or_halt(mut self, var: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.on_empty = Some(Halt::new(var, value));
        self
    }
}

/// Keeps frames whose predicate holds.
#[derive(Clone)]
pub struct FilterStep {
    /// Human-readable description, used in logs and debug output.
    pub label: Arc<str>,
    /// Variables the predicate reads.
    pub reads: Vec<Arc<str>>,
    /// The test.
    pub predicate: Predicate,
    /// Halt instead of dropping rejected frames.
    pub on_reject: Option<Halt>,
}

impl FilterStep {
    /// Creates a filter from a predicate over the declared variables.
    #[must_use]
    pub fn new<I, S>(
        label: impl Into<Arc<str>>,
        reads: I,
        predicate: impl Fn(&Frame) -> bool + Send + Sync + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self {
            label: label.into(),
            reads: reads.into_iter().map(Into::into).collect(),
            predicate: Arc::new(predicate),
            on_reject: None,
        }
    }

    /// Creates a filter asserting a relationship between bound values.
    #[must_use]
    pub fn relationship(relationship: Relationship) -> Self {
        let label = relationship.to_string();
        let reads: Vec<Arc<str>> = relationship.reads().into_iter().map(Arc::from).collect();
        Self {
            label: label.into(),
            reads,
            predicate: Arc::new(move |frame: &Frame| relationship.holds(frame)),
            on_reject: None,
        }
    }

    /// Halts rejected frames with `value` under `var`.
    #[must_use]
    pub fn or_halt(mut self, var: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        self.on_reject = Some(Halt::new(var, value));
        self
    }
}

impl fmt::Debug for FilterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterStep")
            .field("label", &self.label)
            .field("reads", &self.reads)
            .field("on_reject", &self.on_reject)
            .finish_non_exhaustive()
    }
}

/// The value an attach step adds.
#[derive(Clone)]
pub enum AttachValue {
    /// A constant.
    Literal(Value),
    /// Derived from bound variables.
    Computed {
        /// Variables the computation reads.
        reads: Vec<Arc<str>>,
        /// The computation.
        compute: Compute,
    },
}

impl fmt::Debug for AttachValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Computed { reads, .. } => f
                .debug_struct("Computed")
                .field("reads", reads)
                .finish_non_exhaustive(),
        }
    }
}

/// Adds a value to every live frame without consulting external state.
#[derive(Clone, Debug)]
pub struct AttachStep {
    /// Variable to bind.
    pub var: Arc<str>,
    /// What to bind it to.
    pub value: AttachValue,
}

impl AttachStep {
    /// Attaches a constant.
    #[must_use]
    pub fn literal(var: impl Into<Arc<str>>, value: impl Into<Value>) -> Self {
        Self {
            var: var.into(),
            value: AttachValue::Literal(value.into()),
        }
    }

    /// Attaches a value computed from the listed variables.
    #[must_use]
    pub fn computed<I, S>(
        var: impl Into<Arc<str>>,
        reads: I,
        compute: impl Fn(&Frame) -> Value + Send + Sync + 'static,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self {
            var: var.into(),
            value: AttachValue::Computed {
                reads: reads.into_iter().map(Into::into).collect(),
                compute: Arc::new(compute),
            },
        }
    }
}

/// One enrichment step of a rule.
#[derive(Clone, Debug)]
pub enum EnrichmentStep {
    /// External read-only lookup.
    Query(QueryStep),
    /// Predicate over bindings.
    Filter(FilterStep),
    /// Literal or computed value.
    Attach(AttachStep),
}

impl EnrichmentStep {
    /// Variables the step reads.
    #[must_use]
    pub fn reads(&self) -> Vec<&str> {
        match self {
            Self::Query(q) => q.args.iter().filter_map(|(_, a)| a.var_name()).collect(),
            Self::Filter(f) => f.reads.iter().map(|v| &**v).collect(),
            Self::Attach(a) => match &a.value {
                AttachValue::Literal(_) => Vec::new(),
                AttachValue::Computed { reads, .. } => reads.iter().map(|v| &**v).collect(),
            },
        }
    }

    /// Variables the step binds on live frames.
    #[must_use]
    pub fn binds(&self) -> Vec<&str> {
        match self {
            Self::Query(q) => q.outputs.iter().map(|(_, v)| &**v).collect(),
            Self::Filter(_) => Vec::new(),
            Self::Attach(a) => vec![&*a.var],
        }
    }

    /// The halt this step applies, if any.
    #[must_use]
    pub fn halt(&self) -> Option<&Halt> {
        match self {
            Self::Query(q) => q.on_empty.as_ref(),
            Self::Filter(f) => f.on_reject.as_ref(),
            Self::Attach(_) => None,
        }
    }
}

impl From<QueryStep> for EnrichmentStep {
    fn from(step: QueryStep) -> Self {
        Self::Query(step)
    }
}

impl From<FilterStep> for EnrichmentStep {
    fn from(step: FilterStep) -> Self {
        Self::Filter(step)
    }
}

impl From<AttachStep> for EnrichmentStep {
    fn from(step: AttachStep) -> Self {
        Self::Attach(step)
    }
}

// =============================================================================
// Expander
// =============================================================================

/// Executes enrichment steps for one rule.
pub struct FrameExpander<'a> {
    registry: &'a Registry,
    rule: &'a str,
    max_frames: usize,
}

impl<'a> FrameExpander<'a> {
    /// Creates an expander for `rule`, bounding each step to `max_frames`.
    #[must_use]
    pub const fn new(registry: &'a Registry, rule: &'a str, max_frames: usize) -> Self {
        Self {
            registry,
            rule,
            max_frames,
        }
    }

    /// Runs `steps` in order over `frames`.
    ///
    /// Returns live and halted frames together; callers select by branch.
    ///
    /// # Errors
    /// Returns an error if a query is unknown, an argument is unbound, a step
    /// rebinds a variable, or a step exceeds the frame limit.
    pub fn expand(&self, steps: &[EnrichmentStep], mut frames: Vec<Frame>) -> Result<Vec<Frame>> {
        for (position, step) in steps.iter().enumerate() {
            if frames.iter().all(Frame::is_halted) {
                break;
            }
            let before = frames.len();
            frames = self
                .apply(step, frames)
                .map_err(|e| e.in_rule(self.rule))?;
            tracing::trace!(
                rule = self.rule,
                step = position,
                before,
                after = frames.len(),
                "step applied"
            );
        }
        Ok(frames)
    }

    fn apply(&self, step: &EnrichmentStep, frames: Vec<Frame>) -> Result<Vec<Frame>> {
        let mut out = Vec::with_capacity(frames.len());
        for frame in frames {
            if frame.is_halted() {
                out.push(frame);
                continue;
            }
            match step {
                EnrichmentStep::Query(q) => self.run_query(q, &frame, &mut out)?,
                EnrichmentStep::Filter(f) => {
                    if (f.predicate)(&frame) {
                        out.push(frame);
                    } else if let Some(halt) = &f.on_reject {
                        out.push(frame.halt(&halt.var, halt.value.clone())?);
                    }
                }
                EnrichmentStep::Attach(a) => {
                    let value = match &a.value {
                        AttachValue::Literal(value) => value.clone(),
                        AttachValue::Computed { compute, .. } => compute(&frame),
                    };
                    out.push(frame.bind(&a.var, value)?);
                }
            }
            self.check_limit(out.len())?;
        }
        Ok(out)
    }

    /// Fans one frame out over the rows of a query.
    ///
    /// Rows lacking a requested field produce nothing. An error row is seen
    /// as the single field `error`.
    fn run_query(&self, step: &QueryStep, frame: &Frame, out: &mut Vec<Frame>) -> Result<()> {
        let inputs = frame.resolve_all(&step.args)?;
        let rows = self.registry.run_query(&step.query, &inputs)?;

        let produced_before = out.len();
        'rows: for outcome in &rows {
            let row = outcome.as_row();
            let mut extended = frame.clone();
            for (field, var) in &step.outputs {
                let Some(value) = row.get(&**field) else {
                    continue 'rows;
                };
                extended = extended.bind(var, value.clone())?;
            }
            out.push(extended);
            self.check_limit(out.len())?;
        }

        if out.len() == produced_before {
            if let Some(halt) = &step.on_empty {
                out.push(frame.halt(&halt.var, halt.value.clone())?);
            }
        }
        Ok(())
    }

    fn check_limit(&self, count: usize) -> Result<()> {
        if count > self.max_frames {
            tracing::warn!(rule = self.rule, limit = self.max_frames, "frame limit exceeded");
            return Err(Error::limit_exceeded(SemanticLimit::MaxFramesPerStep {
                limit: self.max_frames,
                rule: Some(self.rule.to_string()),
            }));
        }
        Ok(())
    }
}
