//! Error types for synclog.
//!
//! These are engine-level failures: rule-authoring mistakes caught at
//! registration, kill switches, and I/O. Failures of orchestrated operations
//! are never `Error`s; they are ordinary error outcomes in the action log.

use std::fmt;

use thiserror::Error;

/// The main error type for synclog operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Attaches the rule name as the error's source, creating context if needed.
    #[must_use]
    pub fn in_rule(self, rule: &str) -> Self {
        let context = self.context.clone().unwrap_or_default().with_source(rule);
        self.with_context(context)
    }

    /// Creates an unknown action error.
    #[must_use]
    pub fn unknown_action(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownAction(name.into()))
    }

    /// Creates an unknown field error.
    #[must_use]
    pub fn unknown_field(action: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownField {
            action: action.into(),
            field: field.into(),
        })
    }

    /// Creates an unbound variable error.
    #[must_use]
    pub fn unbound_variable(var: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnboundVariable(var.into()))
    }

    /// Creates a rebinding error.
    #[must_use]
    pub fn rebinding(var: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rebinding(var.into()))
    }

    /// Creates a missing argument error.
    #[must_use]
    pub fn missing_argument(operation: impl Into<String>, param: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingArgument {
            operation: operation.into(),
            param: param.into(),
        })
    }

    /// Creates a semantic limit exceeded error.
    #[must_use]
    pub fn limit_exceeded(limit: SemanticLimit) -> Self {
        Self::new(ErrorKind::LimitExceeded(limit))
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// An action name was used that no signature declares.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// A field was used that the action's signature does not declare.
    #[error("unknown field {field} on action {action}")]
    UnknownField {
        /// The action whose signature was consulted.
        action: String,
        /// The undeclared field.
        field: String,
    },

    /// A query was referenced that has no registered handler.
    #[error("unknown query: {0}")]
    UnknownQuery(String),

    /// An operation was invoked that has no registered handler.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// A variable was read before any pattern or step bound it.
    #[error("unbound variable: {0}")]
    UnboundVariable(String),

    /// A step tried to bind a variable that is already bound.
    #[error("variable already bound: {0}")]
    Rebinding(String),

    /// An invocation omitted a parameter the operation requires.
    #[error("missing argument {param} for operation {operation}")]
    MissingArgument {
        /// The operation being invoked.
        operation: String,
        /// The parameter that was not supplied.
        param: String,
    },

    /// Two rules were registered under the same name.
    #[error("duplicate rule: {0}")]
    DuplicateRule(String),

    /// A declaration is structurally invalid.
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// Two signatures were registered under the same action name.
    #[error("duplicate action: {0}")]
    DuplicateAction(String),

    /// Semantic limit exceeded (kill switch triggered).
    #[error("limit exceeded: {0}")]
    LimitExceeded(SemanticLimit),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// File I/O failed.
    #[error("io error: {0}")]
    IoError(String),
}

/// Semantic limits (kill switches) that can be exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticLimit {
    /// Maximum entries appended to one trace exceeded.
    MaxEntriesPerTrace {
        /// The configured limit.
        limit: usize,
        /// The rule whose dispatch crossed the limit, if any.
        context: Option<String>,
    },
    /// Maximum frames produced by one enrichment step exceeded.
    MaxFramesPerStep {
        /// The configured limit.
        limit: usize,
        /// The rule whose step crossed the limit.
        rule: Option<String>,
    },
}

impl fmt::Display for SemanticLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxEntriesPerTrace { limit, context } => {
                write!(f, "max entries per trace ({limit}) exceeded")?;
                if let Some(ctx) = context {
                    write!(f, ": {ctx}")?;
                }
                Ok(())
            }
            Self::MaxFramesPerStep { limit, rule } => {
                write!(f, "max frames per step ({limit}) exceeded")?;
                if let Some(rule) = rule {
                    write!(f, " in rule {rule}")?;
                }
                Ok(())
            }
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Rule name or file the error came from.
    pub source: Option<String>,
    /// Nested locations, outermost last.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "in {source}")?;
        }
        for frame in &self.stack {
            write!(f, "\n  at {frame}")?;
        }
        Ok(())
    }
}
