//! Trace output formatters.
//!
//! Renders sealed traces one line per entry for logs and test failures.

use std::fmt::Write;

use synclog_engine::{ActionEntry, Outcome, SealedTrace};
use synclog_foundation::Fields;

// =============================================================================
// Trace Formatter Trait
// =============================================================================

/// Trait for formatting action entries.
pub trait TraceFormatter {
    /// Formats a single entry to a string.
    fn format(&self, entry: &ActionEntry) -> String;

    /// Formats every entry of a trace, one per line.
    fn format_trace(&self, trace: &SealedTrace) -> String {
        trace
            .entries
            .iter()
            .map(|e| self.format(e))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// =============================================================================
// Human-Readable Formatter
// =============================================================================

/// Formats entries in human-readable form.
///
/// ```text
/// [1] Documents.delete {doc: "R1"} -> error "not found" <- delete-document [0]
/// ```
#[derive(Clone, Debug, Default)]
pub struct HumanFormatter {
    /// Whether to include the rule and matched entries that caused each entry.
    pub show_causes: bool,
    /// Whether to include the trace id.
    pub show_trace: bool,
}

impl HumanFormatter {
    /// Creates a new human formatter with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to show causes.
    #[must_use]
    pub fn with_causes(mut self) -> Self {
        self.show_causes = true;
        self
    }

    /// Builder method to show the trace id.
    #[must_use]
    pub fn with_trace(mut self) -> Self {
        self.show_trace = true;
        self
    }

    fn write_fields(out: &mut String, fields: &Fields) {
        out.push('{');
        for (i, (name, value)) in fields.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{name}: {value}");
        }
        out.push('}');
    }
}

impl TraceFormatter for HumanFormatter {
    fn format(&self, entry: &ActionEntry) -> String {
        let mut out = String::new();
        if self.show_trace {
            let _ = write!(out, "{} ", entry.trace);
        }
        let _ = write!(out, "[{}] {} ", entry.index, entry.name);
        Self::write_fields(&mut out, &entry.inputs);

        match &entry.outcome {
            Outcome::Success(outputs) if outputs.is_empty() => out.push_str(" -> ok"),
            Outcome::Success(outputs) => {
                out.push_str(" -> ");
                Self::write_fields(&mut out, outputs);
            }
            Outcome::Error(reason) => {
                let _ = write!(out, " -> error {reason:?}");
            }
        }

        if self.show_causes {
            if let Some(cause) = &entry.cause {
                let _ = write!(out, " <- {} {:?}", cause.rule, cause.matched);
            }
        }
        out
    }
}
