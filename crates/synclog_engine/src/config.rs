//! Engine configuration.

use std::sync::Arc;

/// Configuration for a [`SyncEngine`](crate::SyncEngine).
///
/// Controls kill switches, the terminal response action, and trace retention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum entries one trace may hold before it is aborted.
    pub max_entries_per_trace: usize,

    /// Maximum frames a single enrichment step may produce.
    pub max_frames_per_step: usize,

    /// Action whose entries are the trace's replies.
    pub terminal_action: Arc<str>,

    /// Keep closed traces readable in the action log.
    pub retain_closed_traces: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_entries_per_trace: 10_000,
            max_frames_per_step: 10_000,
            terminal_action: Arc::from("Requesting.respond"),
            retain_closed_traces: false,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration for tests: small limits, traces retained.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            max_entries_per_trace: 256,
            max_frames_per_step: 256,
            retain_closed_traces: true,
            ..Self::default()
        }
    }

    /// Builder method to set the per-trace entry limit.
    #[must_use]
    pub fn with_max_entries_per_trace(mut self, limit: usize) -> Self {
        self.max_entries_per_trace = limit;
        self
    }

    /// Builder method to set the per-step frame limit.
    #[must_use]
    pub fn with_max_frames_per_step(mut self, limit: usize) -> Self {
        self.max_frames_per_step = limit;
        self
    }

    /// Builder method to set the terminal action.
    #[must_use]
    pub fn with_terminal_action(mut self, action: impl Into<Arc<str>>) -> Self {
        self.terminal_action = action.into();
        self
    }

    /// Builder method to enable/disable retention of closed traces.
    #[must_use]
    pub fn with_retain_closed_traces(mut self, retain: bool) -> Self {
        self.retain_closed_traces = retain;
        self
    }
}
