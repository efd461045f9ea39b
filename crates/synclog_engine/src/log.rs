//! The append-only action log.
//!
//! Entries are grouped per trace. Each trace owns its own monotonic entry
//! list, so appends to different traces never contend on the same lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::action::{ActionEntry, EntryRef, TraceId};

// =============================================================================
// Sealed Trace
// =============================================================================

/// A completed trace: every entry in append order.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SealedTrace {
    /// The trace id.
    pub trace: TraceId,
    /// Entries, oldest first.
    pub entries: Vec<ActionEntry>,
}

impl SealedTrace {
    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the trace has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entries with the given action name, in append order.
    pub fn entries_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ActionEntry> {
        self.entries.iter().filter(move |e| &*e.name == name)
    }
}

// =============================================================================
// Action Log
// =============================================================================

type TraceEntries = Arc<RwLock<Vec<Arc<ActionEntry>>>>;

/// Append-only record of every executed operation, grouped by trace.
///
/// Safe for concurrent appends and reads. Entries are never edited or
/// removed while their trace is open.
#[derive(Debug)]
pub struct ActionLog {
    next_trace: AtomicU64,
    traces: RwLock<HashMap<TraceId, TraceEntries>>,
    retain_closed: bool,
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionLog {
    /// Creates an empty log that discards traces once they are closed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_trace: AtomicU64::new(1),
            traces: RwLock::new(HashMap::new()),
            retain_closed: false,
        }
    }

    /// Sets whether closed traces stay readable in the log.
    #[must_use]
    pub fn with_retention(mut self, retain_closed: bool) -> Self {
        self.retain_closed = retain_closed;
        self
    }

    /// Allocates a fresh trace.
    pub fn open_trace(&self) -> TraceId {
        let trace = TraceId::new(self.next_trace.fetch_add(1, Ordering::Relaxed));
        self.traces
            .write()
            .insert(trace, Arc::new(RwLock::new(Vec::new())));
        trace
    }

    fn trace_entries(&self, trace: TraceId) -> Option<TraceEntries> {
        self.traces.read().get(&trace).cloned()
    }

    /// Appends an entry to its trace and returns a reference to it.
    ///
    /// The entry's index is assigned here. Appending to a trace that was
    /// never opened opens it.
    pub fn append(&self, mut entry: ActionEntry) -> EntryRef {
        let trace = entry.trace;
        let list = match self.trace_entries(trace) {
            Some(list) => list,
            None => Arc::clone(
                self.traces
                    .write()
                    .entry(trace)
                    .or_insert_with(|| Arc::new(RwLock::new(Vec::new()))),
            ),
        };

        let mut entries = list.write();
        entry.index = entries.len();
        let entry_ref = entry.entry_ref();
        tracing::trace!(
            trace = %trace,
            index = entry.index,
            action = %entry.name,
            error = entry.outcome.error_reason(),
            "entry appended"
        );
        entries.push(Arc::new(entry));
        entry_ref
    }

    /// Returns the entries of a trace in append order.
    #[must_use]
    pub fn entries_in_trace(&self, trace: TraceId) -> Vec<Arc<ActionEntry>> {
        self.trace_entries(trace)
            .map(|list| list.read().clone())
            .unwrap_or_default()
    }

    /// Returns a single entry.
    #[must_use]
    pub fn entry(&self, entry_ref: EntryRef) -> Option<Arc<ActionEntry>> {
        self.trace_entries(entry_ref.trace)
            .and_then(|list| list.read().get(entry_ref.index).cloned())
    }

    /// Returns the number of entries in a trace.
    #[must_use]
    pub fn trace_len(&self, trace: TraceId) -> usize {
        self.trace_entries(trace).map_or(0, |list| list.read().len())
    }

    /// Returns the number of traces currently held.
    #[must_use]
    pub fn trace_count(&self) -> usize {
        self.traces.read().len()
    }

    /// Closes a trace and returns its entries.
    ///
    /// Unless retention is enabled, the trace is discarded from the log.
    pub fn close_trace(&self, trace: TraceId) -> SealedTrace {
        let list = if self.retain_closed {
            self.trace_entries(trace)
        } else {
            self.traces.write().remove(&trace)
        };
        let entries = list
            .map(|list| {
                list.read()
                    .iter()
                    .map(|e| ActionEntry::clone(e))
                    .collect()
            })
            .unwrap_or_default();
        SealedTrace { trace, entries }
    }
}
