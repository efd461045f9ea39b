//! In-memory transport boundary.
//!
//! Turns an inbound call into a trace's seed entry, `Requesting.request`,
//! and collects the reply from the terminal `Requesting.respond` operation.
//! Credentials arrive only as opaque input values; the transport never adds
//! identity fields of its own.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use synclog_engine::{ActionEntry, Outcome, Registry, Signature, SyncEngine, TraceReport};
use synclog_foundation::{Fields, Result, Value, fields};

/// Name of the seed action.
pub const REQUEST: &str = "Requesting.request";

/// Name of the terminal response operation.
pub const RESPOND: &str = "Requesting.respond";

/// The reply a caller receives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Success fields, without the request id.
    Ok(Fields),
    /// The error the rules responded with.
    Error(Arc<str>),
    /// The request was cancelled; effects already dispatched still happened.
    Suppressed,
    /// No rule responded.
    Missing,
}

impl Reply {
    /// Returns true for a success reply.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Returns the error reason, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(reason) => Some(reason),
            _ => None,
        }
    }

    /// Returns a success field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Self::Ok(fields) => fields.get(field),
            _ => None,
        }
    }

    fn from_response(fields: Fields) -> Self {
        match fields.get("error") {
            Some(Value::String(reason)) => Self::Error(Arc::clone(reason)),
            Some(other) => Self::Error(Arc::from(other.to_string())),
            None => Self::Ok(fields),
        }
    }
}

/// Bookkeeping for requests that have been seeded but not yet answered.
#[derive(Debug, Default)]
struct Outstanding {
    in_flight: HashSet<Arc<str>>,
    replies: HashMap<Arc<str>, Vec<Fields>>,
    cancelled: HashSet<Arc<str>>,
}

impl Outstanding {
    fn forget(&mut self, request: &str) -> (Option<Vec<Fields>>, bool) {
        self.in_flight.remove(request);
        (self.replies.remove(request), self.cancelled.remove(request))
    }
}

/// The transport: allocates request ids and collects replies.
///
/// Only requests between [`seed`](Self::seed) and their reply are tracked;
/// every path out of [`complete`](Self::complete) releases them.
#[derive(Debug, Default)]
pub struct Requesting {
    next_id: AtomicU64,
    outstanding: Mutex<Outstanding>,
}

impl Requesting {
    /// Creates a transport with no outstanding requests.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Declares the request action and registers the respond operation.
    ///
    /// # Errors
    /// Returns an error if either name is already declared.
    pub fn register(self: &Arc<Self>, registry: &mut Registry) -> Result<()> {
        registry.declare(Signature::new(REQUEST).open_inputs().outputs(["request"]))?;

        let transport = Arc::clone(self);
        registry.operation(
            Signature::new(RESPOND).inputs(["request"]).open_inputs(),
            move |inputs: &Fields| transport.record(inputs),
        )
    }

    fn record(&self, inputs: &Fields) -> Outcome {
        let Some(request) = inputs.get("request").and_then(Value::as_str) else {
            return Outcome::error("missing request id");
        };
        let mut outstanding = self.outstanding.lock();
        if !outstanding.in_flight.contains(request) {
            tracing::warn!(request, "response for unknown request");
            return Outcome::error("unknown request");
        }
        let recorded = outstanding.replies.entry(Arc::from(request)).or_default();
        if !recorded.is_empty() {
            tracing::warn!(request, "multiple responses for one request");
        }
        recorded.push(inputs.remove("request"));
        Outcome::ok()
    }

    /// Allocates a request id.
    #[must_use]
    pub fn next_request_id(&self) -> Arc<str> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        Arc::from(format!("req-{id}"))
    }

    /// Builds the seed entry for an inbound call, returning its request id.
    ///
    /// The inputs are exactly what the caller supplied.
    #[must_use]
    pub fn seed(&self, inputs: Fields) -> (Arc<str>, ActionEntry) {
        let request = self.next_request_id();
        self.outstanding.lock().in_flight.insert(Arc::clone(&request));
        let outputs = fields! { "request" => Arc::clone(&request) };
        (request, ActionEntry::new(REQUEST, inputs, Outcome::success(outputs)))
    }

    /// Handles one inbound call end to end.
    ///
    /// # Errors
    /// Returns an error if the engine aborts the trace.
    pub fn request(&self, engine: &SyncEngine, inputs: Fields) -> Result<Reply> {
        self.request_traced(engine, inputs).map(|(reply, _)| reply)
    }

    /// Handles one inbound call and also returns the trace report.
    ///
    /// # Errors
    /// Returns an error if the engine aborts the trace.
    pub fn request_traced(
        &self,
        engine: &SyncEngine,
        inputs: Fields,
    ) -> Result<(Reply, TraceReport)> {
        let (request, seed) = self.seed(inputs);
        self.complete(engine, &request, seed)
    }

    /// Runs a seeded request and collects its reply.
    ///
    /// # Errors
    /// Returns an error if the engine aborts the trace. Any response recorded
    /// before the abort is discarded.
    pub fn complete(
        &self,
        engine: &SyncEngine,
        request: &str,
        seed: ActionEntry,
    ) -> Result<(Reply, TraceReport)> {
        match engine.run(seed) {
            Ok(report) => Ok((self.take_reply(request), report)),
            Err(e) => {
                let (recorded, _) = self.outstanding.lock().forget(request);
                if recorded.is_some() {
                    tracing::debug!(request, "response discarded after abort");
                }
                Err(e)
            }
        }
    }

    /// Cancels a request. Its reply is suppressed; nothing is rolled back.
    ///
    /// Returns false if the request is not outstanding.
    pub fn cancel(&self, request: &str) -> bool {
        let mut outstanding = self.outstanding.lock();
        if !outstanding.in_flight.contains(request) {
            return false;
        }
        outstanding.cancelled.insert(Arc::from(request))
    }

    /// Returns the number of requests seeded but not yet answered.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.lock().in_flight.len()
    }

    /// Removes and returns the reply for `request`.
    ///
    /// When several responses were recorded the first one wins.
    pub fn take_reply(&self, request: &str) -> Reply {
        let (recorded, cancelled) = self.outstanding.lock().forget(request);
        if cancelled {
            tracing::debug!(request, "reply suppressed");
            return Reply::Suppressed;
        }
        match recorded.and_then(|r| r.into_iter().next()) {
            Some(fields) => Reply::from_response(fields),
            None => {
                tracing::warn!(request, "no response");
                Reply::Missing
            }
        }
    }
}
