//! Action log, pattern matching, frame expansion, and dispatch for synclog.
//!
//! This crate provides:
//! - [`ActionLog`] - Append-only, per-trace record of executed actions
//! - [`PatternMatcher`] - Unification and the multi-pattern join stage
//! - [`FrameExpander`] - Query fan-out, filters, and attachments over frames
//! - [`ActionDispatcher`] - Invokes follow-up operations for surviving frames
//! - [`Authorization`] - Builder for the credential/resource/relationship motif
//! - [`SyncEngine`] - Trace-scoped work queue tying the pieces together

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod action;
pub mod authorize;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod expand;
pub mod frame;
pub mod log;
pub mod pattern;
pub mod provenance;
pub mod registry;
pub mod rule;

pub use action::{ActionEntry, Cause, EntryRef, Outcome, TraceId};
pub use authorize::{AuthorizedRules, Authorization, Relationship};
pub use config::EngineConfig;
pub use dispatch::{ActionDispatcher, Invocation, PlannedInvocation};
pub use engine::{Firing, SyncEngine, TraceReport};
pub use expand::{AttachStep, AttachValue, EnrichmentStep, FilterStep, FrameExpander, Halt, QueryStep};
pub use frame::{Arg, Frame};
pub use log::{ActionLog, SealedTrace};
pub use pattern::{ActionPattern, OutputPattern, PatternMatcher, Term};
pub use provenance::{Provenance, Why};
pub use registry::{Operation, Query, Registry, Signature};
pub use rule::{Branch, Rule, RuleCompiler, RuleSet};
