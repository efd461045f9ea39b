//! Synclog - Declarative action-synchronization engine
//!
//! This crate re-exports all layers of the synclog system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: synclog_runtime    — Transport boundary, trace serialization, formatting
//! Layer 1: synclog_engine     — Action log, matching, expansion, dispatch, rules
//! Layer 0: synclog_foundation — Core types (Value, Fields, Error)
//! ```

pub use synclog_engine as engine;
pub use synclog_foundation as foundation;
pub use synclog_runtime as runtime;
