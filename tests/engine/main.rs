//! Integration tests for Layer 1: Engine
//!
//! Tests for pattern matching, frame expansion, rule validation, and dispatch.

mod expansion;
