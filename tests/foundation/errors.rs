//! Integration tests for error types
//!
//! Tests error construction, display, context, and semantic limits.

use synclog_foundation::{Error, ErrorContext, ErrorKind, SemanticLimit};

// =============================================================================
// Construction and Display
// =============================================================================

#[test]
fn unknown_action_display() {
    let err = Error::unknown_action("Documents.archive");
    assert!(matches!(err.kind, ErrorKind::UnknownAction(ref name) if name == "Documents.archive"));
    assert_eq!(err.to_string(), "unknown action: Documents.archive");
}

#[test]
fn unknown_field_display() {
    let err = Error::unknown_field("Sessions._getUser", "token");
    assert_eq!(
        err.to_string(),
        "unknown field token on action Sessions._getUser"
    );
}

#[test]
fn variable_errors() {
    assert_eq!(
        Error::unbound_variable("owner").to_string(),
        "unbound variable: owner"
    );
    assert_eq!(
        Error::rebinding("user").to_string(),
        "variable already bound: user"
    );
}

#[test]
fn missing_argument_display() {
    let err = Error::missing_argument("Documents.delete", "doc");
    assert_eq!(
        err.to_string(),
        "missing argument doc for operation Documents.delete"
    );
}

// =============================================================================
// Context
// =============================================================================

#[test]
fn new_error_has_no_context() {
    assert!(Error::unbound_variable("x").context.is_none());
}

#[test]
fn in_rule_records_source() {
    let err = Error::unbound_variable("doc").in_rule("delete-document");
    let source = err.context.as_ref().and_then(|c| c.source.as_deref());
    assert_eq!(source, Some("delete-document"));
}

#[test]
fn in_rule_keeps_existing_stack() {
    let err = Error::unbound_variable("x")
        .with_context(ErrorContext::new().with_frame("step 1"))
        .in_rule("cascade");
    let ctx = err.context.unwrap();
    assert_eq!(ctx.source.as_deref(), Some("cascade"));
    assert_eq!(ctx.stack, vec!["step 1".to_string()]);
}

// =============================================================================
// Semantic Limits
// =============================================================================

#[test]
fn entries_limit_display() {
    let err = Error::limit_exceeded(SemanticLimit::MaxEntriesPerTrace {
        limit: 100,
        context: Some("loop".into()),
    });
    assert_eq!(
        err.to_string(),
        "limit exceeded: max entries per trace (100) exceeded: loop"
    );
}

#[test]
fn frames_limit_display() {
    let limit = SemanticLimit::MaxFramesPerStep {
        limit: 8,
        rule: Some("fanout".into()),
    };
    assert_eq!(
        limit.to_string(),
        "max frames per step (8) exceeded in rule fanout"
    );
    let bare = SemanticLimit::MaxFramesPerStep {
        limit: 8,
        rule: None,
    };
    assert_eq!(bare.to_string(), "max frames per step (8) exceeded");
}

#[test]
fn limits_compare_by_value() {
    let a = SemanticLimit::MaxEntriesPerTrace {
        limit: 1,
        context: None,
    };
    assert_eq!(a.clone(), a);
}
