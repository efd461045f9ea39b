//! Integration tests for frame expansion
//!
//! Tests query fan-out, filters, attachments, and halting.

use synclog_engine::{
    Arg, AttachStep, EnrichmentStep, FilterStep, Frame, FrameExpander, Outcome, QueryStep,
    Registry, Relationship, Signature, TraceId,
};
use synclog_foundation::{ErrorKind, Fields, SemanticLimit, Value, fields};

/// Annotations per document: R1 has three, R2 has none.
fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .query(
            Signature::new("Annotations._byDoc")
                .inputs(["doc"])
                .outputs(["annotation", "author"]),
            |inputs: &Fields| -> Vec<Outcome> {
                match inputs.get("doc").and_then(Value::as_str) {
                    Some("R1") => ["A1", "A2", "A3"]
                        .into_iter()
                        .map(|a| Outcome::success(fields! { "annotation" => a, "author" => "U1" }))
                        .collect(),
                    _ => Vec::new(),
                }
            },
        )
        .unwrap();
    registry
        .query(
            Signature::new("Sessions._getUser")
                .inputs(["session"])
                .outputs(["user"]),
            |inputs: &Fields| -> Vec<Outcome> {
                match inputs.get("session").and_then(Value::as_str) {
                    Some("C1") => vec![Outcome::success(fields! { "user" => "U1" })],
                    _ => vec![Outcome::error("invalid session")],
                }
            },
        )
        .unwrap();
    registry
}

fn frame(bindings: &[(&str, &str)]) -> Frame {
    bindings
        .iter()
        .fold(Frame::new(TraceId::new(1)), |f, (var, value)| {
            f.bind(var, Value::from(*value)).unwrap()
        })
}

fn annotations() -> EnrichmentStep {
    EnrichmentStep::Query(
        QueryStep::new("Annotations._byDoc")
            .arg("doc", Arg::var("doc"))
            .bind("annotation", "annotation"),
    )
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn query_fans_out_one_frame_per_row() {
    let registry = registry();
    let expander = FrameExpander::new(&registry, "cascade", 100);

    let frames = expander
        .expand(&[annotations()], vec![frame(&[("doc", "R1")])])
        .unwrap();

    let bound: Vec<&Value> = frames.iter().filter_map(|f| f.get("annotation")).collect();
    assert_eq!(
        bound,
        vec![&Value::from("A1"), &Value::from("A2"), &Value::from("A3")]
    );
}

#[test]
fn query_with_no_rows_drops_frame() {
    let registry = registry();
    let expander = FrameExpander::new(&registry, "cascade", 100);

    let frames = expander
        .expand(&[annotations()], vec![frame(&[("doc", "R2")])])
        .unwrap();
    assert!(frames.is_empty());
}

#[test]
fn frames_expand_independently() {
    let registry = registry();
    let expander = FrameExpander::new(&registry, "cascade", 100);

    let frames = expander
        .expand(
            &[annotations()],
            vec![frame(&[("doc", "R1")]), frame(&[("doc", "R2")]), frame(&[("doc", "R1")])],
        )
        .unwrap();
    assert_eq!(frames.len(), 6);
}

#[test]
fn error_row_without_error_binding_counts_as_empty() {
    let registry = registry();
    let expander = FrameExpander::new(&registry, "auth", 100);
    let step = EnrichmentStep::Query(
        QueryStep::new("Sessions._getUser")
            .arg("session", Arg::var("session"))
            .bind("user", "user")
            .or_halt("error", "invalid session"),
    );

    let frames = expander
        .expand(&[step], vec![frame(&[("session", "C9")])])
        .unwrap();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].is_halted());
    assert_eq!(frames[0].get("error"), Some(&Value::from("invalid session")));
    assert!(frames[0].get("user").is_none());
}

#[test]
fn error_row_can_be_bound() {
    let registry = registry();
    let expander = FrameExpander::new(&registry, "auth", 100);
    let step = EnrichmentStep::Query(
        QueryStep::new("Sessions._getUser")
            .arg("session", Arg::var("session"))
            .bind("error", "reason"),
    );

    let frames = expander
        .expand(&[step], vec![frame(&[("session", "C9")])])
        .unwrap();
    assert_eq!(frames[0].get("reason"), Some(&Value::from("invalid session")));
    assert!(!frames[0].is_halted());
}

#[test]
fn unbound_argument_is_an_error() {
    let registry = registry();
    let expander = FrameExpander::new(&registry, "cascade", 100);

    let err = expander
        .expand(&[annotations()], vec![frame(&[])])
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnboundVariable(ref v) if v == "doc"));
    let source = err.context.as_ref().and_then(|c| c.source.as_deref());
    assert_eq!(source, Some("cascade"));
}

#[test]
fn frame_limit_trips() {
    let registry = registry();
    let expander = FrameExpander::new(&registry, "cascade", 2);

    let err = expander
        .expand(&[annotations()], vec![frame(&[("doc", "R1")])])
        .unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::LimitExceeded(SemanticLimit::MaxFramesPerStep { limit: 2, .. })
    ));
}

// =============================================================================
// Filters and Attachments
// =============================================================================

#[test]
fn filter_drops_rejected_frames() {
    let registry = registry();
    let expander = FrameExpander::new(&registry, "own", 100);
    let owns = EnrichmentStep::Filter(FilterStep::relationship(Relationship::owner(
        "owner", "user",
    )));

    let frames = expander
        .expand(
            &[owns],
            vec![
                frame(&[("owner", "U1"), ("user", "U1")]),
                frame(&[("owner", "U1"), ("user", "U2")]),
            ],
        )
        .unwrap();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].get("user"), Some(&Value::from("U1")));
}

#[test]
fn filter_can_halt_instead() {
    let registry = registry();
    let expander = FrameExpander::new(&registry, "own", 100);
    let owns = EnrichmentStep::Filter(
        FilterStep::relationship(Relationship::owner("owner", "user")).or_halt("error", "forbidden"),
    );

    let frames = expander
        .expand(&[owns], vec![frame(&[("owner", "U1"), ("user", "U2")])])
        .unwrap();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].is_halted());
    assert_eq!(frames[0].get("error"), Some(&Value::from("forbidden")));
}

#[test]
fn halted_frames_skip_remaining_steps() {
    let registry = registry();
    let expander = FrameExpander::new(&registry, "own", 100);
    let steps = [
        EnrichmentStep::Filter(
            FilterStep::relationship(Relationship::owner("owner", "user"))
                .or_halt("error", "forbidden"),
        ),
        EnrichmentStep::Attach(AttachStep::literal("reached", true)),
    ];

    let frames = expander
        .expand(&steps, vec![frame(&[("owner", "U1"), ("user", "U2")])])
        .unwrap();
    assert!(frames[0].get("reached").is_none());
}

#[test]
fn attach_computed_value() {
    let registry = registry();
    let expander = FrameExpander::new(&registry, "label", 100);
    let step = EnrichmentStep::Attach(AttachStep::computed("label", ["doc"], |f: &Frame| {
        let doc = f.get("doc").and_then(Value::as_str).unwrap_or_default();
        Value::from(format!("document {doc}"))
    }));

    let frames = expander
        .expand(&[step], vec![frame(&[("doc", "R1")])])
        .unwrap();
    assert_eq!(frames[0].get("label"), Some(&Value::from("document R1")));
}

#[test]
fn custom_filter_over_values() {
    let registry = registry();
    let expander = FrameExpander::new(&registry, "short", 100);
    let step = EnrichmentStep::Filter(FilterStep::new("title is short", ["title"], |f: &Frame| {
        f.get("title")
            .and_then(Value::as_str)
            .is_some_and(|t| t.len() < 6)
    }));

    let frames = expander
        .expand(
            &[step],
            vec![frame(&[("title", "notes")]), frame(&[("title", "minutes")])],
        )
        .unwrap();
    assert_eq!(frames.len(), 1);
}

#[test]
fn no_steps_is_identity() {
    let registry = registry();
    let expander = FrameExpander::new(&registry, "plain", 100);
    let input = vec![frame(&[("doc", "R1")])];
    assert_eq!(expander.expand(&[], input.clone()).unwrap(), input);
}
