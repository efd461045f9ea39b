//! A small document-sharing application used across the integration tests.
//!
//! Four independent components know nothing about each other: sessions,
//! documents, annotations, and sharing. All coordination lives in the rules.
//!
//! Initial state:
//! - sessions `C1` -> `U1`, `C2` -> `U2`, `C3` -> `U3`
//! - `R1` owned by `U1`, annotated `A1` and `A2`
//! - `R2` owned by `U2`, shared with `U3`
//! - `R3` owned by `U1`, locked

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use synclog::engine::{
    ActionPattern, Arg, Authorization, EngineConfig, Invocation, Outcome, QueryStep, Registry,
    Relationship, Rule, Signature, SyncEngine, Term, TraceReport,
};
use synclog::foundation::{Fields, Result, Value, fields};
use synclog::runtime::{REQUEST, RESPOND, Reply, Requesting};

pub const DELETE: &str = "/documents/delete";
pub const CREATE: &str = "/documents/create";
pub const ANNOTATE: &str = "/annotations/create";

fn text(inputs: &Fields, field: &str) -> Option<String> {
    inputs.get(field).and_then(Value::as_str).map(str::to_string)
}

// =============================================================================
// Components
// =============================================================================

#[derive(Clone, Debug)]
pub struct Document {
    pub owner: String,
    pub title: String,
    pub locked: bool,
}

#[derive(Clone, Debug)]
pub struct Annotation {
    pub doc: String,
    pub author: String,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct State {
    pub sessions: BTreeMap<String, String>,
    pub documents: BTreeMap<String, Document>,
    pub annotations: BTreeMap<String, Annotation>,
    pub sharing: BTreeMap<String, Vec<String>>,
    pub next_id: u64,
    /// Every mutating call, in order.
    pub mutations: Vec<String>,
}

impl State {
    fn seeded() -> Self {
        let mut state = Self::default();
        for (session, user) in [("C1", "U1"), ("C2", "U2"), ("C3", "U3")] {
            state.sessions.insert(session.into(), user.into());
        }
        for (doc, owner, locked) in [("R1", "U1", false), ("R2", "U2", false), ("R3", "U1", true)] {
            state.documents.insert(
                doc.into(),
                Document {
                    owner: owner.into(),
                    title: format!("{doc} notes"),
                    locked,
                },
            );
        }
        for annotation in ["A1", "A2"] {
            state.annotations.insert(
                annotation.into(),
                Annotation {
                    doc: "R1".into(),
                    author: "U1".into(),
                    text: "first pass".into(),
                },
            );
        }
        state.sharing.insert("R2".into(), vec!["U3".into()]);
        state
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }
}

pub type Shared = Arc<Mutex<State>>;

fn register_components(registry: &mut Registry, state: &Shared) -> Result<()> {
    let s = Arc::clone(state);
    registry.query(
        Signature::new("Sessions._getUser")
            .inputs(["session"])
            .outputs(["user"]),
        move |inputs: &Fields| -> Vec<Outcome> {
            let state = s.lock();
            match text(inputs, "session").and_then(|c| state.sessions.get(&c)) {
                Some(user) => vec![Outcome::success(fields! { "user" => user.as_str() })],
                None => vec![Outcome::error("no such session")],
            }
        },
    )?;

    let s = Arc::clone(state);
    registry.query(
        Signature::new("Documents._get")
            .inputs(["doc"])
            .outputs(["owner", "title"]),
        move |inputs: &Fields| -> Vec<Outcome> {
            let state = s.lock();
            text(inputs, "doc")
                .and_then(|d| state.documents.get(&d))
                .map(|d| {
                    Outcome::success(fields! {
                        "owner" => d.owner.as_str(),
                        "title" => d.title.as_str(),
                    })
                })
                .into_iter()
                .collect()
        },
    )?;

    let s = Arc::clone(state);
    registry.operation(
        Signature::new("Documents.create")
            .inputs(["owner", "title"])
            .outputs(["doc"]),
        move |inputs: &Fields| {
            let (Some(owner), Some(title)) = (text(inputs, "owner"), text(inputs, "title")) else {
                return Outcome::error("owner and title are required");
            };
            let mut state = s.lock();
            let doc = state.fresh_id("D");
            state.mutations.push(format!("create {doc}"));
            state.documents.insert(
                doc.clone(),
                Document {
                    owner,
                    title,
                    locked: false,
                },
            );
            Outcome::success(fields! { "doc" => doc })
        },
    )?;

    let s = Arc::clone(state);
    registry.operation(
        Signature::new("Documents.delete").inputs(["doc"]),
        move |inputs: &Fields| {
            let doc = text(inputs, "doc").unwrap_or_default();
            let mut state = s.lock();
            match state.documents.get(&doc).map(|d| d.locked) {
                None => Outcome::error("document not found"),
                Some(true) => Outcome::error("document is locked"),
                Some(false) => {
                    state.documents.remove(&doc);
                    state.mutations.push(format!("delete {doc}"));
                    Outcome::ok()
                }
            }
        },
    )?;

    let s = Arc::clone(state);
    registry.query(
        Signature::new("Annotations._byDoc")
            .inputs(["doc"])
            .outputs(["annotation", "author"]),
        move |inputs: &Fields| -> Vec<Outcome> {
            let doc = text(inputs, "doc").unwrap_or_default();
            s.lock()
                .annotations
                .iter()
                .filter(|(_, a)| a.doc == doc)
                .map(|(id, a)| {
                    Outcome::success(fields! {
                        "annotation" => id.as_str(),
                        "author" => a.author.as_str(),
                    })
                })
                .collect()
        },
    )?;

    let s = Arc::clone(state);
    registry.operation(
        Signature::new("Annotations.create")
            .inputs(["doc", "author", "text"])
            .outputs(["annotation"]),
        move |inputs: &Fields| {
            let mut state = s.lock();
            let annotation = state.fresh_id("N");
            state.mutations.push(format!("annotate {annotation}"));
            state.annotations.insert(
                annotation.clone(),
                Annotation {
                    doc: text(inputs, "doc").unwrap_or_default(),
                    author: text(inputs, "author").unwrap_or_default(),
                    text: text(inputs, "text").unwrap_or_default(),
                },
            );
            Outcome::success(fields! { "annotation" => annotation })
        },
    )?;

    let s = Arc::clone(state);
    registry.operation(
        Signature::new("Annotations.delete").inputs(["annotation"]),
        move |inputs: &Fields| {
            let annotation = text(inputs, "annotation").unwrap_or_default();
            let mut state = s.lock();
            if state.annotations.remove(&annotation).is_none() {
                return Outcome::error("annotation not found");
            }
            state.mutations.push(format!("unannotate {annotation}"));
            Outcome::ok()
        },
    )?;

    let s = Arc::clone(state);
    registry.query(
        Signature::new("Sharing._collaborators")
            .inputs(["doc"])
            .outputs(["collaborators"]),
        move |inputs: &Fields| -> Vec<Outcome> {
            let doc = text(inputs, "doc").unwrap_or_default();
            let users = s.lock().sharing.get(&doc).cloned().unwrap_or_default();
            vec![Outcome::success(fields! { "collaborators" => users })]
        },
    )?;

    Ok(())
}

// =============================================================================
// Rules
// =============================================================================

fn request(path: &str) -> ActionPattern {
    ActionPattern::new(REQUEST)
        .input("path", Term::lit(path))
        .input("session", Term::var("session"))
        .output("request", Term::var("request"))
}

fn current_user() -> QueryStep {
    QueryStep::new("Sessions._getUser")
        .arg("session", Arg::var("session"))
        .bind("user", "user")
}

fn respond_error() -> Invocation {
    Invocation::new(RESPOND)
        .var("request", "request")
        .var("error", "error")
}

fn rules() -> Result<Vec<Rule>> {
    let mut rules = Vec::new();

    // Only the owner may delete.
    rules.extend(
        Authorization::new(
            "delete-document",
            request(DELETE).input("doc", Term::var("doc")),
        )
        .credential(current_user(), "invalid session")
        .resource(
            QueryStep::new("Documents._get")
                .arg("doc", Arg::var("doc"))
                .bind("owner", "owner"),
            "document not found",
        )
        .relationship(Relationship::owner("owner", "user"), "not the owner")
        .then(Invocation::new("Documents.delete").var("doc", "doc"))
        .deny_with(respond_error())
        .into_rules()?,
    );

    rules.push(
        Rule::new("delete-document.respond")
            .when(request(DELETE).input("doc", Term::var("doc")))
            .when(
                ActionPattern::new("Documents.delete")
                    .input("doc", Term::var("doc"))
                    .succeeds(),
            )
            .then(
                Invocation::new(RESPOND)
                    .var("request", "request")
                    .var("deleted", "doc"),
            ),
    );

    rules.push(
        Rule::new("delete-document.failed")
            .when(request(DELETE).input("doc", Term::var("doc")))
            .when(
                ActionPattern::new("Documents.delete")
                    .input("doc", Term::var("doc"))
                    .fails(Term::var("error")),
            )
            .then(respond_error()),
    );

    // Deleting a document removes its annotations, whoever asked.
    rules.push(
        Rule::new("cascade-annotations")
            .when(
                ActionPattern::new("Documents.delete")
                    .input("doc", Term::var("doc"))
                    .succeeds(),
            )
            .query(
                QueryStep::new("Annotations._byDoc")
                    .arg("doc", Arg::var("doc"))
                    .bind("annotation", "annotation"),
            )
            .then(Invocation::new("Annotations.delete").var("annotation", "annotation")),
    );

    rules.extend(
        Authorization::new(
            "create-document",
            request(CREATE).input("title", Term::var("title")),
        )
        .credential(current_user(), "invalid session")
        .then(
            Invocation::new("Documents.create")
                .var("owner", "user")
                .var("title", "title"),
        )
        .deny_with(respond_error())
        .into_rules()?,
    );

    rules.push(
        Rule::new("create-document.respond")
            .when(request(CREATE).input("title", Term::var("title")))
            .when(
                ActionPattern::new("Documents.create")
                    .input("title", Term::var("title"))
                    .output("doc", Term::var("doc")),
            )
            .then(
                Invocation::new(RESPOND)
                    .var("request", "request")
                    .var("doc", "doc"),
            ),
    );

    // Owners and collaborators may annotate.
    rules.extend(
        Authorization::new(
            "annotate",
            request(ANNOTATE)
                .input("doc", Term::var("doc"))
                .input("text", Term::var("text")),
        )
        .credential(current_user(), "invalid session")
        .resource(
            QueryStep::new("Documents._get")
                .arg("doc", Arg::var("doc"))
                .bind("owner", "owner"),
            "document not found",
        )
        .step(
            QueryStep::new("Sharing._collaborators")
                .arg("doc", Arg::var("doc"))
                .bind("collaborators", "collaborators"),
        )
        .relationship(
            Relationship::owner("owner", "user").or(Relationship::member("collaborators", "user")),
            "not a collaborator",
        )
        .then(
            Invocation::new("Annotations.create")
                .var("doc", "doc")
                .var("author", "user")
                .var("text", "text"),
        )
        .deny_with(respond_error())
        .into_rules()?,
    );

    rules.push(
        Rule::new("annotate.respond")
            .when(
                request(ANNOTATE)
                    .input("doc", Term::var("doc"))
                    .input("text", Term::var("text")),
            )
            .when(
                ActionPattern::new("Annotations.create")
                    .input("doc", Term::var("doc"))
                    .input("text", Term::var("text"))
                    .output("annotation", Term::var("annotation")),
            )
            .then(
                Invocation::new(RESPOND)
                    .var("request", "request")
                    .var("annotation", "annotation"),
            ),
    );

    Ok(rules)
}

// =============================================================================
// Application
// =============================================================================

pub struct App {
    pub state: Shared,
    pub transport: Arc<Requesting>,
    pub engine: SyncEngine,
}

impl App {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::testing())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let state: Shared = Arc::new(Mutex::new(State::seeded()));
        let transport = Requesting::new();

        let mut registry = Registry::new();
        transport.register(&mut registry).unwrap();
        register_components(&mut registry, &state).unwrap();
        let engine = SyncEngine::compile(registry, rules().unwrap(), config).unwrap();

        Self {
            state,
            transport,
            engine,
        }
    }

    pub fn call(&self, inputs: Fields) -> (Reply, TraceReport) {
        self.transport.request_traced(&self.engine, inputs).unwrap()
    }

    pub fn delete(&self, session: &str, doc: &str) -> (Reply, TraceReport) {
        self.call(fields! { "path" => DELETE, "session" => session, "doc" => doc })
    }

    pub fn create(&self, session: &str, title: &str) -> (Reply, TraceReport) {
        self.call(fields! { "path" => CREATE, "session" => session, "title" => title })
    }

    pub fn annotate(&self, session: &str, doc: &str, text: &str) -> (Reply, TraceReport) {
        self.call(fields! {
            "path" => ANNOTATE,
            "session" => session,
            "doc" => doc,
            "text" => text,
        })
    }

    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().mutations.clone()
    }
}
