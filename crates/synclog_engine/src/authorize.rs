//! The authorization motif.
//!
//! Every protected write has the same shape: resolve a principal from an
//! opaque credential, resolve the target resource, assert a relationship
//! between them, and only then invoke the mutating operation. Each guard can
//! fail with its own error. [`Authorization`] builds the proceed rule and its
//! mirror deny rule from one description, so both always run the same guards
//! and a caller gets exactly one response whichever way the guards go.

use std::fmt;
use std::sync::Arc;

use synclog_foundation::{Error, ErrorKind, Result, Value};

use crate::dispatch::Invocation;
use crate::expand::{EnrichmentStep, FilterStep, QueryStep};
use crate::frame::Frame;
use crate::pattern::ActionPattern;
use crate::rule::Rule;

// =============================================================================
// Relationship
// =============================================================================

/// An acceptable relationship between bound values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Relationship {
    /// Both variables are bound to equal values.
    Equals(Arc<str>, Arc<str>),
    /// The collection contains the member (vector element or record key).
    Contains {
        /// Variable bound to the collection.
        collection: Arc<str>,
        /// Variable bound to the candidate member.
        member: Arc<str>,
    },
    /// At least one of the relationships holds.
    AnyOf(Vec<Relationship>),
}

impl Relationship {
    /// The principal is the resource's owner.
    #[must_use]
    pub fn owner(owner: impl Into<Arc<str>>, principal: impl Into<Arc<str>>) -> Self {
        Self::Equals(owner.into(), principal.into())
    }

    /// The principal is listed in a collection on the resource.
    #[must_use]
    pub fn member(collection: impl Into<Arc<str>>, principal: impl Into<Arc<str>>) -> Self {
        Self::Contains {
            collection: collection.into(),
            member: principal.into(),
        }
    }

    /// Either this relationship or `other` holds.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::AnyOf(mut left), Self::AnyOf(right)) => {
                left.extend(right);
                Self::AnyOf(left)
            }
            (Self::AnyOf(mut left), other) => {
                left.push(other);
                Self::AnyOf(left)
            }
            (this, other) => Self::AnyOf(vec![this, other]),
        }
    }

    /// Variables the relationship reads, without duplicates.
    #[must_use]
    pub fn reads(&self) -> Vec<&str> {
        let mut vars = Vec::new();
        self.collect_reads(&mut vars);
        vars
    }

    fn collect_reads<'a>(&'a self, vars: &mut Vec<&'a str>) {
        match self {
            Self::Equals(a, b) => {
                push_unique(vars, a);
                push_unique(vars, b);
            }
            Self::Contains { collection, member } => {
                push_unique(vars, collection);
                push_unique(vars, member);
            }
            Self::AnyOf(all) => {
                for relationship in all {
                    relationship.collect_reads(vars);
                }
            }
        }
    }

    /// Evaluates the relationship. Unbound variables never satisfy it.
    #[must_use]
    pub fn holds(&self, frame: &Frame) -> bool {
        match self {
            Self::Equals(a, b) => match (frame.get(a), frame.get(b)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            Self::Contains { collection, member } => {
                match (frame.get(collection), frame.get(member)) {
                    (Some(collection), Some(member)) => collection.contains(member),
                    _ => false,
                }
            }
            Self::AnyOf(all) => all.iter().any(|r| r.holds(frame)),
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals(a, b) => write!(f, "{a} = {b}"),
            Self::Contains { collection, member } => write!(f, "{member} in {collection}"),
            Self::AnyOf(all) => {
                write!(f, "(")?;
                for (i, relationship) in all.iter().enumerate() {
                    if i > 0 {
                        write!(f, " or ")?;
                    }
                    write!(f, "{relationship}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// =============================================================================
// Authorization Builder
// =============================================================================

#[derive(Clone, Debug)]
enum Guard {
    Query(QueryStep, Value),
    Relationship(Relationship, Value),
    Step(EnrichmentStep),
}

/// The proceed and deny rules of one protected operation.
#[derive(Clone, Debug)]
pub struct AuthorizedRules {
    /// Dispatches the protected invocation when every guard passes.
    pub proceed: Rule,
    /// Dispatches the error response when any guard fails.
    pub deny: Rule,
}

impl IntoIterator for AuthorizedRules {
    type Item = Rule;
    type IntoIter = std::array::IntoIter<Rule, 2>;

    fn into_iter(self) -> Self::IntoIter {
        [self.proceed, self.deny].into_iter()
    }
}

/// Builds the credential, resource, relationship, proceed composition.
///
/// ```
/// use synclog_engine::{
///     ActionPattern, Arg, Authorization, Invocation, QueryStep, Relationship, Term,
/// };
///
/// let auth = Authorization::new(
///     "delete-document",
///     ActionPattern::new("Requesting.request")
///         .input("path", Term::lit("/documents/delete"))
///         .input("session", Term::var("session"))
///         .input("doc", Term::var("doc"))
///         .output("request", Term::var("request")),
/// )
/// .credential(
///     QueryStep::new("Sessions._getUser")
///         .arg("session", Arg::var("session"))
///         .bind("user", "user"),
///     "invalid session",
/// )
/// .resource(
///     QueryStep::new("Documents._get")
///         .arg("doc", Arg::var("doc"))
///         .bind("owner", "owner"),
///     "document not found",
/// )
/// .relationship(Relationship::owner("owner", "user"), "not the owner")
/// .then(Invocation::new("Documents.delete").var("doc", "doc"))
/// .deny_with(
///     Invocation::new("Requesting.respond")
///         .var("request", "request")
///         .var("error", "error"),
/// );
/// # let _ = auth;
/// ```
#[derive(Clone, Debug)]
pub struct Authorization {
    name: Arc<str>,
    request: ActionPattern,
    guards: Vec<Guard>,
    then: Vec<Invocation>,
    deny: Vec<Invocation>,
    error_var: Arc<str>,
}

impl Authorization {
    /// Starts a motif triggered by `request`.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, request: ActionPattern) -> Self {
        Self {
            name: name.into(),
            request,
            guards: Vec::new(),
            then: Vec::new(),
            deny: Vec::new(),
            error_var: Arc::from("error"),
        }
    }

    /// Sets the variable the staged error is bound to. Defaults to `error`.
    #[must_use]
    pub fn error_var(mut self, var: impl Into<Arc<str>>) -> Self {
        self.error_var = var.into();
        self
    }

    /// Resolves the principal from a credential; fails with `error` if no row.
    #[must_use]
    pub fn credential(mut self, lookup: QueryStep, error: impl Into<Value>) -> Self {
        self.guards.push(Guard::Query(lookup, error.into()));
        self
    }

    /// Resolves the target resource; fails with `error` if no row.
    #[must_use]
    pub fn resource(mut self, lookup: QueryStep, error: impl Into<Value>) -> Self {
        self.guards.push(Guard::Query(lookup, error.into()));
        self
    }

    /// Asserts a relationship; fails with `error` if it does not hold.
    #[must_use]
    pub fn relationship(mut self, relationship: Relationship, error: impl Into<Value>) -> Self {
        self.guards
            .push(Guard::Relationship(relationship, error.into()));
        self
    }

    /// Adds an unguarded step, such as an extra lookup the invocation needs.
    #[must_use]
    pub fn step(mut self, step: impl Into<EnrichmentStep>) -> Self {
        self.guards.push(Guard::Step(step.into()));
        self
    }

    /// Adds a protected invocation.
    #[must_use]
    pub fn then(mut self, invocation: Invocation) -> Self {
        self.then.push(invocation);
        self
    }

    /// Adds an invocation for the deny rule, typically the error response.
    #[must_use]
    pub fn deny_with(mut self, invocation: Invocation) -> Self {
        self.deny.push(invocation);
        self
    }

    /// Produces the proceed rule and its mirror deny rule.
    ///
    /// The deny rule is named `<name>.denied`.
    ///
    /// # Errors
    /// Returns an error if there are no guards or either invocation list is empty.
    pub fn into_rules(self) -> Result<AuthorizedRules> {
        let has_guard = self.guards.iter().any(|g| !matches!(g, Guard::Step(_)));
        if !has_guard {
            return Err(invalid(&self.name, "authorization has no guard"));
        }
        if self.then.is_empty() {
            return Err(invalid(&self.name, "authorization has no protected invocation"));
        }
        if self.deny.is_empty() {
            return Err(invalid(&self.name, "authorization has no deny invocation"));
        }

        let steps: Vec<EnrichmentStep> = self
            .guards
            .into_iter()
            .map(|guard| match guard {
                Guard::Query(lookup, error) => {
                    lookup.or_halt(Arc::clone(&self.error_var), error).into()
                }
                Guard::Relationship(relationship, error) => FilterStep::relationship(relationship)
                    .or_halt(Arc::clone(&self.error_var), error)
                    .into(),
                Guard::Step(step) => step,
            })
            .collect();

        let mut proceed = Rule::new(Arc::clone(&self.name)).when(self.request.clone());
        let mut deny = Rule::new(format!("{}.denied", self.name))
            .when(self.request)
            .halted_branch();
        proceed.steps.clone_from(&steps);
        deny.steps = steps;
        proceed.then = self.then;
        deny.then = self.deny;

        Ok(AuthorizedRules { proceed, deny })
    }
}

fn push_unique<'a>(vars: &mut Vec<&'a str>, var: &'a str) {
    if !vars.contains(&var) {
        vars.push(var);
    }
}

fn invalid(name: &str, message: &str) -> Error {
    Error::new(ErrorKind::InvalidRule(message.to_string())).in_rule(name)
}
