//! Operation signatures and handlers.
//!
//! Every action a rule mentions must be declared with an explicit
//! [`Signature`] so patterns, queries, and invocations can be checked once
//! at registration instead of failing on heterogeneous records at runtime.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use synclog_foundation::{Error, ErrorKind, Fields, Result};

use crate::action::Outcome;

// =============================================================================
// Handler Traits
// =============================================================================

/// A mutating operation on an external component.
///
/// Only the dispatcher calls operations. Each component serializes its own
/// writes; the engine adds no locking around them.
pub trait Operation: Send + Sync {
    /// Performs the operation.
    fn invoke(&self, inputs: &Fields) -> Outcome;
}

impl<F> Operation for F
where
    F: Fn(&Fields) -> Outcome + Send + Sync,
{
    fn invoke(&self, inputs: &Fields) -> Outcome {
        self(inputs)
    }
}

/// A read-only query on an external component, returning zero or more rows.
pub trait Query: Send + Sync {
    /// Runs the query. Must not change any persisted state.
    fn query(&self, inputs: &Fields) -> Vec<Outcome>;
}

impl<F> Query for F
where
    F: Fn(&Fields) -> Vec<Outcome> + Send + Sync,
{
    fn query(&self, inputs: &Fields) -> Vec<Outcome> {
        self(inputs)
    }
}

// =============================================================================
// Signature
// =============================================================================

/// The declared shape of an action, query, or operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    name: Arc<str>,
    required: Vec<Arc<str>>,
    optional: Vec<Arc<str>>,
    open_inputs: bool,
    outputs: Vec<Arc<str>>,
}

impl Signature {
    /// Creates a signature with no inputs or outputs.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            required: Vec::new(),
            optional: Vec::new(),
            open_inputs: false,
            outputs: Vec::new(),
        }
    }

    /// Declares required input fields.
    #[must_use]
    pub fn inputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        self.required.extend(names.into_iter().map(Into::into));
        self
    }

    /// Declares optional input fields.
    #[must_use]
    pub fn optional_inputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        self.optional.extend(names.into_iter().map(Into::into));
        self
    }

    /// Accepts input fields beyond the declared ones.
    ///
    /// Used for actions whose inputs are caller-supplied, such as an
    /// inbound request.
    #[must_use]
    pub fn open_inputs(mut self) -> Self {
        self.open_inputs = true;
        self
    }

    /// Declares success output fields.
    #[must_use]
    pub fn outputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        self.outputs.extend(names.into_iter().map(Into::into));
        self
    }

    /// The action name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Required input fields.
    #[must_use]
    pub fn required_inputs(&self) -> &[Arc<str>] {
        &self.required
    }

    /// Returns true if `field` may appear among the inputs.
    #[must_use]
    pub fn accepts_input(&self, field: &str) -> bool {
        self.open_inputs
            || self.required.iter().any(|f| &**f == field)
            || self.optional.iter().any(|f| &**f == field)
    }

    /// Returns true if `field` is a declared success output.
    #[must_use]
    pub fn has_output(&self, field: &str) -> bool {
        self.outputs.iter().any(|f| &**f == field)
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Clone)]
enum Handler {
    /// Appended from outside the engine (e.g. by the transport).
    External,
    Operation(Arc<dyn Operation>),
    Query(Arc<dyn Query>),
}

#[derive(Clone)]
struct Declaration {
    signature: Signature,
    handler: Handler,
}

/// Signatures and handlers for every action the rules may reference.
///
/// Built once at startup and shared read-only by the engine.
#[derive(Clone, Default)]
pub struct Registry {
    declarations: HashMap<Arc<str>, Declaration>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.declarations.keys().collect();
        names.sort();
        f.debug_struct("Registry").field("actions", &names).finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, signature: Signature, handler: Handler) -> Result<()> {
        if self.declarations.contains_key(&signature.name) {
            return Err(Error::new(ErrorKind::DuplicateAction(
                signature.name.to_string(),
            )));
        }
        self.declarations.insert(
            Arc::clone(&signature.name),
            Declaration { signature, handler },
        );
        Ok(())
    }

    /// Declares an action that is appended from outside the engine.
    ///
    /// # Errors
    /// Returns an error if the name is already declared.
    pub fn declare(&mut self, signature: Signature) -> Result<()> {
        self.insert(signature, Handler::External)
    }

    /// Registers a mutating operation.
    ///
    /// # Errors
    /// Returns an error if the name is already declared.
    pub fn operation(
        &mut self,
        signature: Signature,
        handler: impl Operation + 'static,
    ) -> Result<()> {
        self.insert(signature, Handler::Operation(Arc::new(handler)))
    }

    /// Registers a read-only query.
    ///
    /// # Errors
    /// Returns an error if the name is already declared.
    pub fn query(&mut self, signature: Signature, handler: impl Query + 'static) -> Result<()> {
        self.insert(signature, Handler::Query(Arc::new(handler)))
    }

    /// Returns the signature declared under `name`.
    #[must_use]
    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.declarations.get(name).map(|d| &d.signature)
    }

    /// Returns true if `name` has a mutating handler.
    #[must_use]
    pub fn is_operation(&self, name: &str) -> bool {
        matches!(
            self.declarations.get(name).map(|d| &d.handler),
            Some(Handler::Operation(_))
        )
    }

    /// Returns true if `name` has a query handler.
    #[must_use]
    pub fn is_query(&self, name: &str) -> bool {
        matches!(
            self.declarations.get(name).map(|d| &d.handler),
            Some(Handler::Query(_))
        )
    }

    /// Invokes a mutating operation.
    ///
    /// # Errors
    /// Returns an error if no operation is registered under `name`.
    pub fn invoke(&self, name: &str, inputs: &Fields) -> Result<Outcome> {
        match self.declarations.get(name).map(|d| &d.handler) {
            Some(Handler::Operation(op)) => Ok(op.invoke(inputs)),
            _ => Err(Error::new(ErrorKind::UnknownOperation(name.to_string()))),
        }
    }

    /// Runs a read-only query.
    ///
    /// # Errors
    /// Returns an error if no query is registered under `name`.
    pub fn run_query(&self, name: &str, inputs: &Fields) -> Result<Vec<Outcome>> {
        match self.declarations.get(name).map(|d| &d.handler) {
            Some(Handler::Query(q)) => Ok(q.query(inputs)),
            _ => Err(Error::new(ErrorKind::UnknownQuery(name.to_string()))),
        }
    }
}
