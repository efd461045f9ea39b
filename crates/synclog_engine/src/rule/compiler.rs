//! Rule validation against the registry.
//!
//! Every check here runs once, when the rule set is built. A rule that
//! passes cannot fail at runtime with an unknown action, an unbound
//! variable, or a missing argument.

use std::collections::BTreeSet;

use synclog_foundation::{Error, ErrorKind, Result};

use crate::dispatch::Invocation;
use crate::expand::EnrichmentStep;
use crate::pattern::{ActionPattern, OutputPattern};
use crate::registry::{Registry, Signature};

use super::{Branch, Rule};

type Vars<'r> = BTreeSet<&'r str>;

// =============================================================================
// Rule Compiler
// =============================================================================

/// Checks rules against the declared signatures.
pub struct RuleCompiler;

impl RuleCompiler {
    /// Validates one rule.
    ///
    /// # Errors
    /// Returns the first authoring error found, with the rule name as context.
    pub fn check(rule: &Rule, registry: &Registry) -> Result<()> {
        Self::check_inner(rule, registry).map_err(|e| e.in_rule(&rule.name))
    }

    fn check_inner(rule: &Rule, registry: &Registry) -> Result<()> {
        if rule.when.is_empty() {
            return Err(invalid("rule has no when patterns"));
        }
        if rule.then.is_empty() {
            return Err(invalid("rule has no then invocations"));
        }

        let mut live: Vars<'_> = BTreeSet::new();
        for pattern in &rule.when {
            Self::check_pattern(pattern, registry)?;
            live.extend(pattern.variables());
        }

        let mut halt_points: Vec<Vars<'_>> = Vec::new();
        for step in &rule.steps {
            Self::check_step(step, registry)?;

            for var in step.reads() {
                if !live.contains(var) {
                    return Err(Error::unbound_variable(var));
                }
            }
            if let Some(halt) = step.halt() {
                if live.contains(&*halt.var) {
                    return Err(Error::rebinding(&*halt.var));
                }
                let mut available = live.clone();
                available.insert(&*halt.var);
                halt_points.push(available);
            }
            for var in step.binds() {
                if !live.insert(var) {
                    return Err(Error::rebinding(var));
                }
            }
        }

        let available = match rule.branch {
            Branch::Main => live,
            Branch::Halted => halt_points
                .into_iter()
                .reduce(|acc, point| acc.intersection(&point).copied().collect())
                .ok_or_else(|| invalid("halted branch has no halting step"))?,
        };

        for invocation in &rule.then {
            Self::check_invocation(invocation, registry, &available)?;
        }
        Ok(())
    }

    fn check_pattern(pattern: &ActionPattern, registry: &Registry) -> Result<()> {
        let signature = registry
            .signature(&pattern.action)
            .ok_or_else(|| Error::unknown_action(&*pattern.action))?;

        for (field, _) in &pattern.inputs {
            if !signature.accepts_input(field) {
                return Err(Error::unknown_field(&*pattern.action, &**field));
            }
        }
        if let OutputPattern::Success(fields) = &pattern.outputs {
            for (field, _) in fields {
                if !signature.has_output(field) {
                    return Err(Error::unknown_field(&*pattern.action, &**field));
                }
            }
        }
        Ok(())
    }

    fn check_step(step: &EnrichmentStep, registry: &Registry) -> Result<()> {
        let EnrichmentStep::Query(query) = step else {
            return Ok(());
        };
        if !registry.is_query(&query.query) {
            return Err(Error::new(ErrorKind::UnknownQuery(query.query.to_string())));
        }
        let signature = registry
            .signature(&query.query)
            .ok_or_else(|| Error::unknown_action(&*query.query))?;

        Self::check_args(signature, query.args.iter().map(|(p, _)| &**p))?;
        for (field, _) in &query.outputs {
            // Error rows surface as the single field `error`.
            if &**field != "error" && !signature.has_output(field) {
                return Err(Error::unknown_field(&*query.query, &**field));
            }
        }
        Ok(())
    }

    fn check_invocation(
        invocation: &Invocation,
        registry: &Registry,
        available: &Vars<'_>,
    ) -> Result<()> {
        if !registry.is_operation(&invocation.operation) {
            return Err(Error::new(ErrorKind::UnknownOperation(
                invocation.operation.to_string(),
            )));
        }
        let signature = registry
            .signature(&invocation.operation)
            .ok_or_else(|| Error::unknown_action(&*invocation.operation))?;

        Self::check_args(signature, invocation.args.iter().map(|(p, _)| &**p))?;
        for (_, arg) in &invocation.args {
            if let Some(var) = arg.var_name() {
                if !available.contains(var) {
                    return Err(Error::unbound_variable(var));
                }
            }
        }
        Ok(())
    }

    fn check_args<'a>(signature: &Signature, params: impl Iterator<Item = &'a str>) -> Result<()> {
        let params: Vars<'a> = params.collect();
        for param in &params {
            if !signature.accepts_input(param) {
                return Err(Error::unknown_field(signature.name(), *param));
            }
        }
        for required in signature.required_inputs() {
            if !params.contains(&**required) {
                return Err(Error::missing_argument(signature.name(), &**required));
            }
        }
        Ok(())
    }
}

fn invalid(message: &str) -> Error {
    Error::new(ErrorKind::InvalidRule(message.to_string()))
}

// =============================================================================
// Tests
// =============================================================================
