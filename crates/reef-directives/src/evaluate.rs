//! Expression evaluation.
//!
//! Directive expressions are dotted reference paths with optional `!`
//! negation prefixes, resolved against the scoped stores: `state.*`
//! reads the namespace store, `context.*` the nearest context cell, and
//! `actions.*` / `callbacks.*` the host action table. Missing leaves
//! evaluate to null rather than failing; only an unknown root is an
//! error.

use crate::actions::{Action, ActionCall, ActionOutcome, ActionTable};
use crate::scope::Scope;
use reef_state::StateGraph;
use reef_vdom::{DirectiveEntry, DirectiveValue};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("unknown reference root in expression `{0}`")]
    UnknownReference(String),
}

/// What an expression evaluated to.
pub enum EvalValue {
    Value(Value),
    /// A callable reference, carried with the namespace and reference it
    /// resolved under so invocation can rebuild the call environment.
    Action {
        action: Action,
        namespace: String,
        reference: String,
    },
}

/// JavaScript-style truthiness over JSON values.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Evaluate one directive entry within a scope.
///
/// JSON-object values evaluate to themselves. String values are treated
/// as reference expressions; reads are recorded in the active tracking
/// frame of `state`.
pub fn evaluate(
    entry: &DirectiveEntry,
    scope: &Scope,
    state: &mut StateGraph,
    actions: &ActionTable,
) -> Result<EvalValue, EvalError> {
    let expr = match &entry.value {
        DirectiveValue::Json(value) => return Ok(EvalValue::Value(value.clone())),
        DirectiveValue::Str(expr) => expr.as_str(),
    };

    let negations = expr.bytes().take_while(|b| *b == b'!').count();
    let reference = &expr[negations..];
    let (root, rest) = match reference.split_once('.') {
        Some((root, rest)) => (root, rest),
        None => (reference, ""),
    };

    let base = match root {
        "state" => {
            // A directive without a namespace has nowhere to read from.
            match &entry.namespace {
                Some(ns) => EvalValue::Value(state.get(ns, rest).unwrap_or(Value::Null)),
                None => EvalValue::Value(Value::Null),
            }
        }
        "context" => {
            let value = entry
                .namespace
                .as_deref()
                .and_then(|ns| scope.context(ns).cloned())
                .and_then(|cell| cell.get(rest, state));
            EvalValue::Value(value.unwrap_or(Value::Null))
        }
        "actions" | "callbacks" => {
            let found = entry
                .namespace
                .as_deref()
                .and_then(|ns| actions.get(ns, reference).map(|action| (ns, action)));
            match found {
                Some((ns, action)) => EvalValue::Action {
                    action,
                    namespace: ns.to_string(),
                    reference: reference.to_string(),
                },
                None => EvalValue::Value(Value::Null),
            }
        }
        _ => return Err(EvalError::UnknownReference(expr.to_string())),
    };

    if negations == 0 {
        return Ok(base);
    }
    let mut flag = match &base {
        EvalValue::Value(value) => truthy(value),
        EvalValue::Action { .. } => true,
    };
    if negations % 2 == 1 {
        flag = !flag;
    }
    Ok(EvalValue::Value(Value::Bool(flag)))
}

/// Evaluate an entry down to a plain value, invoking a callable result
/// with no event (derived-state getters).
pub fn resolve(
    entry: &DirectiveEntry,
    scope: &Scope,
    state: &mut StateGraph,
    actions: &ActionTable,
) -> Result<Value, EvalError> {
    match evaluate(entry, scope, state, actions)? {
        EvalValue::Value(value) => Ok(value),
        EvalValue::Action {
            action, namespace, ..
        } => {
            let mut call = ActionCall {
                state,
                scope,
                event: None,
                namespace,
            };
            match action.call(&mut call) {
                ActionOutcome::Value(value) => Ok(value),
                ActionOutcome::Cleanup(_) | ActionOutcome::None => Ok(Value::Null),
            }
        }
    }
}
