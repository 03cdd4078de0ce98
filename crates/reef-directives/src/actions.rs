//! Host-registered actions and callbacks.
//!
//! Expressions cannot carry executable code across the DOM boundary, so
//! callable references (`actions.*`, `callbacks.*`) resolve against a
//! table the host populates before hydration.

use crate::events::EventGuard;
use crate::scope::Scope;
use reef_state::StateGraph;
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// What an action invocation produced.
pub enum ActionOutcome {
    /// A plain value (e.g. a derived-state getter).
    Value(Value),
    /// A cleanup action, returned by init and watch callbacks.
    Cleanup(Action),
    /// Nothing.
    None,
}

type ActionFn = Rc<dyn Fn(&mut ActionCall<'_>) -> ActionOutcome>;

/// One registered action or callback.
#[derive(Clone)]
pub struct Action {
    run: ActionFn,
    sync: bool,
}

impl Action {
    pub fn new(run: impl Fn(&mut ActionCall<'_>) -> ActionOutcome + 'static) -> Self {
        Self {
            run: Rc::new(run),
            sync: false,
        }
    }

    /// An action that has opted in to synchronous event access. Only
    /// these may touch transient event state from async listeners
    /// without a warning.
    pub fn new_sync(run: impl Fn(&mut ActionCall<'_>) -> ActionOutcome + 'static) -> Self {
        Self {
            run: Rc::new(run),
            sync: true,
        }
    }

    pub fn is_sync(&self) -> bool {
        self.sync
    }

    pub fn call(&self, call: &mut ActionCall<'_>) -> ActionOutcome {
        (self.run)(call)
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action").field("sync", &self.sync).finish()
    }
}

/// The environment an action runs in: the state graph, the lexical scope
/// of the node that referenced it, and (for event handlers) the guarded
/// event.
pub struct ActionCall<'a> {
    pub state: &'a mut StateGraph,
    pub scope: &'a Scope,
    pub event: Option<EventGuard<'a>>,
    /// Namespace of the referencing directive.
    pub namespace: String,
}

impl ActionCall<'_> {
    /// Tracked read from the caller's namespace state.
    pub fn state_get(&mut self, path: &str) -> Option<Value> {
        self.state.get(&self.namespace, path)
    }

    pub fn state_set(&mut self, path: &str, value: Value) {
        self.state.set(&self.namespace, path, value);
    }

    /// Tracked read from the nearest context cell of the caller's
    /// namespace.
    pub fn context_get(&mut self, path: &str) -> Option<Value> {
        self.scope
            .context(&self.namespace)?
            .clone()
            .get(path, self.state)
    }

    pub fn context_set(&mut self, path: &str, value: Value) {
        if let Some(cell) = self.scope.context(&self.namespace).cloned() {
            cell.set(path, value, self.state);
        } else {
            tracing::warn!(
                "no context provider for namespace '{}' in scope",
                self.namespace
            );
        }
    }
}

/// Actions and callbacks keyed by `(namespace, dotted reference)`.
#[derive(Default)]
pub struct ActionTable {
    map: HashMap<(String, String), Action>,
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under a full reference such as `actions.toggle` or
    /// `callbacks.logCount`.
    pub fn register(&mut self, namespace: &str, reference: &str, action: Action) {
        self.map
            .insert((namespace.to_string(), reference.to_string()), action);
    }

    pub fn get(&self, namespace: &str, reference: &str) -> Option<Action> {
        self.map
            .get(&(namespace.to_string(), reference.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_action_reads_and_writes_state() {
        let mut table = ActionTable::new();
        table.register(
            "shop",
            "actions.increment",
            Action::new(|call| {
                let n = call.state_get("count").and_then(|v| v.as_i64()).unwrap();
                call.state_set("count", json!(n + 1));
                ActionOutcome::None
            }),
        );

        let mut state = StateGraph::new();
        state.set("shop", "count", json!(1));
        let scope = Scope::new();
        let action = table.get("shop", "actions.increment").unwrap();
        let mut call = ActionCall {
            state: &mut state,
            scope: &scope,
            event: None,
            namespace: "shop".into(),
        };
        action.call(&mut call);
        assert_eq!(state.peek("shop", "count"), Some(&json!(2)));
    }
}
