//! Events and the async-handler access guard.

use crate::scope::Scope;
use reef_dom::NodeId;
use reef_vdom::DirectiveEntry;
use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;

/// A dispatched event. Flag cells are shared between clones so a
/// deferred copy of the event observes cancellation state.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub detail: Value,
    pub target: NodeId,
    prevented: Rc<Cell<bool>>,
    stopped: Rc<Cell<bool>>,
    stopped_immediate: Rc<Cell<bool>>,
}

impl Event {
    pub fn new(name: impl Into<String>, detail: Value, target: NodeId) -> Self {
        Self {
            name: name.into(),
            detail,
            target,
            prevented: Rc::new(Cell::new(false)),
            stopped: Rc::new(Cell::new(false)),
            stopped_immediate: Rc::new(Cell::new(false)),
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.prevented.get()
    }

    pub fn propagation_stopped(&self) -> bool {
        self.stopped.get()
    }

    pub fn immediate_propagation_stopped(&self) -> bool {
        self.stopped_immediate.get()
    }
}

/// Guarded view of an event handed to an action.
///
/// Only actions that opted into synchronous event access get it;
/// everyone else can still read payload fields, but transient state
/// (current target, cancellation) may have collapsed by the time the
/// handler runs, so touching it logs a warning pointing at the opt-in.
pub struct EventGuard<'a> {
    event: &'a Event,
    sync_access: bool,
}

impl<'a> EventGuard<'a> {
    pub fn new(event: &'a Event, sync_access: bool) -> Self {
        Self { event, sync_access }
    }

    /// Whether the handler may touch transient event state without a
    /// warning.
    pub fn has_sync_access(&self) -> bool {
        self.sync_access
    }

    /// Payload fields stay readable from deferred handlers.
    pub fn name(&self) -> &str {
        &self.event.name
    }

    pub fn detail(&self) -> &Value {
        &self.event.detail
    }

    fn check(&self, what: &str) {
        if !self.sync_access {
            tracing::warn!(
                "`{what}` accessed after the handler yielded; use a sync action \
                 if the handler needs synchronous event access"
            );
        }
    }

    pub fn current_target(&self) -> NodeId {
        self.check("event.currentTarget");
        self.event.target
    }

    pub fn prevent_default(&self) {
        self.check("event.preventDefault");
        self.event.prevented.set(true);
    }

    pub fn stop_propagation(&self) {
        self.check("event.stopPropagation");
        self.event.stopped.set(true);
    }

    pub fn stop_immediate_propagation(&self) {
        self.check("event.stopImmediatePropagation");
        self.event.stopped_immediate.set(true);
    }
}

/// How a listener's handler relates to the dispatching task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerMode {
    /// Runs inside the dispatch.
    Sync,
    /// Deferred past the current task boundary.
    Async,
}

/// One attached event listener: the handler reference plus the scope it
/// was attached in.
#[derive(Debug, Clone)]
pub struct Listener {
    pub entry: DirectiveEntry,
    pub scope: Scope,
    pub mode: ListenerMode,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cancellation_shared_between_clones() {
        let event = Event::new("click", json!(null), NodeId::NONE);
        let copy = event.clone();
        EventGuard::new(&event, true).prevent_default();
        assert!(copy.default_prevented());
    }

    #[test]
    fn test_guard_still_sets_flags_without_sync_access() {
        let event = Event::new("submit", json!(null), NodeId::NONE);
        let guard = EventGuard::new(&event, false);
        guard.stop_propagation();
        assert!(event.propagation_stopped());
        assert_eq!(guard.name(), "submit");
    }
}
