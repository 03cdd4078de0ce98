//! Evaluation scopes and local context cells.

use reef_state::{PathKey, StateGraph, deep_merge, ensure_path, lookup_path};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A per-node context store.
///
/// Cells live as long as the node that introduced them and are shared by
/// the node's subtree. Reads and writes go through the state graph's
/// tracking machinery so watch effects depending on context re-run; each
/// cell gets a synthetic namespace (`#ctx<N>`) that can never collide
/// with a real store namespace.
#[derive(Debug, Clone)]
pub struct ContextCell {
    id: u64,
    value: Rc<RefCell<Value>>,
}

impl ContextCell {
    pub fn new(id: u64, seed: Value) -> Self {
        Self {
            id,
            value: Rc::new(RefCell::new(seed)),
        }
    }

    fn key(&self, path: &str) -> PathKey {
        PathKey::new(format!("#ctx{}", self.id), path)
    }

    /// Read a dotted path, recording the access for dependency tracking.
    pub fn get(&self, path: &str, state: &mut StateGraph) -> Option<Value> {
        state.record(self.key(path));
        lookup_path(&self.value.borrow(), path).cloned()
    }

    /// Read a dotted path without recording the access.
    pub fn peek(&self, path: &str) -> Option<Value> {
        lookup_path(&self.value.borrow(), path).cloned()
    }

    /// Write a dotted path and invalidate overlapping subscriptions.
    pub fn set(&self, path: &str, value: Value, state: &mut StateGraph) {
        {
            let mut root = self.value.borrow_mut();
            match ensure_path(&mut root, path) {
                Some(slot) => *slot = value,
                None => {
                    tracing::warn!("cannot write through non-object in context at {path}");
                    return;
                }
            }
        }
        state.invalidate(&self.key(path));
    }

    /// Merge an object into the cell without overwriting existing keys.
    /// Merging never invalidates: present keys are untouched and new keys
    /// cannot have been read yet.
    pub fn merge_defaults(&self, source: &Value) {
        deep_merge(&mut self.value.borrow_mut(), source, false);
    }

    /// A deep copy of the whole cell value.
    pub fn snapshot(&self) -> Value {
        self.value.borrow().clone()
    }
}

/// The lexical scope a directive evaluates in: per-namespace context
/// cells plus their read-only server-provided counterparts.
///
/// Scopes are cheap to clone (cells are shared) and extended
/// copy-on-write as the render pass descends into context providers.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    client: HashMap<String, ContextCell>,
    server: HashMap<String, Rc<Value>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The context cell visible for a namespace, if any provider above
    /// introduced one.
    pub fn context(&self, namespace: &str) -> Option<&ContextCell> {
        self.client.get(namespace)
    }

    /// The server-provided context for a namespace.
    pub fn server_context(&self, namespace: &str) -> Option<&Rc<Value>> {
        self.server.get(namespace)
    }

    /// A copy of this scope with one namespace rebound to a new cell and
    /// server snapshot.
    pub fn with_context(&self, namespace: &str, cell: ContextCell, server: Rc<Value>) -> Scope {
        let mut next = self.clone();
        next.client.insert(namespace.to_string(), cell);
        next.server.insert(namespace.to_string(), server);
        next
    }
}
