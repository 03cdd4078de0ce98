//! Reef State - observable state graph
//!
//! Explicit observable-object abstraction replacing proxy-based state
//! interception: values are addressed by `(namespace, dotted path)`,
//! reads made inside a tracking frame are recorded, and writes mark
//! overlapping subscriptions dirty. The host render loop drains dirty
//! subscriptions and re-runs the corresponding effects; no callbacks are
//! stored inside the graph, so notification can never re-enter it.

mod merge;
mod path;

pub use merge::deep_merge;
pub use path::{ensure_path, lookup_path};

use serde_json::Value;
use std::collections::HashMap;

/// A tracked location: one namespace plus a dotted path inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathKey {
    pub namespace: String,
    pub path: String,
}

impl PathKey {
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }

    /// Two keys overlap when they share a namespace and one dotted path
    /// is a segment-prefix of the other (`a.b` overlaps `a.b.c` and `a`).
    pub fn overlaps(&self, other: &PathKey) -> bool {
        if self.namespace != other.namespace {
            return false;
        }
        let (short, long) = if self.path.len() <= other.path.len() {
            (&self.path, &other.path)
        } else {
            (&other.path, &self.path)
        };
        // An empty path addresses the whole namespace.
        short.is_empty()
            || long == short
            || (long.starts_with(short.as_str()) && long.as_bytes()[short.len()] == b'.')
    }
}

/// Identifier of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug)]
struct Subscription {
    id: SubscriptionId,
    paths: Vec<PathKey>,
    dirty: bool,
}

/// The process-wide reactive state graph.
#[derive(Debug, Default)]
pub struct StateGraph {
    client: HashMap<String, Value>,
    server: HashMap<String, Value>,
    config: HashMap<String, Value>,
    tracking: Vec<Vec<PathKey>>,
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value, recording the access in the active tracking frame.
    pub fn get(&mut self, namespace: &str, path: &str) -> Option<Value> {
        self.record(PathKey::new(namespace, path));
        self.peek(namespace, path).cloned()
    }

    /// Read a value without recording the access.
    pub fn peek(&self, namespace: &str, path: &str) -> Option<&Value> {
        lookup_path(self.client.get(namespace)?, path)
    }

    /// Read from the read-only server copy.
    pub fn peek_server(&self, namespace: &str, path: &str) -> Option<&Value> {
        lookup_path(self.server.get(namespace)?, path)
    }

    /// Write a value, creating intermediate objects and marking
    /// overlapping subscriptions dirty.
    pub fn set(&mut self, namespace: &str, path: &str, value: Value) {
        let root = self
            .client
            .entry(namespace.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(slot) = ensure_path(root, path) {
            *slot = value;
            self.invalidate(&PathKey::new(namespace, path));
        } else {
            tracing::warn!("cannot write through non-object at {namespace}::{path}");
        }
    }

    /// Mark subscriptions overlapping `key` dirty. Exposed so external
    /// stores (context cells) can reuse the same invalidation machinery.
    pub fn invalidate(&mut self, key: &PathKey) {
        for sub in &mut self.subscriptions {
            if !sub.dirty && sub.paths.iter().any(|p| p.overlaps(key)) {
                sub.dirty = true;
            }
        }
    }

    /// Record an access in the active tracking frame, if any.
    pub fn record(&mut self, key: PathKey) {
        if let Some(frame) = self.tracking.last_mut() {
            if !frame.contains(&key) {
                frame.push(key);
            }
        }
    }

    /// Open a dependency-tracking frame.
    pub fn start_tracking(&mut self) {
        self.tracking.push(Vec::new());
    }

    /// Close the innermost tracking frame and return the recorded paths.
    pub fn take_tracked(&mut self) -> Vec<PathKey> {
        self.tracking.pop().unwrap_or_default()
    }

    /// Subscribe to a set of paths.
    pub fn subscribe(&mut self, paths: Vec<PathKey>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            paths,
            dirty: false,
        });
        id
    }

    /// Replace the recorded paths of an existing subscription.
    pub fn resubscribe(&mut self, id: SubscriptionId, paths: Vec<PathKey>) {
        if let Some(sub) = self.subscriptions.iter_mut().find(|s| s.id == id) {
            sub.paths = paths;
        }
    }

    /// Drop a subscription.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscriptions.retain(|s| s.id != id);
    }

    /// Drain the ids of all dirty subscriptions.
    pub fn take_dirty(&mut self) -> Vec<SubscriptionId> {
        let mut dirty = Vec::new();
        for sub in &mut self.subscriptions {
            if sub.dirty {
                sub.dirty = false;
                dirty.push(sub.id);
            }
        }
        dirty
    }

    /// Whether any subscription is dirty.
    pub fn has_dirty(&self) -> bool {
        self.subscriptions.iter().any(|s| s.dirty)
    }

    /// Merge server-provided state: the server copy is overwritten, the
    /// client copy only gains keys it does not already have.
    pub fn merge_server(&mut self, namespace: &str, value: &Value) {
        let server = self
            .server
            .entry(namespace.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        deep_merge(server, value, true);
        let client = self
            .client
            .entry(namespace.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        deep_merge(client, value, false);
        self.invalidate(&PathKey::new(namespace, ""));
    }

    /// Per-namespace configuration (read-only, server-provided).
    pub fn config(&self, namespace: &str) -> Option<&Value> {
        self.config.get(namespace)
    }

    /// Merge per-namespace configuration.
    pub fn merge_config(&mut self, namespace: &str, value: &Value) {
        let config = self
            .config
            .entry(namespace.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        deep_merge(config, value, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_then_get() {
        let mut state = StateGraph::new();
        state.set("shop", "cart.count", json!(2));
        assert_eq!(state.get("shop", "cart.count"), Some(json!(2)));
        assert_eq!(state.get("shop", "cart"), Some(json!({ "count": 2 })));
        assert_eq!(state.get("shop", "missing"), None);
    }

    #[test]
    fn test_overlap_is_segment_wise() {
        let a = PathKey::new("ns", "cart.count");
        assert!(a.overlaps(&PathKey::new("ns", "cart")));
        assert!(a.overlaps(&PathKey::new("ns", "cart.count")));
        assert!(!a.overlaps(&PathKey::new("ns", "cartoon")));
        assert!(!a.overlaps(&PathKey::new("other", "cart.count")));
    }

    #[test]
    fn test_tracking_records_reads() {
        let mut state = StateGraph::new();
        state.set("shop", "open", json!(true));
        state.start_tracking();
        let _ = state.get("shop", "open");
        let _ = state.peek("shop", "open"); // peek is untracked
        let tracked = state.take_tracked();
        assert_eq!(tracked, vec![PathKey::new("shop", "open")]);
    }

    #[test]
    fn test_write_marks_overlapping_subscription_dirty() {
        let mut state = StateGraph::new();
        let sub = state.subscribe(vec![PathKey::new("shop", "cart.count")]);
        let other = state.subscribe(vec![PathKey::new("shop", "user.name")]);

        state.set("shop", "cart", json!({ "count": 3 }));
        let dirty = state.take_dirty();
        assert_eq!(dirty, vec![sub]);
        assert!(state.take_dirty().is_empty());

        state.set("shop", "user.name.first", json!("a"));
        assert_eq!(state.take_dirty(), vec![other]);
    }

    #[test]
    fn test_merge_server_preserves_client_keys() {
        let mut state = StateGraph::new();
        state.set("shop", "open", json!(true));
        state.merge_server("shop", &json!({ "open": false, "items": [1, 2] }));
        // Client keeps the runtime value, gains the new key.
        assert_eq!(state.peek("shop", "open"), Some(&json!(true)));
        assert_eq!(state.peek("shop", "items"), Some(&json!([1, 2])));
        // Server copy is authoritative.
        assert_eq!(state.peek_server("shop", "open"), Some(&json!(false)));
    }
}
