//! Directive registry and handler interface.

use crate::actions::ActionTable;
use crate::engine::{EffectKind, NodeSlot, PendingEffect};
use crate::evaluate::{EvalError, EvalValue, evaluate, resolve};
use crate::render::{DomPatch, RenderNode};
use crate::scope::{ContextCell, Scope};
use reef_state::StateGraph;
use reef_vdom::{DirectiveEntry, DirectiveMap};
use serde_json::Value;
use std::rc::Rc;

/// Priority assigned when a directive registers without one.
pub const PRIORITY_DEFAULT: u8 = 10;

/// A directive handler. Returning an error skips this directive on this
/// node; the rest of the node's directives still run.
pub type DirectiveFn = Rc<dyn Fn(&mut DirectiveArgs<'_>) -> Result<(), EvalError>>;

struct Registered {
    name: String,
    priority: u8,
    run: DirectiveFn,
}

/// Registered directive handlers, dispatched in ascending priority
/// order (ties keep registration order).
#[derive(Default)]
pub struct DirectiveRegistry {
    handlers: Vec<Registered>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler with the default priority. Re-registering a
    /// name replaces the previous handler.
    pub fn register(&mut self, name: &str, run: DirectiveFn) {
        self.register_with_priority(name, PRIORITY_DEFAULT, run);
    }

    pub fn register_with_priority(&mut self, name: &str, priority: u8, run: DirectiveFn) {
        self.handlers.retain(|h| h.name != name);
        self.handlers.push(Registered {
            name: name.to_string(),
            priority,
            run,
        });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.iter().any(|h| h.name == name)
    }

    /// Handlers matching a node's directive map, in dispatch order.
    pub(crate) fn matching(&self, directives: &DirectiveMap) -> Vec<(String, DirectiveFn)> {
        let mut matched: Vec<&Registered> = self
            .handlers
            .iter()
            .filter(|h| directives.contains_key(&h.name))
            .collect();
        matched.sort_by_key(|h| h.priority);
        matched
            .into_iter()
            .map(|h| (h.name.clone(), Rc::clone(&h.run)))
            .collect()
    }
}

/// One item produced by a list directive: its identity key and the
/// scope its fragment renders in.
pub struct EachItem {
    pub key: Value,
    pub scope: Scope,
}

/// Everything a directive handler can see and touch while its node is
/// being rendered.
pub struct DirectiveArgs<'a> {
    /// The render node under construction.
    pub node: &'a mut RenderNode,
    /// Entries for this handler's directive name.
    pub entries: &'a [DirectiveEntry],
    /// All directives on the node.
    pub directives: &'a DirectiveMap,
    /// The scope the node renders in. Handlers may rebind it for the
    /// node's subtree.
    pub scope: &'a mut Scope,
    pub state: &'a mut StateGraph,
    pub actions: &'a ActionTable,
    /// Persistent per-node storage, kept across render passes.
    pub slot: &'a mut NodeSlot,
    pub(crate) effects: &'a mut Vec<PendingEffect>,
    pub patches: &'a mut Vec<DomPatch>,
    /// Set by list directives: per-item fragments replace the node's
    /// regular children.
    pub each_items: &'a mut Option<Vec<EachItem>>,
    /// Set to drop the node from the render tree entirely.
    pub suppressed: &'a mut bool,
    pub(crate) next_cell_id: &'a mut u64,
    pub(crate) node_ptr: usize,
    /// Whether this is the node's first render pass.
    pub first_mount: bool,
}

impl DirectiveArgs<'_> {
    pub fn evaluate(&mut self, entry: &DirectiveEntry) -> Result<EvalValue, EvalError> {
        evaluate(entry, self.scope, self.state, self.actions)
    }

    pub fn resolve(&mut self, entry: &DirectiveEntry) -> Result<Value, EvalError> {
        resolve(entry, self.scope, self.state, self.actions)
    }

    /// Allocate a fresh context cell.
    pub fn alloc_cell(&mut self, seed: Value) -> ContextCell {
        let id = *self.next_cell_id;
        *self.next_cell_id += 1;
        ContextCell::new(id, seed)
    }

    /// Queue an effect for this node, run by the engine after the pass
    /// commits.
    pub fn push_effect(&mut self, kind: EffectKind, entry: &DirectiveEntry) {
        let index = self
            .effects
            .iter()
            .filter(|e| e.node == self.node_ptr)
            .count();
        self.effects.push(PendingEffect {
            node: self.node_ptr,
            index,
            kind,
            entry: entry.clone(),
            scope: self.scope.clone(),
        });
    }
}
