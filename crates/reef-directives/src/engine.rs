//! The render engine.
//!
//! Owns the state graph, the action table and per-node storage, and
//! drives directive dispatch over translated trees. One engine serves
//! every island on a page; slots are keyed by virtual-node identity and
//! grouped under the island root that produced them, so re-rendering
//! one island never unmounts another.

use crate::actions::{Action, ActionCall, ActionOutcome, ActionTable};
use crate::builtins::register_builtins;
use crate::evaluate::{EvalValue, evaluate};
use crate::events::{Event, EventGuard, Listener, ListenerMode};
use crate::registry::DirectiveRegistry;
use crate::render::{DomPatch, RenderChild, RenderChildren, RenderNode, RenderOutput};
use crate::scope::{ContextCell, Scope};
use reef_state::{StateGraph, SubscriptionId};
use reef_vdom::{Child, Children, DirectiveEntry, VNode};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

/// What kind of effect a directive queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectKind {
    /// Runs once when the node mounts; an optional cleanup runs on
    /// unmount.
    Init,
    /// Runs on mount with dependency tracking and re-runs whenever a
    /// tracked path changes.
    Watch,
}

/// An effect collected during a render pass, paired to its persistent
/// slot by `(node, index)`.
pub(crate) struct PendingEffect {
    pub node: usize,
    pub index: usize,
    pub kind: EffectKind,
    pub entry: DirectiveEntry,
    pub scope: Scope,
}

/// Event target for window/document-level listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalTarget {
    Window,
    Document,
}

pub(crate) struct GlobalListener {
    pub target: GlobalTarget,
    pub event: String,
    pub listener: Listener,
}

/// Persistent per-node storage, kept across render passes for as long
/// as the node stays mounted.
#[derive(Default)]
pub struct NodeSlot {
    /// Context cell introduced by this node's context provider.
    pub context_cell: Option<ContextCell>,
    /// Matching read-only server context snapshot.
    pub context_server: Option<Rc<Value>>,
    /// Per-item context cells of a list directive, keyed by the
    /// serialized item key so identity survives reorders.
    pub each_cells: HashMap<String, ContextCell>,
    pub(crate) global_listeners: Vec<GlobalListener>,
    /// Whether the node has completed a render pass.
    pub mounted: bool,
    root: usize,
}

struct EffectSlot {
    kind: EffectKind,
    entry: DirectiveEntry,
    scope: Scope,
    subscription: Option<SubscriptionId>,
    cleanup: Option<Action>,
}

struct DeferredTask {
    listener: Listener,
    event: Event,
}

/// Watch re-run rounds allowed per flush before assuming a cycle.
const MAX_FLUSH_ROUNDS: usize = 100;

pub struct Engine {
    pub registry: DirectiveRegistry,
    pub actions: ActionTable,
    pub state: StateGraph,
    slots: HashMap<usize, NodeSlot>,
    effect_slots: HashMap<(usize, usize), EffectSlot>,
    deferred: VecDeque<DeferredTask>,
    next_cell_id: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with the built-in directives registered.
    pub fn new() -> Self {
        let mut registry = DirectiveRegistry::new();
        register_builtins(&mut registry);
        Self {
            registry,
            actions: ActionTable::new(),
            state: StateGraph::new(),
            slots: HashMap::new(),
            effect_slots: HashMap::new(),
            deferred: VecDeque::new(),
            next_cell_id: 0,
        }
    }

    /// Render one island root.
    ///
    /// Dispatches directives over the subtree, mounts and unmounts node
    /// slots, runs newly mounted effects, and returns the render tree
    /// plus the hydration patches to apply to the live DOM. A list
    /// directive's generated fragments appear as the template node's
    /// children; the host renders them in the template's place.
    pub fn render(&mut self, root: &Rc<VNode>, scope: &Scope) -> RenderOutput {
        let root_ptr = Rc::as_ptr(root) as usize;
        let mut visited = HashSet::new();
        let mut effects = Vec::new();
        let mut patches = Vec::new();
        let children =
            self.render_node(root, scope, root_ptr, &mut visited, &mut effects, &mut patches);
        self.unmount_stale(root_ptr, &visited);
        for ptr in &visited {
            if let Some(slot) = self.slots.get_mut(ptr) {
                slot.mounted = true;
            }
        }
        // Visited nodes re-report their effects every pass; a slot they
        // stopped reporting (a removed list item's init) unmounts now.
        let reported: HashSet<(usize, usize)> = effects.iter().map(|e| (e.node, e.index)).collect();
        let dropped: Vec<(usize, usize)> = self
            .effect_slots
            .keys()
            .filter(|(node, _)| visited.contains(node))
            .filter(|key| !reported.contains(key))
            .copied()
            .collect();
        for key in dropped {
            if let Some(mut slot) = self.effect_slots.remove(&key) {
                self.run_effect_cleanup(&mut slot);
                if let Some(id) = slot.subscription {
                    self.state.unsubscribe(id);
                }
            }
        }
        self.commit_effects(effects);
        RenderOutput { children, patches }
    }

    fn render_node(
        &mut self,
        vnode: &Rc<VNode>,
        scope: &Scope,
        root: usize,
        visited: &mut HashSet<usize>,
        effects: &mut Vec<PendingEffect>,
        patches: &mut Vec<DomPatch>,
    ) -> Vec<RenderChild> {
        let Some(directives) = vnode.directives.as_ref() else {
            let mut node = RenderNode::from_vnode(vnode);
            node.children = self.render_children(vnode, scope, root, visited, effects, patches);
            return vec![RenderChild::Node(node)];
        };

        let ptr = Rc::as_ptr(vnode) as usize;
        visited.insert(ptr);
        let mut slot = self.slots.remove(&ptr).unwrap_or_else(|| NodeSlot {
            root,
            ..NodeSlot::default()
        });
        let first_mount = !slot.mounted;

        let handlers = self.registry.matching(directives);
        let mut node = RenderNode::from_vnode(vnode);
        let mut local_scope = scope.clone();
        let mut each_items = None;
        let mut suppressed = false;

        for (name, run) in handlers {
            let Some(entries) = directives.get(&name) else {
                continue;
            };
            let mut args = crate::registry::DirectiveArgs {
                node: &mut node,
                entries,
                directives,
                scope: &mut local_scope,
                state: &mut self.state,
                actions: &self.actions,
                slot: &mut slot,
                effects: &mut *effects,
                patches: &mut *patches,
                each_items: &mut each_items,
                suppressed: &mut suppressed,
                next_cell_id: &mut self.next_cell_id,
                node_ptr: ptr,
                first_mount,
            };
            if let Err(err) = run(&mut args) {
                tracing::warn!("directive '{name}' failed: {err}");
            }
        }

        self.slots.insert(ptr, slot);
        if suppressed {
            return Vec::new();
        }

        if let Some(items) = each_items {
            let content = vnode.content.clone().unwrap_or_default();
            let mut fragments = Vec::new();
            for item in items {
                for child in &content {
                    match child {
                        Child::Text(text) => fragments.push(RenderChild::Text(text.clone())),
                        Child::Node(child_node) => {
                            let mut rendered = self.render_node(
                                child_node,
                                &item.scope,
                                root,
                                visited,
                                effects,
                                patches,
                            );
                            for fragment in &mut rendered {
                                if let RenderChild::Node(n) = fragment {
                                    n.key = Some(item.key.clone());
                                }
                            }
                            fragments.append(&mut rendered);
                        }
                    }
                }
            }
            node.children = RenderChildren::Nodes(fragments);
        } else if matches!(node.children, RenderChildren::Inherit) {
            node.children =
                self.render_children(vnode, &local_scope, root, visited, effects, patches);
        }
        vec![RenderChild::Node(node)]
    }

    fn render_children(
        &mut self,
        vnode: &Rc<VNode>,
        scope: &Scope,
        root: usize,
        visited: &mut HashSet<usize>,
        effects: &mut Vec<PendingEffect>,
        patches: &mut Vec<DomPatch>,
    ) -> RenderChildren {
        match &vnode.children {
            Children::RawHtml(html) => RenderChildren::RawHtml(html.clone()),
            Children::Nodes(children) => {
                let mut out = Vec::new();
                for child in children {
                    match child {
                        Child::Text(text) => out.push(RenderChild::Text(text.clone())),
                        Child::Node(child_node) => out.append(&mut self.render_node(
                            child_node,
                            scope,
                            root,
                            visited,
                            effects,
                            patches,
                        )),
                    }
                }
                RenderChildren::Nodes(out)
            }
        }
    }

    fn unmount_stale(&mut self, root: usize, visited: &HashSet<usize>) {
        let stale: Vec<usize> = self
            .slots
            .iter()
            .filter(|(ptr, slot)| slot.root == root && slot.mounted && !visited.contains(ptr))
            .map(|(ptr, _)| *ptr)
            .collect();
        for ptr in stale {
            self.slots.remove(&ptr);
            let dead: Vec<(usize, usize)> = self
                .effect_slots
                .keys()
                .filter(|(node, _)| *node == ptr)
                .copied()
                .collect();
            for key in dead {
                if let Some(mut slot) = self.effect_slots.remove(&key) {
                    self.run_effect_cleanup(&mut slot);
                    if let Some(id) = slot.subscription {
                        self.state.unsubscribe(id);
                    }
                }
            }
        }
    }

    fn commit_effects(&mut self, pending: Vec<PendingEffect>) {
        for effect in pending {
            let key = (effect.node, effect.index);
            // Init runs once; watch re-runs are subscription-driven.
            if self.effect_slots.contains_key(&key) {
                continue;
            }
            let mut slot = EffectSlot {
                kind: effect.kind,
                entry: effect.entry,
                scope: effect.scope,
                subscription: None,
                cleanup: None,
            };
            self.run_effect(&mut slot);
            self.effect_slots.insert(key, slot);
        }
    }

    fn run_effect(&mut self, slot: &mut EffectSlot) {
        if slot.kind == EffectKind::Watch {
            self.state.start_tracking();
        }
        let evaluated = evaluate(&slot.entry, &slot.scope, &mut self.state, &self.actions);
        let outcome = match evaluated {
            Ok(EvalValue::Action {
                action, namespace, ..
            }) => {
                let mut call = ActionCall {
                    state: &mut self.state,
                    scope: &slot.scope,
                    event: None,
                    namespace,
                };
                action.call(&mut call)
            }
            Ok(EvalValue::Value(_)) => ActionOutcome::None,
            Err(err) => {
                tracing::warn!("effect failed to evaluate: {err}");
                ActionOutcome::None
            }
        };
        if slot.kind == EffectKind::Watch {
            let deps = self.state.take_tracked();
            match slot.subscription {
                Some(id) => self.state.resubscribe(id, deps),
                None => slot.subscription = Some(self.state.subscribe(deps)),
            }
        }
        slot.cleanup = match outcome {
            ActionOutcome::Cleanup(action) => Some(action),
            _ => None,
        };
    }

    fn run_effect_cleanup(&mut self, slot: &mut EffectSlot) {
        if let Some(action) = slot.cleanup.take() {
            let namespace = slot.entry.namespace.clone().unwrap_or_default();
            let mut call = ActionCall {
                state: &mut self.state,
                scope: &slot.scope,
                event: None,
                namespace,
            };
            action.call(&mut call);
        }
    }

    /// Re-run watch effects whose dependencies changed. Returns true if
    /// any ran. Loops until the graph settles (writes from one watcher
    /// may dirty another), bounded to catch self-triggering cycles.
    pub fn flush_watchers(&mut self) -> bool {
        let mut ran = false;
        for round in 0.. {
            let dirty = self.state.take_dirty();
            if dirty.is_empty() {
                break;
            }
            if round == MAX_FLUSH_ROUNDS {
                tracing::warn!("watch effects did not settle; possible update cycle");
                break;
            }
            let mut keys: Vec<(usize, usize)> = self
                .effect_slots
                .iter()
                .filter(|(_, slot)| slot.subscription.is_some_and(|id| dirty.contains(&id)))
                .map(|(key, _)| *key)
                .collect();
            keys.sort_unstable();
            for key in keys {
                let Some(mut slot) = self.effect_slots.remove(&key) else {
                    continue;
                };
                self.run_effect_cleanup(&mut slot);
                self.run_effect(&mut slot);
                self.effect_slots.insert(key, slot);
                ran = true;
            }
        }
        ran
    }

    /// Dispatch an event to a rendered node's listeners. Sync listeners
    /// run inline; async listeners are deferred past the current task
    /// boundary and run on the next [`Engine::flush_deferred`].
    pub fn dispatch(&mut self, node: &RenderNode, event: &Event) {
        let listeners: Vec<Listener> = node.listeners_for(&event.name).to_vec();
        self.dispatch_to(listeners, event);
    }

    /// Dispatch an event to window/document-level listeners.
    pub fn dispatch_global(&mut self, target: GlobalTarget, event: &Event) {
        let listeners: Vec<Listener> = self
            .slots
            .values()
            .flat_map(|slot| {
                slot.global_listeners
                    .iter()
                    .filter(|g| g.target == target && g.event == event.name)
                    .map(|g| g.listener.clone())
            })
            .collect();
        self.dispatch_to(listeners, event);
    }

    fn dispatch_to(&mut self, listeners: Vec<Listener>, event: &Event) {
        for listener in listeners {
            if event.immediate_propagation_stopped() {
                break;
            }
            match listener.mode {
                ListenerMode::Sync => self.run_listener(&listener, event),
                ListenerMode::Async => self.deferred.push_back(DeferredTask {
                    listener,
                    event: event.clone(),
                }),
            }
        }
    }

    /// Run all deferred async handlers. Returns how many ran.
    pub fn flush_deferred(&mut self) -> usize {
        let mut count = 0;
        while let Some(task) = self.deferred.pop_front() {
            self.run_listener(&task.listener, &task.event);
            count += 1;
        }
        count
    }

    fn run_listener(&mut self, listener: &Listener, event: &Event) {
        let evaluated = evaluate(
            &listener.entry,
            &listener.scope,
            &mut self.state,
            &self.actions,
        );
        match evaluated {
            Ok(EvalValue::Action {
                action, namespace, ..
            }) => {
                // The action's sync marker decides event access, not the
                // dispatch path it arrived through.
                let guard = EventGuard::new(event, action.is_sync());
                let mut call = ActionCall {
                    state: &mut self.state,
                    scope: &listener.scope,
                    event: Some(guard),
                    namespace,
                };
                action.call(&mut call);
            }
            Ok(EvalValue::Value(Value::Null)) => {}
            Ok(EvalValue::Value(_)) => {
                tracing::warn!("event handler expression did not resolve to an action");
            }
            Err(err) => tracing::warn!("event handler failed to evaluate: {err}"),
        }
    }

    /// Whether any reactive or deferred work is outstanding.
    pub fn has_pending(&self) -> bool {
        self.state.has_dirty() || !self.deferred.is_empty()
    }
}
