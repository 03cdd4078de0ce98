//! Reef Runtime - boots interactivity over a server-rendered document
//!
//! Parses the initial markup, ingests the embedded server payload,
//! hydrates every top-level island through the directive engine, and
//! exposes the live document as a render host the navigation router can
//! drive.

mod host;

use reef_directives::{Engine, Event, RenderChild, RenderChildren, RenderNode, RenderOutput, Scope, apply_patches};
use reef_dom::{Document, NodeId};
use reef_html::parse_document;
use reef_vdom::{Child, DirectiveSchema, NodeCache, VNode, translate};
use std::collections::HashSet;
use std::rc::Rc;

/// One hydrated island: its live root element, translated tree and the
/// latest render output.
pub struct Island {
    pub dom: NodeId,
    pub root: Rc<VNode>,
    pub output: RenderOutput,
}

/// Settle rounds allowed per tick before assuming an update cycle.
const MAX_TICK_ROUNDS: usize = 100;

pub struct Runtime {
    prefix: String,
    schema: DirectiveSchema,
    base_url: String,
    pub doc: Document,
    pub engine: Engine,
    cache: NodeCache,
    islands: Vec<Island>,
    applied_styles: HashSet<String>,
    // User-agent surface: the embedding shell polls these after ticks.
    pub current_url: String,
    pub loading: bool,
    pub announcements: Vec<String>,
    pub pending_reload: Option<String>,
    pub scroll_target: Option<String>,
}

impl Runtime {
    /// Parse the initial document, ingest its server payload and
    /// hydrate every top-level island.
    pub fn boot(html: &str, base_url: &str, prefix: &str) -> Runtime {
        let doc = parse_document(html, base_url);
        let mut engine = Engine::new();
        ingest_payload(&mut engine, &doc, prefix);
        let mut runtime = Runtime {
            prefix: prefix.to_string(),
            schema: DirectiveSchema::new(prefix),
            base_url: base_url.to_string(),
            doc,
            engine,
            cache: NodeCache::new(),
            islands: Vec::new(),
            applied_styles: HashSet::new(),
            current_url: base_url.to_string(),
            loading: false,
            announcements: Vec::new(),
            pending_reload: None,
            scroll_target: None,
        };
        runtime.seed_applied_styles();
        runtime.hydrate();
        runtime
    }

    pub fn islands(&self) -> &[Island] {
        &self.islands
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether the server disabled client-side navigation for this
    /// session.
    pub fn client_navigation_disabled(&self) -> bool {
        self.engine
            .state
            .config(&format!("{}/router", self.prefix))
            .and_then(|config| config.get("clientNavigationDisabled"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Translate and render every top-level island, applying the
    /// hydration patches to the live document.
    fn hydrate(&mut self) {
        let island_attr = self.schema.island_attr().to_string();
        let all = self.doc.query_selector_all(&format!("[{island_attr}]"));
        let top_level: Vec<NodeId> = all
            .iter()
            .copied()
            .filter(|&id| !self.has_marked_ancestor(id, &island_attr))
            .collect();

        for id in top_level {
            let outcome = translate(&mut self.doc, id, &self.schema, &mut self.cache);
            let Some(root) = outcome.children.into_iter().find_map(|child| match child {
                Child::Node(node) => Some(node),
                _ => None,
            }) else {
                continue;
            };
            let output = self.engine.render(&root, &Scope::new());
            apply_patches(&mut self.doc, &output.patches);
            self.islands.push(Island {
                dom: id,
                root,
                output,
            });
        }
    }

    fn has_marked_ancestor(&self, id: NodeId, attr: &str) -> bool {
        let mut current = self.doc.tree().get(id).map(|n| n.parent);
        while let Some(parent) = current {
            if parent.is_none() {
                return false;
            }
            if self.doc.element(parent).is_some_and(|el| el.has_attr(attr)) {
                return true;
            }
            current = self.doc.tree().get(parent).map(|n| n.parent);
        }
        false
    }

    /// Dispatch an event at a live element. Returns false when no
    /// hydrated node listens there. Deferred handlers and watchers run
    /// on the next [`Runtime::tick`].
    pub fn dispatch(&mut self, target: NodeId, event: &Event) -> bool {
        let mut hit = false;
        for island in &self.islands {
            if let Some(node) = find_by_dom(&island.output.children, target) {
                self.engine.dispatch(node, event);
                hit = true;
            }
        }
        hit
    }

    /// Settle all reactive work and refresh the islands' render trees.
    pub fn tick(&mut self) {
        self.engine.flush_deferred();
        let mut rounds = 0;
        while self.engine.has_pending() {
            if rounds == MAX_TICK_ROUNDS {
                tracing::warn!("reactive work did not settle; possible update cycle");
                break;
            }
            self.engine.flush_watchers();
            self.engine.flush_deferred();
            rounds += 1;
        }
        for island in &mut self.islands {
            let output = self.engine.render(&island.root, &Scope::new());
            apply_patches(&mut self.doc, &output.patches);
            island.output = output;
        }
    }
}

/// Find a rendered node by its source DOM id.
fn find_by_dom<'a>(children: &'a [RenderChild], target: NodeId) -> Option<&'a RenderNode> {
    for child in children {
        if let RenderChild::Node(node) = child {
            if node.dom == target {
                return Some(node);
            }
            if let RenderChildren::Nodes(inner) = &node.children {
                if let Some(found) = find_by_dom(inner, target) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Merge the embedded `{prefix}-interactivity-data` payload into the
/// engine: per-namespace server state and configuration.
fn ingest_payload(engine: &mut Engine, doc: &Document, prefix: &str) {
    let Some(node) = doc.query_selector(&format!("#{prefix}-interactivity-data")) else {
        return;
    };
    let payload: serde_json::Value = match serde_json::from_str(&doc.text_content(node)) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("interactivity payload is not valid JSON: {err}");
            return;
        }
    };
    merge_payload(engine, &payload);
}

/// Merge a `{ state, config }` payload into the engine, per namespace.
pub(crate) fn merge_payload(engine: &mut Engine, payload: &serde_json::Value) {
    if let Some(state) = payload.get("state").and_then(|v| v.as_object()) {
        for (namespace, value) in state {
            engine.state.merge_server(namespace, value);
        }
    }
    if let Some(config) = payload.get("config").and_then(|v| v.as_object()) {
        for (namespace, value) in config {
            engine.state.merge_config(namespace, value);
        }
    }
}
