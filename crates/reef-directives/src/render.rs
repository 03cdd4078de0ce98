//! Render-tree output and hydration patches.

use crate::events::Listener;
use indexmap::IndexMap;
use reef_dom::{Document, NodeId};
use reef_vdom::VNode;
use serde_json::Value;
use std::rc::Rc;

/// A child of a rendered node.
#[derive(Debug)]
pub enum RenderChild {
    Text(String),
    Node(RenderNode),
}

/// The children of a rendered node.
#[derive(Debug)]
pub enum RenderChildren {
    /// No directive overrode the children; the engine descends into the
    /// source node's children.
    Inherit,
    Nodes(Vec<RenderChild>),
    Text(String),
    /// Frozen markup of an ignored subtree.
    RawHtml(String),
    Empty,
}

/// One node of the render tree the host diffs against the DOM.
#[derive(Debug)]
pub struct RenderNode {
    pub tag: String,
    /// Rendered attribute/property values. Directive attributes are kept
    /// so re-renders over the same markup stay stable.
    pub props: IndexMap<String, Value>,
    pub children: RenderChildren,
    /// Event listeners grouped by event name, in attachment order.
    pub listeners: IndexMap<String, Vec<Listener>>,
    /// Identity key for list items.
    pub key: Option<Value>,
    /// The DOM node this render node hydrates.
    pub dom: NodeId,
    /// The virtual node this was rendered from.
    pub source: Rc<VNode>,
}

impl RenderNode {
    pub(crate) fn from_vnode(vnode: &Rc<VNode>) -> Self {
        let props = vnode
            .props
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();
        Self {
            tag: vnode.tag.clone(),
            props,
            children: RenderChildren::Inherit,
            listeners: IndexMap::new(),
            key: None,
            dom: vnode.dom,
            source: Rc::clone(vnode),
        }
    }

    /// Listeners attached for one event name.
    pub fn listeners_for(&self, event: &str) -> &[Listener] {
        self.listeners
            .get(event)
            .map(|l| l.as_slice())
            .unwrap_or(&[])
    }
}

/// A one-time DOM write emitted while hydrating: the server-rendered
/// markup disagreed with the evaluated directive value.
#[derive(Debug, Clone, PartialEq)]
pub enum DomPatch {
    AddClass { node: NodeId, class: String },
    RemoveClass { node: NodeId, class: String },
    SetStyleProperty { node: NodeId, name: String, value: String },
    RemoveStyleProperty { node: NodeId, name: String },
    SetProperty { node: NodeId, name: String, value: Value },
    SetAttribute { node: NodeId, name: String, value: String },
    RemoveAttribute { node: NodeId, name: String },
}

/// The result of one render pass.
#[derive(Debug)]
pub struct RenderOutput {
    pub children: Vec<RenderChild>,
    pub patches: Vec<DomPatch>,
}

/// Apply hydration patches to the live document.
pub fn apply_patches(doc: &mut Document, patches: &[DomPatch]) {
    for patch in patches {
        let node = match patch {
            DomPatch::AddClass { node, .. }
            | DomPatch::RemoveClass { node, .. }
            | DomPatch::SetStyleProperty { node, .. }
            | DomPatch::RemoveStyleProperty { node, .. }
            | DomPatch::SetProperty { node, .. }
            | DomPatch::SetAttribute { node, .. }
            | DomPatch::RemoveAttribute { node, .. } => *node,
        };
        let Some(element) = doc.element_mut(node) else {
            tracing::warn!("hydration patch targets a non-element node: {patch:?}");
            continue;
        };
        match patch {
            DomPatch::AddClass { class, .. } => element.add_class(class),
            DomPatch::RemoveClass { class, .. } => element.remove_class(class),
            DomPatch::SetStyleProperty { name, value, .. } => {
                element.set_style_property(name, value)
            }
            DomPatch::RemoveStyleProperty { name, .. } => element.remove_style_property(name),
            DomPatch::SetProperty { name, value, .. } => element.set_prop(name, value.clone()),
            DomPatch::SetAttribute { name, value, .. } => element.set_attr(name, value.clone()),
            DomPatch::RemoveAttribute { name, .. } => {
                element.remove_attr(name);
            }
        }
    }
}
