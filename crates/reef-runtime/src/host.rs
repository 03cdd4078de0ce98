//! The live document as a router render host.
//!
//! Region trees come from pages parsed into their own arenas, so their
//! node ids mean nothing here. Rendering a region materializes the
//! engine's render output into fresh nodes of the live document instead
//! of patching in place.

use crate::Runtime;
use indexmap::IndexMap;
use reef_directives::{RenderChild, RenderChildren, RenderNode, Scope};
use reef_dom::{Document, NodeData, NodeId};
use reef_html::parse_document;
use reef_router::{RenderHost, StyleAsset};
use reef_vdom::VNode;
use serde_json::Value;
use std::rc::Rc;

impl Runtime {
    /// Record the stylesheets already present so the router does not
    /// re-append them after the first navigation.
    pub(crate) fn seed_applied_styles(&mut self) {
        for id in self.doc.query_selector_all("link[rel=stylesheet]") {
            if let Some(href) = self.doc.attr(id, "href") {
                self.applied_styles.insert(format!("link:{href}"));
            }
        }
        for id in self.doc.query_selector_all("style") {
            let text = self.doc.text_content(id);
            self.applied_styles.insert(format!("inline:{text}"));
        }
    }

    fn region_element(&self, id: &str) -> Option<NodeId> {
        let region_attr = self.schema.region_attr();
        self.doc
            .query_selector_all(&format!("[{region_attr}]"))
            .into_iter()
            .find(|&node| {
                self.doc
                    .attr(node, region_attr)
                    .is_some_and(|marker| region_marker_id(marker) == id)
            })
    }

    /// Overwrite an element's markup attributes from rendered props.
    fn apply_props(&mut self, node: NodeId, props: &IndexMap<String, Value>) {
        let Some(element) = self.doc.element_mut(node) else {
            return;
        };
        for (name, value) in props {
            match value {
                Value::Null | Value::Bool(false) => {
                    element.remove_attr(name);
                }
                Value::Bool(true) => element.set_attr(name, ""),
                Value::String(text) => element.set_attr(name, text.clone()),
                Value::Number(number) => element.set_attr(name, number.to_string()),
                other => element.set_attr(name, other.to_string()),
            }
        }
    }

    fn materialize(&mut self, parent: NodeId, children: &RenderChildren) {
        match children {
            RenderChildren::Inherit | RenderChildren::Empty => {}
            RenderChildren::Text(text) => {
                let node = self.doc.create_text(text);
                self.doc.tree_mut().append_child(parent, node);
            }
            RenderChildren::Nodes(nodes) => {
                for child in nodes {
                    match child {
                        RenderChild::Text(text) => {
                            let node = self.doc.create_text(text);
                            self.doc.tree_mut().append_child(parent, node);
                        }
                        RenderChild::Node(node) => self.materialize_node(parent, node),
                    }
                }
            }
            RenderChildren::RawHtml(html) => {
                let base = self.base_url.clone();
                let fragment = parse_document(html, &base);
                let Some(body) = fragment.find_element(|el| el.tag == "body") else {
                    return;
                };
                self.import_children(&fragment, body, parent);
            }
        }
    }

    fn materialize_node(&mut self, parent: NodeId, node: &RenderNode) {
        // Templates are inert in a live document; list fragments the
        // engine hangs off them go in the template's place.
        if node.tag == "template" {
            self.materialize(parent, &node.children);
            return;
        }
        let element = self.doc.create_element(&node.tag);
        self.doc.tree_mut().append_child(parent, element);
        self.apply_props(element, &node.props);
        self.materialize(element, &node.children);
    }

    /// Copy a subtree from another arena. Comments and processing
    /// instructions are dropped, matching the translator.
    fn import_children(&mut self, src: &Document, src_parent: NodeId, dst_parent: NodeId) {
        let kids: Vec<NodeId> = src.tree().children(src_parent).collect();
        for kid in kids {
            let Some(node) = src.tree().get(kid) else {
                continue;
            };
            match &node.data {
                NodeData::Element(el) => {
                    let attrs = el.attrs.clone();
                    let new = self.doc.create_element(&el.tag);
                    if let Some(element) = self.doc.element_mut(new) {
                        for attr in attrs {
                            element.set_attr(&attr.name, attr.value);
                        }
                    }
                    self.doc.tree_mut().append_child(dst_parent, new);
                    self.import_children(src, kid, new);
                }
                NodeData::Text(text) | NodeData::CData(text) => {
                    let new = self.doc.create_text(text);
                    self.doc.tree_mut().append_child(dst_parent, new);
                }
                _ => {}
            }
        }
    }

    fn swap_region(&mut self, target: NodeId, root: &RenderNode) {
        self.apply_props(target, &root.props);
        let old: Vec<NodeId> = self.doc.tree().children(target).collect();
        for child in old {
            self.doc.tree_mut().detach(child);
        }
        self.materialize(target, &root.children);
    }
}

impl RenderHost for Runtime {
    fn region_ids(&self) -> Vec<String> {
        let region_attr = self.schema.region_attr();
        self.doc
            .query_selector_all(&format!("[{region_attr}]"))
            .into_iter()
            .filter_map(|node| self.doc.attr(node, region_attr).map(region_marker_id))
            .filter(|id| !id.is_empty())
            .collect()
    }

    fn render_region(&mut self, id: &str, tree: &Rc<VNode>) {
        let Some(target) = self.region_element(id) else {
            tracing::warn!("router region '{id}' not found in the document");
            return;
        };
        let output = self.engine.render(tree, &Scope::new());
        let Some(root) = root_node(&output.children) else {
            return;
        };
        self.swap_region(target, root);
    }

    fn attach_region(&mut self, id: &str, selector: &str, tree: &Rc<VNode>) -> bool {
        let Some(mount) = self.doc.query_selector(selector) else {
            return false;
        };
        let output = self.engine.render(tree, &Scope::new());
        let Some(root) = root_node(&output.children) else {
            return false;
        };
        let element = self.doc.create_element(&root.tag);
        self.doc.tree_mut().append_child(mount, element);
        self.apply_props(element, &root.props);
        self.materialize(element, &root.children);
        tracing::debug!("router region '{id}' attached at '{selector}'");
        true
    }

    fn apply_styles(&mut self, styles: &[StyleAsset]) {
        let Some(head) = self.doc.find_element(|el| el.tag == "head") else {
            return;
        };
        for style in styles {
            let key = match style {
                StyleAsset::External(href) => format!("link:{href}"),
                StyleAsset::Inline(text) => format!("inline:{text}"),
            };
            if !self.applied_styles.insert(key) {
                continue;
            }
            match style {
                StyleAsset::External(href) => {
                    let link = self.doc.create_element("link");
                    if let Some(element) = self.doc.element_mut(link) {
                        element.set_attr("rel", "stylesheet");
                        element.set_attr("href", href.clone());
                    }
                    self.doc.tree_mut().append_child(head, link);
                }
                StyleAsset::Inline(text) => {
                    let style_el = self.doc.create_element("style");
                    let text_node = self.doc.create_text(text);
                    self.doc.tree_mut().append_child(head, style_el);
                    self.doc.tree_mut().append_child(style_el, text_node);
                }
            }
        }
    }

    fn set_title(&mut self, title: &str) {
        if let Some(node) = self.doc.find_element(|el| el.tag == "title") {
            let old: Vec<NodeId> = self.doc.tree().children(node).collect();
            for child in old {
                self.doc.tree_mut().detach(child);
            }
            let text = self.doc.create_text(title);
            self.doc.tree_mut().append_child(node, text);
        } else if let Some(head) = self.doc.find_element(|el| el.tag == "head") {
            let node = self.doc.create_element("title");
            let text = self.doc.create_text(title);
            self.doc.tree_mut().append_child(head, node);
            self.doc.tree_mut().append_child(node, text);
        }
    }

    fn populate_server_data(&mut self, data: &Value) {
        crate::merge_payload(&mut self.engine, data);
    }

    fn update_url(&mut self, url: &str, _replace: bool) {
        self.current_url = url.to_string();
    }

    fn set_loading(&mut self, active: bool) {
        self.loading = active;
    }

    fn reload(&mut self, url: &str) {
        self.pending_reload = Some(url.to_string());
    }

    fn announce(&mut self, message: &str) {
        self.announcements.push(message.to_string());
    }

    fn scroll_to_anchor(&mut self, anchor: &str) {
        self.scroll_target = Some(anchor.to_string());
    }
}

fn root_node(children: &[RenderChild]) -> Option<&RenderNode> {
    children.iter().find_map(|child| match child {
        RenderChild::Node(node) => Some(node),
        _ => None,
    })
}

/// A region marker is a bare id or a JSON object carrying `id`.
fn region_marker_id(marker: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(marker) {
        map.get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    } else {
        marker.to_string()
    }
}
