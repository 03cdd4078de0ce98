//! The DOM walk producing virtual nodes.

use crate::{
    Child, Children, DirectiveEntry, DirectiveMap, DirectiveSchema, DirectiveValue, NodeCache,
    VNode,
};
use indexmap::IndexMap;
use reef_dom::{Document, NodeData, NodeId};
use std::rc::Rc;

/// Result of one translation pass.
#[derive(Debug)]
pub struct TranslateOutcome {
    /// Translated roots (one for elements, possibly several for fragments).
    pub children: Vec<Child>,
    /// Warnings emitted for malformed directive names.
    pub warnings: Vec<String>,
}

/// Translate a DOM subtree into virtual nodes.
///
/// Source-DOM normalization (comment/PI removal, CDATA replacement) is
/// applied once, after the walk completes; the walk itself never mutates
/// the document. Previously translated nodes found in `cache` are reused
/// without reconstruction.
pub fn translate(
    doc: &mut Document,
    root: NodeId,
    schema: &DirectiveSchema,
    cache: &mut NodeCache,
) -> TranslateOutcome {
    let mut walk = Walk {
        schema,
        cache,
        namespaces: Vec::new(),
        warnings: Vec::new(),
        to_remove: Vec::new(),
        to_replace: Vec::new(),
    };
    let children = walk.node(doc, root);

    let Walk {
        warnings,
        to_remove,
        to_replace,
        ..
    } = walk;
    for id in to_remove {
        doc.tree_mut().detach(id);
    }
    for (id, text) in to_replace {
        doc.tree_mut().replace_data(id, NodeData::Text(text));
    }

    TranslateOutcome { children, warnings }
}

struct Walk<'a> {
    schema: &'a DirectiveSchema,
    cache: &'a mut NodeCache,
    /// Active island namespace stack, scoped to this walk only.
    namespaces: Vec<Option<String>>,
    warnings: Vec<String>,
    to_remove: Vec<NodeId>,
    to_replace: Vec<(NodeId, String)>,
}

impl Walk<'_> {
    fn current_namespace(&self) -> Option<String> {
        self.namespaces.last().cloned().flatten()
    }

    fn node(&mut self, doc: &Document, id: NodeId) -> Vec<Child> {
        let node = match doc.tree().get(id) {
            Some(node) => node,
            None => return Vec::new(),
        };
        match &node.data {
            NodeData::Text(text) => vec![Child::Text(text.clone())],
            NodeData::CData(text) => {
                // Normalized away post-walk: replaced by a plain text node.
                self.to_replace.push((id, text.clone()));
                vec![Child::Text(text.clone())]
            }
            NodeData::Comment(_) | NodeData::ProcessingInstruction { .. } => {
                self.to_remove.push(id);
                Vec::new()
            }
            NodeData::Document => {
                let children: Vec<NodeId> = doc.tree().children(id).collect();
                children
                    .into_iter()
                    .flat_map(|child| self.node(doc, child))
                    .collect()
            }
            NodeData::Element(_) => self.element(doc, id),
        }
    }

    fn element(&mut self, doc: &Document, id: NodeId) -> Vec<Child> {
        if let Some(cached) = self.cache.get(id) {
            return vec![Child::Node(cached)];
        }

        let element = doc.element(id).expect("element node");
        let tag = element.tag.clone();

        let mut props: IndexMap<String, String> = IndexMap::new();
        let mut raw: Vec<(String, Option<String>, DirectiveValue)> = Vec::new();
        let mut ignore = false;
        let mut island = false;

        for attr in &element.attrs {
            if self.schema.is_directive_attr(&attr.name) {
                if attr.name == self.schema.ignore_attr() {
                    ignore = true;
                } else {
                    let (namespace, expr) = self.schema.split_namespace(&attr.value);
                    let value = DirectiveValue::parse(expr);
                    if attr.name == self.schema.island_attr() {
                        island = true;
                        self.namespaces.push(island_namespace(&value));
                    } else {
                        raw.push((attr.name.clone(), namespace.map(str::to_string), value));
                    }
                }
            }
            props.insert(attr.name.clone(), attr.value.clone());
        }

        let mut directives: DirectiveMap = IndexMap::new();
        for (name, namespace, value) in raw {
            let Some((directive, suffix)) = self.schema.parse_name(&name) else {
                let warning = format!("Found malformed directive name: {name}.");
                tracing::warn!("{warning}");
                self.warnings.push(warning);
                continue;
            };
            directives
                .entry(directive)
                .or_default()
                .push(DirectiveEntry {
                    namespace: namespace.or_else(|| self.current_namespace()),
                    suffix,
                    value,
                });
        }

        let (children, content) = if ignore {
            // Frozen subtree: raw markup preserved verbatim, children never
            // re-derived. Directives stay honored only on islands.
            if !island {
                directives.clear();
            }
            directives.insert(
                "ignore".to_string(),
                vec![DirectiveEntry {
                    namespace: self.current_namespace(),
                    suffix: None,
                    value: DirectiveValue::Str(String::new()),
                }],
            );
            (Children::RawHtml(doc.inner_html(id)), None)
        } else if tag == "template" {
            // Template children are mapped individually, not walked as
            // live children.
            let child_ids: Vec<NodeId> = doc.tree().children(id).collect();
            let content: Vec<Child> = child_ids
                .into_iter()
                .flat_map(|child| self.node(doc, child))
                .collect();
            (Children::Nodes(Vec::new()), Some(content))
        } else {
            let child_ids: Vec<NodeId> = doc.tree().children(id).collect();
            let children: Vec<Child> = child_ids
                .into_iter()
                .flat_map(|child| self.node(doc, child))
                .collect();
            (Children::Nodes(children), None)
        };

        if island {
            self.namespaces.pop();
        }

        let vnode = Rc::new(VNode {
            tag,
            props,
            children,
            content,
            directives: if directives.is_empty() {
                None
            } else {
                Some(directives)
            },
            dom: id,
        });
        self.cache.insert(id, vnode.clone());
        vec![Child::Node(vnode)]
    }
}

/// Extract the namespace from an island marker value: either a bare
/// namespace string or a JSON object with a `namespace` field.
fn island_namespace(value: &DirectiveValue) -> Option<String> {
    match value {
        DirectiveValue::Str(s) if !s.is_empty() => Some(s.clone()),
        DirectiveValue::Json(json) => json
            .get("namespace")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reef_html::parse_document;

    fn translate_body(html: &str) -> (Document, TranslateOutcome, NodeCache) {
        let mut doc = parse_document(html, "https://example.test/");
        let body = doc.query_selector("body").expect("body");
        let schema = DirectiveSchema::new("reef");
        let mut cache = NodeCache::new();
        let outcome = translate(&mut doc, body, &schema, &mut cache);
        (doc, outcome, cache)
    }

    fn only_node(children: &[Child]) -> Rc<VNode> {
        match children {
            [Child::Node(node)] => node.clone(),
            other => panic!("expected a single node, got {other:?}"),
        }
    }

    fn find<'a>(node: &'a Rc<VNode>, tag: &str) -> Option<Rc<VNode>> {
        if node.tag == tag {
            return Some(node.clone());
        }
        if let Children::Nodes(children) = &node.children {
            for child in children {
                if let Child::Node(n) = child {
                    if let Some(found) = find(n, tag) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    #[test]
    fn test_valid_and_malformed_directive_counts() {
        let (_, outcome, _) = translate_body(
            r#"<body><div data-reef-interactive="shop"
                data-reef-bind--hidden="state.hidden"
                data-reef-on--click="actions.toggle"
                data-reef-bad[name]="x"
                data-reef-wrong_name="y"></div></body>"#,
        );
        let body = only_node(&outcome.children);
        let div = find(&body, "div").unwrap();
        let directives = div.directives.as_ref().unwrap();
        let total: usize = directives.values().map(|v| v.len()).sum();
        assert_eq!(total, 2);
        assert_eq!(outcome.warnings.len(), 2);
        assert!(outcome.warnings[0].contains("data-reef-bad[name]"));
    }

    #[test]
    fn test_namespace_inheritance_and_shadowing() {
        let (_, outcome, _) = translate_body(
            r#"<body><div data-reef-interactive="outer">
                 <span data-reef-text="state.a"></span>
                 <section data-reef-interactive='{"namespace":"inner"}'>
                   <em data-reef-text="state.b"></em>
                   <i data-reef-text="other::state.c"></i>
                 </section>
               </div></body>"#,
        );
        let body = only_node(&outcome.children);
        let span = find(&body, "span").unwrap();
        assert_eq!(span.directive("text")[0].namespace.as_deref(), Some("outer"));
        let em = find(&body, "em").unwrap();
        assert_eq!(em.directive("text")[0].namespace.as_deref(), Some("inner"));
        let i = find(&body, "i").unwrap();
        assert_eq!(i.directive("text")[0].namespace.as_deref(), Some("other"));
    }

    #[test]
    fn test_island_own_directives_use_island_namespace() {
        let (_, outcome, _) = translate_body(
            r#"<body><div data-reef-interactive="shop" data-reef-class--open="state.open"></div></body>"#,
        );
        let body = only_node(&outcome.children);
        let div = find(&body, "div").unwrap();
        assert_eq!(div.directive("class")[0].namespace.as_deref(), Some("shop"));
        assert_eq!(div.directive("class")[0].suffix.as_deref(), Some("open"));
    }

    #[test]
    fn test_ignore_freezes_children() {
        let (_, outcome, _) = translate_body(
            r#"<body><div data-reef-ignore data-reef-text="state.x"><b>raw</b></div></body>"#,
        );
        let body = only_node(&outcome.children);
        let div = find(&body, "div").unwrap();
        match &div.children {
            Children::RawHtml(html) => assert_eq!(html, "<b>raw</b>"),
            other => panic!("expected raw html, got {other:?}"),
        }
        // Non-island: the text directive is dropped, only the ignore
        // marker remains.
        let directives = div.directives.as_ref().unwrap();
        assert!(directives.contains_key("ignore"));
        assert!(!directives.contains_key("text"));
    }

    #[test]
    fn test_ignored_island_keeps_directives() {
        let (_, outcome, _) = translate_body(
            r#"<body><div data-reef-interactive="shop" data-reef-ignore
                 data-reef-class--open="state.open"><b>raw</b></div></body>"#,
        );
        let body = only_node(&outcome.children);
        let div = find(&body, "div").unwrap();
        assert!(matches!(div.children, Children::RawHtml(_)));
        let directives = div.directives.as_ref().unwrap();
        assert!(directives.contains_key("class"));
        assert!(directives.contains_key("ignore"));
    }

    #[test]
    fn test_template_content_not_walked_as_children() {
        let (_, outcome, _) = translate_body(
            r#"<body><template data-reef-each="state.items"><li data-reef-text="context.item"></li></template></body>"#,
        );
        let body = only_node(&outcome.children);
        let template = find(&body, "template").unwrap();
        assert!(matches!(&template.children, Children::Nodes(v) if v.is_empty()));
        let content = template.content.as_ref().unwrap();
        assert_eq!(content.len(), 1);
    }

    #[test]
    fn test_comments_removed_after_walk_and_idempotent() {
        let mut doc = parse_document(
            "<body><div><!-- gone --><?pi data?>text</div></body>",
            "https://example.test/",
        );
        let body = doc.query_selector("body").unwrap();
        let schema = DirectiveSchema::new("reef");

        let mut cache = NodeCache::new();
        let _ = translate(&mut doc, body, &schema, &mut cache);
        let div = doc.query_selector("div").unwrap();
        assert_eq!(doc.inner_html(div), "text");

        // A second pass over the normalized DOM changes nothing.
        let before = doc.outer_html(body);
        let mut cache2 = NodeCache::new();
        let _ = translate(&mut doc, body, &schema, &mut cache2);
        assert_eq!(doc.outer_html(body), before);
    }

    #[test]
    fn test_cache_reuses_nodes_by_identity() {
        let mut doc = parse_document(
            r#"<body><div data-reef-interactive="shop"><span>hi</span></div></body>"#,
            "https://example.test/",
        );
        let body = doc.query_selector("body").unwrap();
        let schema = DirectiveSchema::new("reef");
        let mut cache = NodeCache::new();

        let first = translate(&mut doc, body, &schema, &mut cache);
        let second = translate(&mut doc, body, &schema, &mut cache);
        let a = only_node(&first.children);
        let b = only_node(&second.children);
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_props_keep_all_attributes() {
        let (_, outcome, _) = translate_body(
            r#"<body><div id="x" data-reef-interactive="shop" data-reef-text="state.t"></div></body>"#,
        );
        let body = only_node(&outcome.children);
        let div = find(&body, "div").unwrap();
        assert_eq!(div.props.get("id").map(String::as_str), Some("x"));
        assert!(div.props.contains_key("data-reef-interactive"));
        assert!(div.props.contains_key("data-reef-text"));
    }
}
