//! Fetched-page preparation.
//!
//! A navigation response is parsed once, off the live document: router
//! regions are translated to virtual trees, and the page's assets
//! (styles, script modules, import map, embedded server data) are
//! extracted so applying the page later is pure rendering.

use reef_dom::NodeId;
use reef_html::parse_document;
use reef_vdom::{DirectiveSchema, NodeCache, VNode, translate};
use serde_json::Value;
use std::rc::Rc;

/// A stylesheet the page carries.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleAsset {
    /// `link[rel=stylesheet]` href.
    External(String),
    /// Inline `<style>` text.
    Inline(String),
}

/// One translated router region.
#[derive(Debug)]
pub struct Region {
    pub id: String,
    /// Selector of the mount point for regions absent from the current
    /// document.
    pub attach_to: Option<String>,
    pub tree: Rc<VNode>,
}

/// A prepared page, ready to render.
#[derive(Debug)]
pub struct Page {
    pub url: String,
    pub title: Option<String>,
    pub regions: Vec<Region>,
    pub styles: Vec<StyleAsset>,
    pub script_modules: Vec<String>,
    pub import_map: Option<Value>,
    /// Embedded interactivity payload: state and config per namespace.
    pub server_data: Option<Value>,
    /// Embedded router payload (navigation texts and options).
    pub router_data: Option<Value>,
}

/// Parse and translate a fetched HTML document.
pub fn prepare_page(html: &str, url: &str, schema: &DirectiveSchema) -> Page {
    let mut doc = parse_document(html, url);
    let region_attr = schema.region_attr().to_string();

    // Only top-most regions count; a region nested in another is part of
    // its parent's tree.
    let all_regions = doc.query_selector_all(&format!("[{region_attr}]"));
    let region_ids: Vec<NodeId> = all_regions
        .iter()
        .copied()
        .filter(|&id| {
            let mut current = doc.tree().get(id).map(|n| n.parent);
            while let Some(parent) = current {
                if parent.is_none() {
                    break;
                }
                if doc.element(parent).is_some_and(|el| el.has_attr(&region_attr)) {
                    return false;
                }
                current = doc.tree().get(parent).map(|n| n.parent);
            }
            true
        })
        .collect();

    let mut cache = NodeCache::new();
    let mut regions = Vec::with_capacity(region_ids.len());
    for id in region_ids {
        let marker = doc
            .element(id)
            .and_then(|el| el.attr(&region_attr))
            .unwrap_or("")
            .to_string();
        let (region_id, attach_to) = parse_region_marker(&marker);
        if region_id.is_empty() {
            tracing::warn!("router region without an id is skipped");
            continue;
        }
        let outcome = translate(&mut doc, id, schema, &mut cache);
        let Some(tree) = outcome.children.into_iter().find_map(|child| match child {
            reef_vdom::Child::Node(node) => Some(node),
            _ => None,
        }) else {
            continue;
        };
        regions.push(Region {
            id: region_id,
            attach_to,
            tree,
        });
    }

    let mut styles = Vec::new();
    for id in doc.query_selector_all("link[rel=stylesheet]") {
        if let Some(href) = doc.attr(id, "href") {
            styles.push(StyleAsset::External(href.to_string()));
        }
    }
    for id in doc.query_selector_all("style") {
        styles.push(StyleAsset::Inline(doc.text_content(id)));
    }

    let script_modules = doc
        .query_selector_all("script[type=module]")
        .into_iter()
        .filter_map(|id| doc.attr(id, "src").map(str::to_string))
        .collect();

    let import_map = doc
        .query_selector("script[type=importmap]")
        .and_then(|id| serde_json::from_str(&doc.text_content(id)).ok());

    let server_data = embedded_json(&doc, &format!("{}-interactivity-data", schema.prefix()));
    let router_data = embedded_json(&doc, &format!("{}-router-data", schema.prefix()));

    Page {
        url: url.to_string(),
        title: doc.title(),
        regions,
        styles,
        script_modules,
        import_map,
        server_data,
        router_data,
    }
}

fn embedded_json(doc: &reef_dom::Document, id: &str) -> Option<Value> {
    let node = doc.query_selector(&format!("#{id}"))?;
    match serde_json::from_str(&doc.text_content(node)) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("embedded payload '{id}' is not valid JSON: {err}");
            None
        }
    }
}

/// A region marker is either a bare id or a JSON object with `id` and
/// an optional `attachTo` selector.
fn parse_region_marker(marker: &str) -> (String, Option<String>) {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(marker) {
        let id = map
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let attach_to = map
            .get("attachTo")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        (id, attach_to)
    } else {
        (marker.to_string(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const SCHEMA_HTML: &str = r##"<html><head>
        <title>Second page</title>
        <link rel="stylesheet" href="/theme.css">
        <style>p { margin: 0 }</style>
        <script type="importmap">{ "imports": { "lit": "https://cdn.test/lit.js" } }</script>
        <script type="module" src="/js/view.js"></script>
        <script type="application/json" id="reef-interactivity-data">
          { "state": { "shop": { "open": true } } }
        </script>
      </head><body>
        <header data-reef-router-region="header">old</header>
        <main data-reef-router-region='{"id":"content","attachTo":"#slot"}'>
          <div data-reef-interactive="shop" data-reef-router-region="nested"></div>
        </main>
      </body></html>"##;

    fn page() -> Page {
        prepare_page(
            SCHEMA_HTML,
            "https://site.test/next/",
            &DirectiveSchema::new("reef"),
        )
    }

    #[test]
    fn test_top_most_regions_only() {
        let page = page();
        let ids: Vec<&str> = page.regions.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["header", "content"]);
        assert_eq!(page.regions[1].attach_to.as_deref(), Some("#slot"));
    }

    #[test]
    fn test_assets_extracted() {
        let page = page();
        assert_eq!(page.title.as_deref(), Some("Second page"));
        assert_eq!(
            page.styles,
            vec![
                StyleAsset::External("/theme.css".into()),
                StyleAsset::Inline("p { margin: 0 }".into())
            ]
        );
        assert_eq!(page.script_modules, vec!["/js/view.js".to_string()]);
        assert_eq!(
            page.import_map,
            Some(json!({ "imports": { "lit": "https://cdn.test/lit.js" } }))
        );
        assert_eq!(
            page.server_data,
            Some(json!({ "state": { "shop": { "open": true } } }))
        );
        assert!(page.router_data.is_none());
    }
}
