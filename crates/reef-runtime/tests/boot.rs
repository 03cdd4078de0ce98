//! Boot, dispatch and region rendering over a live document.

use pretty_assertions::assert_eq;
use reef_directives::{Action, ActionOutcome, Event, RenderChild, RenderChildren, RenderNode};
use reef_router::{RenderHost, StyleAsset, prepare_page};
use reef_runtime::Runtime;
use reef_vdom::DirectiveSchema;
use serde_json::json;

const BOOT_HTML: &str = r#"<html><head>
    <link rel="stylesheet" href="/base.css">
    <script type="application/json" id="reef-interactivity-data">
      { "state": { "shop": { "open": true, "label": "Open now" } },
        "config": { "reef/router": { "clientNavigationDisabled": true } } }
    </script>
  </head><body>
    <div data-reef-interactive="shop">
      <p data-reef-class--open="state.open" data-reef-text="state.label"></p>
    </div>
  </body></html>"#;

fn find_render<'a>(children: &'a [RenderChild], tag: &str) -> Option<&'a RenderNode> {
    for child in children {
        if let RenderChild::Node(node) = child {
            if node.tag == tag {
                return Some(node);
            }
            if let RenderChildren::Nodes(inner) = &node.children {
                if let Some(found) = find_render(inner, tag) {
                    return Some(found);
                }
            }
        }
    }
    None
}

fn text_of(node: &RenderNode) -> Option<&str> {
    match &node.children {
        RenderChildren::Text(text) => Some(text),
        _ => None,
    }
}

#[test]
fn test_boot_hydrates_islands_from_embedded_payload() {
    let runtime = Runtime::boot(BOOT_HTML, "https://site.test/", "reef");
    assert_eq!(runtime.islands().len(), 1);

    let p = find_render(&runtime.islands()[0].output.children, "p").unwrap();
    assert_eq!(text_of(p), Some("Open now"));

    // The server markup lacked the class; hydration patched it in.
    let p_id = runtime.doc.query_selector("p").unwrap();
    assert!(runtime.doc.element(p_id).unwrap().has_class("open"));
}

#[test]
fn test_client_navigation_disabled_comes_from_config() {
    let runtime = Runtime::boot(BOOT_HTML, "https://site.test/", "reef");
    assert!(runtime.client_navigation_disabled());

    let bare = Runtime::boot(
        "<html><head></head><body></body></html>",
        "https://site.test/",
        "reef",
    );
    assert!(!bare.client_navigation_disabled());
}

#[test]
fn test_dispatch_and_tick_refresh_island_output() {
    let html = r#"<html><head></head><body>
        <div data-reef-interactive="counter">
          <button data-reef-on--click="actions.inc" data-reef-text="state.count"></button>
        </div>
      </body></html>"#;
    let mut runtime = Runtime::boot(html, "https://site.test/", "reef");
    runtime.engine.state.set("counter", "count", json!(0));
    runtime.engine.actions.register(
        "counter",
        "actions.inc",
        Action::new(|call| {
            let n = call.state_get("count").and_then(|v| v.as_i64()).unwrap_or(0);
            call.state_set("count", json!(n + 1));
            ActionOutcome::None
        }),
    );
    runtime.tick();

    let button_dom = find_render(&runtime.islands()[0].output.children, "button")
        .unwrap()
        .dom;
    assert!(runtime.dispatch(button_dom, &Event::new("click", json!(null), button_dom)));
    runtime.tick();

    let button = find_render(&runtime.islands()[0].output.children, "button").unwrap();
    assert_eq!(text_of(button), Some("1"));
}

#[test]
fn test_render_region_replaces_live_children() {
    let html = r#"<html><head><title>First</title></head><body>
        <main data-reef-router-region="content"><p>old content</p></main>
      </body></html>"#;
    let mut runtime = Runtime::boot(html, "https://site.test/", "reef");
    assert_eq!(runtime.region_ids(), vec!["content".to_string()]);

    let next = r#"<html><head><title>Second</title></head><body>
        <main data-reef-router-region="content">
          <div data-reef-interactive="shop"><p data-reef-text="state.msg"></p></div>
        </main>
      </body></html>"#;
    let page = prepare_page(next, "https://site.test/next/", &DirectiveSchema::new("reef"));
    runtime.engine.state.set("shop", "msg", json!("fresh"));

    runtime.render_region("content", &page.regions[0].tree);
    runtime.set_title("Second");

    let main = runtime.doc.query_selector("main").unwrap();
    let text = runtime.doc.text_content(main);
    assert!(text.contains("fresh"));
    assert!(!text.contains("old content"));
    assert_eq!(runtime.doc.title().as_deref(), Some("Second"));
}

#[test]
fn test_region_lists_splice_template_items_into_parent() {
    let html = r#"<html><head></head><body>
        <main data-reef-router-region="content">x</main>
      </body></html>"#;
    let mut runtime = Runtime::boot(html, "https://site.test/", "reef");
    runtime.engine.state.set("list", "items", json!(["a", "b"]));

    let next = r#"<html><head></head><body>
        <main data-reef-router-region="content">
          <ul data-reef-interactive="list">
            <template data-reef-each="state.items">
              <li data-reef-text="context.item"></li>
            </template>
          </ul>
        </main>
      </body></html>"#;
    let page = prepare_page(next, "https://site.test/next/", &DirectiveSchema::new("reef"));
    runtime.render_region("content", &page.regions[0].tree);

    // Templates are inert; the generated items land in their place.
    assert!(runtime.doc.query_selector("template").is_none());
    let items = runtime.doc.query_selector_all("li");
    assert_eq!(items.len(), 2);
    assert_eq!(runtime.doc.text_content(items[0]), "a");
    assert_eq!(runtime.doc.text_content(items[1]), "b");
}

#[test]
fn test_apply_styles_skips_already_present_sheets() {
    let mut runtime = Runtime::boot(BOOT_HTML, "https://site.test/", "reef");
    runtime.apply_styles(&[
        StyleAsset::External("/base.css".into()),
        StyleAsset::External("/theme.css".into()),
        StyleAsset::Inline("p { margin: 0 }".into()),
    ]);
    // /base.css was already in the head at boot.
    assert_eq!(runtime.doc.query_selector_all("link[rel=stylesheet]").len(), 2);
    assert_eq!(runtime.doc.query_selector_all("style").len(), 1);

    runtime.apply_styles(&[StyleAsset::External("/theme.css".into())]);
    assert_eq!(runtime.doc.query_selector_all("link[rel=stylesheet]").len(), 2);
}

#[test]
fn test_host_surface_records_navigation_effects() {
    let mut runtime = Runtime::boot(BOOT_HTML, "https://site.test/", "reef");
    runtime.update_url("https://site.test/next/", false);
    runtime.set_loading(true);
    runtime.announce("Loading page, please wait.");
    runtime.scroll_to_anchor("details");
    runtime.reload("https://site.test/slow/");

    assert_eq!(runtime.current_url, "https://site.test/next/");
    assert!(runtime.loading);
    assert_eq!(runtime.announcements, vec!["Loading page, please wait."]);
    assert_eq!(runtime.scroll_target.as_deref(), Some("details"));
    assert_eq!(runtime.pending_reload.as_deref(), Some("https://site.test/slow/"));
}
