//! Navigation flows against mock network and document hosts.

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{self, LocalBoxFuture};
use pretty_assertions::assert_eq;
use reef_router::{
    FetchError, ModuleLoader, NavigateOptions, PageFetcher, RenderHost, Router, StyleAsset,
};
use reef_vdom::{DirectiveSchema, VNode};
use serde_json::Value;
use smol::LocalExecutor;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::{Duration, Instant};
use url::Url;

type FetchResult = Result<String, FetchError>;

#[derive(Default)]
struct MockFetcher {
    ready: HashMap<String, FetchResult>,
    gated: RefCell<HashMap<String, oneshot::Receiver<FetchResult>>>,
    hang: HashSet<String>,
    calls: RefCell<Vec<String>>,
}

impl PageFetcher for MockFetcher {
    fn fetch(&self, url: String) -> LocalBoxFuture<'static, FetchResult> {
        self.calls.borrow_mut().push(url.clone());
        if self.hang.contains(&url) {
            return future::pending().boxed_local();
        }
        if let Some(rx) = self.gated.borrow_mut().remove(&url) {
            return async move {
                rx.await.unwrap_or_else(|_| {
                    Err(FetchError {
                        url,
                        reason: "gate dropped".into(),
                    })
                })
            }
            .boxed_local();
        }
        let result = self.ready.get(&url).cloned().unwrap_or_else(|| {
            Err(FetchError {
                url: url.clone(),
                reason: "no response configured".into(),
            })
        });
        future::ready(result).boxed_local()
    }
}

#[derive(Default)]
struct MockLoader {
    imports: RefCell<Vec<String>>,
}

impl ModuleLoader for MockLoader {
    fn import(&self, url: String) -> LocalBoxFuture<'static, Result<(), FetchError>> {
        self.imports.borrow_mut().push(url);
        future::ready(Ok(())).boxed_local()
    }
}

#[derive(Default)]
struct MockHost {
    present_regions: Vec<String>,
    rendered: Vec<String>,
    attached: Vec<(String, String)>,
    titles: Vec<String>,
    urls: Vec<(String, bool)>,
    announcements: Vec<String>,
    reloads: Vec<String>,
    loading: Vec<bool>,
    server_data: Vec<Value>,
    styles: Vec<StyleAsset>,
    anchors: Vec<String>,
}

impl RenderHost for MockHost {
    fn region_ids(&self) -> Vec<String> {
        self.present_regions.clone()
    }
    fn render_region(&mut self, id: &str, _tree: &Rc<VNode>) {
        self.rendered.push(id.to_string());
    }
    fn attach_region(&mut self, id: &str, selector: &str, _tree: &Rc<VNode>) -> bool {
        self.attached.push((id.to_string(), selector.to_string()));
        self.present_regions.push(id.to_string());
        true
    }
    fn apply_styles(&mut self, styles: &[StyleAsset]) {
        self.styles = styles.to_vec();
    }
    fn set_title(&mut self, title: &str) {
        self.titles.push(title.to_string());
    }
    fn populate_server_data(&mut self, data: &Value) {
        self.server_data.push(data.clone());
    }
    fn update_url(&mut self, url: &str, replace: bool) {
        self.urls.push((url.to_string(), replace));
    }
    fn set_loading(&mut self, active: bool) {
        self.loading.push(active);
    }
    fn reload(&mut self, url: &str) {
        self.reloads.push(url.to_string());
    }
    fn announce(&mut self, message: &str) {
        self.announcements.push(message.to_string());
    }
    fn scroll_to_anchor(&mut self, anchor: &str) {
        self.anchors.push(anchor.to_string());
    }
}

struct Fixture {
    router: Router,
    fetcher: Rc<MockFetcher>,
    loader: Rc<MockLoader>,
    host: Rc<RefCell<MockHost>>,
}

fn fixture(fetcher: MockFetcher) -> Fixture {
    let fetcher = Rc::new(fetcher);
    let loader = Rc::new(MockLoader::default());
    let host = Rc::new(RefCell::new(MockHost {
        present_regions: vec!["content".to_string()],
        ..MockHost::default()
    }));
    let router = Router::new(
        Rc::clone(&fetcher) as Rc<dyn PageFetcher>,
        Rc::clone(&loader) as Rc<dyn ModuleLoader>,
        Rc::clone(&host) as Rc<RefCell<dyn RenderHost>>,
        DirectiveSchema::new("reef"),
        Url::parse("https://site.test/").unwrap(),
        false,
    );
    Fixture {
        router,
        fetcher,
        loader,
        host,
    }
}

fn page_html(title: &str, body: &str) -> String {
    format!(
        r#"<html><head><title>{title}</title></head>
           <body><main data-reef-router-region="content">{body}</main></body></html>"#
    )
}

/// Drive the executor until the condition holds or two seconds pass.
fn run_until(ex: &LocalExecutor<'_>, mut done: impl FnMut() -> bool) {
    smol::block_on(ex.run(async {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !done() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            smol::Timer::after(Duration::from_millis(1)).await;
        }
    }));
}

#[test]
fn test_concurrent_navigations_share_one_fetch() {
    let mut fetcher = MockFetcher::default();
    fetcher
        .ready
        .insert("https://site.test/a".into(), Ok(page_html("A", "first")));
    let fx = fixture(fetcher);

    let ex = LocalExecutor::new();
    let first = ex.spawn(fx.router.navigate("/a", NavigateOptions::default()));
    let second = ex.spawn(fx.router.navigate("/a", NavigateOptions::default()));
    run_until(&ex, || first.is_finished() && second.is_finished());

    assert_eq!(fx.fetcher.calls.borrow().len(), 1);
    let host = fx.host.borrow();
    assert_eq!(host.rendered, vec!["content", "content"]);
    assert_eq!(host.titles.last().map(String::as_str), Some("A"));
    assert_eq!(
        host.urls.last(),
        Some(&("https://site.test/a".to_string(), false))
    );
    assert_eq!(
        host.announcements.last().map(String::as_str),
        Some("Page Loaded.")
    );
}

#[test]
fn test_timeout_zero_falls_back_to_reload() {
    let mut fetcher = MockFetcher::default();
    fetcher.hang.insert("https://site.test/slow".into());
    let fx = fixture(fetcher);

    let options = NavigateOptions {
        timeout_ms: 0,
        ..NavigateOptions::default()
    };
    let ex = LocalExecutor::new();
    let nav = ex.spawn(fx.router.navigate("/slow", options));
    run_until(&ex, || !fx.host.borrow().reloads.is_empty());

    assert_eq!(fx.host.borrow().reloads, vec!["/slow"]);
    // The navigation future never resolves once a reload is issued.
    assert!(!nav.is_finished());
    // The loading indicator never armed: the timeout undercut the
    // debounce window.
    assert!(!fx.host.borrow().loading.contains(&true));
}

#[test]
fn test_failed_fetch_falls_back_to_reload() {
    let fx = fixture(MockFetcher::default());
    let ex = LocalExecutor::new();
    let nav = ex.spawn(fx.router.navigate("/missing", NavigateOptions::default()));
    run_until(&ex, || !fx.host.borrow().reloads.is_empty());

    assert_eq!(fx.host.borrow().reloads, vec!["/missing"]);
    assert!(!nav.is_finished());
    assert!(fx.host.borrow().rendered.is_empty());
}

#[test]
fn test_popstate_replays_cache_without_fetch() {
    let mut fetcher = MockFetcher::default();
    fetcher
        .ready
        .insert("https://site.test/a".into(), Ok(page_html("A", "first")));
    let fx = fixture(fetcher);

    smol::block_on(async {
        fx.router.navigate("/a", NavigateOptions::default()).await;
        fx.router.handle_popstate("/a").await;
    });

    assert_eq!(fx.fetcher.calls.borrow().len(), 1);
    let host = fx.host.borrow();
    assert_eq!(host.rendered, vec!["content", "content"]);
    // Popstate replay replaces rather than pushes.
    assert_eq!(host.urls[1].1, true);
    assert!(host.reloads.is_empty());
}

#[test]
fn test_popstate_of_uncached_location_reloads() {
    let fx = fixture(MockFetcher::default());
    smol::block_on(fx.router.handle_popstate("/never-visited"));
    assert_eq!(fx.host.borrow().reloads, vec!["/never-visited"]);
    assert_eq!(fx.fetcher.calls.borrow().len(), 0);
}

#[test]
fn test_stale_navigation_never_renders() {
    let (tx, rx) = oneshot::channel();
    let mut fetcher = MockFetcher::default();
    fetcher
        .gated
        .borrow_mut()
        .insert("https://site.test/slow".into(), rx);
    fetcher
        .ready
        .insert("https://site.test/fast".into(), Ok(page_html("Fast", "x")));
    let fx = fixture(fetcher);

    let ex = LocalExecutor::new();
    let slow = ex.spawn(fx.router.navigate("/slow", NavigateOptions::default()));
    run_until(&ex, || fx.fetcher.calls.borrow().len() == 1);

    let fast = ex.spawn(fx.router.navigate("/fast", NavigateOptions::default()));
    run_until(&ex, || fast.is_finished());

    tx.send(Ok(page_html("Slow", "y"))).unwrap();
    run_until(&ex, || slow.is_finished());

    let host = fx.host.borrow();
    // Only the newer navigation rendered and touched the URL.
    assert_eq!(host.rendered, vec!["content"]);
    assert_eq!(host.titles, vec!["Fast"]);
    assert_eq!(host.urls.len(), 1);
    assert_eq!(host.urls[0].0, "https://site.test/fast");
}

#[test]
fn test_loading_indicator_arms_after_debounce() {
    let (tx, rx) = oneshot::channel();
    let mut fetcher = MockFetcher::default();
    fetcher
        .gated
        .borrow_mut()
        .insert("https://site.test/slow".into(), rx);
    let fx = fixture(fetcher);

    let ex = LocalExecutor::new();
    let nav = ex.spawn(fx.router.navigate("/slow", NavigateOptions::default()));
    run_until(&ex, || fx.host.borrow().loading.contains(&true));
    assert_eq!(
        fx.host.borrow().announcements,
        vec!["Loading page, please wait."]
    );

    tx.send(Ok(page_html("Slow", "y"))).unwrap();
    run_until(&ex, || nav.is_finished());
    // Loading is cleared once the page renders.
    assert_eq!(fx.host.borrow().loading.last(), Some(&false));
}

#[test]
fn test_modules_import_once_across_pages() {
    let module_page = |title: &str| {
        format!(
            r#"<html><head><title>{title}</title>
               <script type="module" src="/js/app.js"></script></head>
               <body><main data-reef-router-region="content">x</main></body></html>"#
        )
    };
    let mut fetcher = MockFetcher::default();
    fetcher
        .ready
        .insert("https://site.test/a".into(), Ok(module_page("A")));
    fetcher
        .ready
        .insert("https://site.test/b".into(), Ok(module_page("B")));
    let fx = fixture(fetcher);

    smol::block_on(async {
        fx.router.navigate("/a", NavigateOptions::default()).await;
        fx.router.navigate("/b", NavigateOptions::default()).await;
    });

    assert_eq!(
        *fx.loader.imports.borrow(),
        vec!["https://site.test/js/app.js".to_string()]
    );
}

#[test]
fn test_prefetch_is_idempotent_and_navigate_reuses_it() {
    let mut fetcher = MockFetcher::default();
    fetcher
        .ready
        .insert("https://site.test/a".into(), Ok(page_html("A", "first")));
    let fx = fixture(fetcher);

    let options = NavigateOptions::default();
    fx.router.prefetch("/a", &options);
    fx.router.prefetch("/a", &options);
    assert_eq!(fx.fetcher.calls.borrow().len(), 1);

    smol::block_on(fx.router.navigate("/a", NavigateOptions::default()));
    assert_eq!(fx.fetcher.calls.borrow().len(), 1);
    assert_eq!(fx.host.borrow().rendered, vec!["content"]);
}

#[test]
fn test_disabled_router_always_reloads() {
    let fetcher = Rc::new(MockFetcher::default());
    let loader = Rc::new(MockLoader::default());
    let host = Rc::new(RefCell::new(MockHost::default()));
    let router = Router::new(
        Rc::clone(&fetcher) as Rc<dyn PageFetcher>,
        loader as Rc<dyn ModuleLoader>,
        Rc::clone(&host) as Rc<RefCell<dyn RenderHost>>,
        DirectiveSchema::new("reef"),
        Url::parse("https://site.test/").unwrap(),
        true,
    );

    let ex = LocalExecutor::new();
    let nav = ex.spawn(router.navigate("/a", NavigateOptions::default()));
    run_until(&ex, || !host.borrow().reloads.is_empty());

    assert_eq!(host.borrow().reloads, vec!["/a"]);
    assert!(!nav.is_finished());
    assert!(fetcher.calls.borrow().is_empty());
}

#[test]
fn test_fetched_page_disabling_client_navigation_reloads() {
    let html = r#"<html><head><title>Locked</title>
        <script type="application/json" id="reef-interactivity-data">
          { "config": { "reef/router": { "clientNavigationDisabled": true } } }
        </script></head>
        <body><main data-reef-router-region="content">x</main></body></html>"#;
    let mut fetcher = MockFetcher::default();
    fetcher
        .ready
        .insert("https://site.test/locked".into(), Ok(html.to_string()));
    let fx = fixture(fetcher);

    let ex = LocalExecutor::new();
    let nav = ex.spawn(fx.router.navigate("/locked", NavigateOptions::default()));
    run_until(&ex, || !fx.host.borrow().reloads.is_empty());

    assert_eq!(fx.host.borrow().reloads, vec!["/locked"]);
    assert!(!nav.is_finished());
    // Nothing of the locked page is committed client-side.
    assert!(fx.host.borrow().rendered.is_empty());
    assert!(fx.host.borrow().titles.is_empty());
    assert!(fx.loader.imports.borrow().is_empty());
}

#[test]
fn test_force_navigate_refetches_after_failure() {
    let (tx, rx) = oneshot::channel();
    let mut fetcher = MockFetcher::default();
    fetcher
        .gated
        .borrow_mut()
        .insert("https://site.test/a".into(), rx);
    fetcher
        .ready
        .insert("https://site.test/a".into(), Ok(page_html("A", "fresh")));
    let fx = fixture(fetcher);

    let ex = LocalExecutor::new();
    let first = ex.spawn(fx.router.navigate("/a", NavigateOptions::default()));
    run_until(&ex, || fx.fetcher.calls.borrow().len() == 1);
    tx.send(Err(FetchError {
        url: "https://site.test/a".into(),
        reason: "offline".into(),
    }))
    .unwrap();
    run_until(&ex, || !fx.host.borrow().reloads.is_empty());
    assert!(!first.is_finished());
    assert!(fx.host.borrow().rendered.is_empty());

    // The failure is cached; only a forced navigation refetches.
    let options = NavigateOptions {
        force: true,
        ..NavigateOptions::default()
    };
    let forced = ex.spawn(fx.router.navigate("/a", options));
    run_until(&ex, || forced.is_finished());

    assert_eq!(fx.fetcher.calls.borrow().len(), 2);
    assert_eq!(fx.host.borrow().rendered, vec!["content"]);
    assert_eq!(fx.host.borrow().titles, vec!["A"]);
}

#[test]
fn test_new_region_attaches_at_selector() {
    let html = r##"<html><head><title>P</title></head><body>
        <main data-reef-router-region="content">x</main>
        <aside data-reef-router-region='{"id":"sidebar","attachTo":"#slot"}'>y</aside>
      </body></html>"##;
    let mut fetcher = MockFetcher::default();
    fetcher
        .ready
        .insert("https://site.test/a".into(), Ok(html.to_string()));
    let fx = fixture(fetcher);

    smol::block_on(fx.router.navigate("/a", NavigateOptions::default()));
    let host = fx.host.borrow();
    assert_eq!(host.rendered, vec!["content"]);
    assert_eq!(host.attached, vec![("sidebar".to_string(), "#slot".to_string())]);
}
