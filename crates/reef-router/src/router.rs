//! The navigation router.
//!
//! Pages are cached by `path?query` as shared futures: concurrent
//! prefetches and navigations to the same location share one in-flight
//! request. Navigation races the page future against a timeout; the
//! loading indicator arms only after a debounce window so fast
//! navigations never flash it. Every unrecoverable failure falls back
//! to a full page load, after which the navigation future never
//! resolves (the page is being torn down).

use crate::host::{ModuleLoader, PageFetcher, RenderHost};
use crate::importmap::ImportMap;
use crate::page::{Page, prepare_page};
use futures::FutureExt;
use futures::future::{self, Either, LocalBoxFuture, Shared};
use reef_vdom::DirectiveSchema;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;
use url::Url;

/// Default navigation timeout before falling back to a full load.
pub const NAVIGATION_TIMEOUT_MS: u64 = 10_000;
/// Debounce before the loading indicator arms.
const LOADING_DELAY_MS: u64 = 400;

type PageFuture = Shared<LocalBoxFuture<'static, Option<Rc<Page>>>>;

#[derive(Debug, Clone)]
pub struct NavigateOptions {
    /// Refetch even when the page is cached.
    pub force: bool,
    /// Prepare from this markup instead of fetching.
    pub html: Option<String>,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
    pub timeout_ms: u64,
    pub loading_animation: bool,
    pub screen_reader_announcement: bool,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            force: false,
            html: None,
            replace: false,
            timeout_ms: NAVIGATION_TIMEOUT_MS,
            loading_animation: true,
            screen_reader_announcement: true,
        }
    }
}

#[derive(Debug, Clone)]
struct NavigationTexts {
    loading: String,
    loaded: String,
}

impl Default for NavigationTexts {
    fn default() -> Self {
        Self {
            loading: "Loading page, please wait.".into(),
            loaded: "Page Loaded.".into(),
        }
    }
}

/// Session history, tracked in parallel with the host's real history so
/// popstate replay and back/forward work against the page cache.
#[derive(Debug)]
pub struct History {
    entries: Vec<String>,
    index: usize,
}

impl History {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            entries: vec![initial.into()],
            index: 0,
        }
    }

    pub fn current(&self) -> &str {
        &self.entries[self.index]
    }

    /// Push a new entry, discarding any forward entries.
    pub fn push(&mut self, entry: impl Into<String>) {
        self.entries.truncate(self.index + 1);
        self.entries.push(entry.into());
        self.index = self.entries.len() - 1;
    }

    pub fn replace(&mut self, entry: impl Into<String>) {
        self.entries[self.index] = entry.into();
    }

    pub fn back(&mut self) -> Option<&str> {
        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(self.current())
    }

    pub fn forward(&mut self) -> Option<&str> {
        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(self.current())
    }
}

pub struct Router {
    fetcher: Rc<dyn PageFetcher>,
    loader: Rc<dyn ModuleLoader>,
    host: Rc<RefCell<dyn RenderHost>>,
    schema: DirectiveSchema,
    base_url: Url,
    disabled: bool,
    pages: RefCell<HashMap<String, PageFuture>>,
    navigating_to: RefCell<String>,
    texts: RefCell<NavigationTexts>,
    texts_loaded: Cell<bool>,
    import_map: RefCell<ImportMap>,
    resolved_modules: RefCell<HashSet<String>>,
    history: RefCell<History>,
}

impl Router {
    /// `base_url` doubles as the current location at construction time.
    pub fn new(
        fetcher: Rc<dyn PageFetcher>,
        loader: Rc<dyn ModuleLoader>,
        host: Rc<RefCell<dyn RenderHost>>,
        schema: DirectiveSchema,
        base_url: Url,
        disabled: bool,
    ) -> Self {
        let initial = page_key(&base_url);
        Self {
            fetcher,
            loader,
            host,
            schema,
            base_url,
            disabled,
            pages: RefCell::new(HashMap::new()),
            navigating_to: RefCell::new(String::new()),
            texts: RefCell::new(NavigationTexts::default()),
            texts_loaded: Cell::new(false),
            import_map: RefCell::new(ImportMap::new()),
            resolved_modules: RefCell::new(HashSet::new()),
            history: RefCell::new(History::new(initial)),
        }
    }

    pub fn client_navigation_disabled(&self) -> bool {
        self.disabled
    }

    /// Cache the server-rendered page the session started on, so going
    /// back to it never refetches.
    pub fn seed_initial_page(&self, html: &str) {
        let page = Rc::new(prepare_page(html, self.base_url.as_str(), &self.schema));
        self.adopt_router_data(&page);
        if let Some(map) = &page.import_map {
            self.import_map.borrow_mut().add(map, &self.base_url);
        }
        let key = page_key(&self.base_url);
        self.pages
            .borrow_mut()
            .insert(key, future::ready(Some(page)).boxed_local().shared());
    }

    /// Start fetching and preparing a page. Idempotent: an existing
    /// cache entry (even a failed one) is kept unless `force` is set.
    pub fn prefetch(&self, href: &str, options: &NavigateOptions) {
        if self.disabled {
            return;
        }
        let Some(url) = self.resolve_href(href) else {
            return;
        };
        let key = page_key(&url);
        let mut pages = self.pages.borrow_mut();
        if !options.force && pages.contains_key(&key) {
            return;
        }
        let fut = match &options.html {
            Some(html) => {
                let page = Rc::new(prepare_page(html, url.as_str(), &self.schema));
                future::ready(Some(page)).boxed_local().shared()
            }
            None => self.fetch_page(url),
        };
        pages.insert(key, fut);
    }

    /// Navigate to a location.
    ///
    /// If client navigation is disabled or anything goes wrong, the host
    /// is told to do a full load and this future stays pending forever.
    /// A newer navigation makes this one return quietly without
    /// rendering (stale-result guard).
    pub async fn navigate(&self, href: &str, options: NavigateOptions) {
        if self.disabled {
            self.host.borrow_mut().reload(href);
            return future::pending().await;
        }
        let Some(url) = self.resolve_href(href) else {
            tracing::warn!("cannot resolve navigation target '{href}'");
            return;
        };
        let key = page_key(&url);
        self.prefetch(href, &options);
        *self.navigating_to.borrow_mut() = href.to_string();

        let Some(page_fut) = self.pages.borrow().get(&key).cloned() else {
            return;
        };

        let outcome = {
            let page_branch = async { Some(page_fut.await) };
            let timer_branch = async {
                let timeout = options.timeout_ms;
                smol::Timer::after(Duration::from_millis(timeout.min(LOADING_DELAY_MS))).await;
                if timeout > LOADING_DELAY_MS {
                    let still_current = self.navigating_to.borrow().as_str() == href;
                    if still_current && options.loading_animation {
                        self.host.borrow_mut().set_loading(true);
                        if options.screen_reader_announcement {
                            let loading = self.texts.borrow().loading.clone();
                            self.host.borrow_mut().announce(&loading);
                        }
                    }
                    smol::Timer::after(Duration::from_millis(timeout - LOADING_DELAY_MS)).await;
                }
                None
            };
            futures::pin_mut!(page_branch);
            futures::pin_mut!(timer_branch);
            match future::select(page_branch, timer_branch).await {
                Either::Left((page, _)) => page,
                Either::Right((timed_out, _)) => timed_out,
            }
        };

        if self.navigating_to.borrow().as_str() != href {
            return;
        }

        match outcome {
            Some(Some(page)) => {
                // The destination itself can opt out of client-side
                // navigation through its embedded config.
                if self.page_disables_navigation(&page) {
                    let mut host = self.host.borrow_mut();
                    host.set_loading(false);
                    host.reload(href);
                    drop(host);
                    return future::pending().await;
                }
                self.load_page_modules(&page, &url).await;
                if self.navigating_to.borrow().as_str() != href {
                    return;
                }
                self.render_page(&page, &url, &options);
                if options.replace {
                    self.history.borrow_mut().replace(key);
                } else {
                    self.history.borrow_mut().push(key);
                }
            }
            // Fetch failure or timeout: hand over to a full load.
            Some(None) | None => {
                let mut host = self.host.borrow_mut();
                host.set_loading(false);
                host.reload(href);
                drop(host);
                future::pending().await
            }
        }
    }

    /// History traversal: render a cached page without touching the
    /// cache or pushing history. Uncached locations force a full load.
    pub async fn handle_popstate(&self, href: &str) {
        let Some(url) = self.resolve_href(href) else {
            return;
        };
        let key = page_key(&url);
        let cached = self.pages.borrow().get(&key).cloned();
        match cached {
            Some(fut) => match fut.await {
                Some(page) => {
                    let options = NavigateOptions {
                        replace: true,
                        ..NavigateOptions::default()
                    };
                    self.render_page(&page, &url, &options);
                }
                None => self.host.borrow_mut().reload(href),
            },
            None => self.host.borrow_mut().reload(href),
        }
    }

    pub async fn back(&self) {
        let target = {
            let mut history = self.history.borrow_mut();
            history.back().map(str::to_string)
        };
        if let Some(target) = target {
            self.handle_popstate(&target).await;
        }
    }

    pub async fn forward(&self) {
        let target = {
            let mut history = self.history.borrow_mut();
            history.forward().map(str::to_string)
        };
        if let Some(target) = target {
            self.handle_popstate(&target).await;
        }
    }

    fn page_disables_navigation(&self, page: &Page) -> bool {
        let namespace = format!("{}/router", self.schema.prefix());
        page.server_data
            .as_ref()
            .and_then(|data| data.get("config"))
            .and_then(|config| config.get(&namespace))
            .and_then(|router| router.get("clientNavigationDisabled"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn fetch_page(&self, url: Url) -> PageFuture {
        let fetcher = Rc::clone(&self.fetcher);
        let schema = self.schema.clone();
        async move {
            match fetcher.fetch(url.to_string()).await {
                Ok(html) => Some(Rc::new(prepare_page(&html, url.as_str(), &schema))),
                Err(err) => {
                    tracing::warn!("page fetch failed: {err}");
                    None
                }
            }
        }
        .boxed_local()
        .shared()
    }

    /// Import the page's script modules, resolving through the merged
    /// import maps. Each resolved URL is imported at most once per
    /// session.
    async fn load_page_modules(&self, page: &Page, url: &Url) {
        if let Some(map) = &page.import_map {
            self.import_map.borrow_mut().add(map, &self.base_url);
        }
        let modules: Vec<String> = page
            .script_modules
            .iter()
            .map(|src| {
                self.import_map
                    .borrow()
                    .resolve(src, url)
                    .unwrap_or_else(|| src.clone())
            })
            .collect();
        for module in modules {
            let fresh = self.resolved_modules.borrow_mut().insert(module.clone());
            if fresh {
                if let Err(err) = self.loader.import(module).await {
                    tracing::warn!("module import failed: {err}");
                }
            }
        }
    }

    fn render_page(&self, page: &Page, url: &Url, options: &NavigateOptions) {
        self.adopt_router_data(page);
        let mut host = self.host.borrow_mut();
        if let Some(data) = &page.server_data {
            host.populate_server_data(data);
        }
        host.apply_styles(&page.styles);
        let existing: HashSet<String> = host.region_ids().into_iter().collect();
        for region in &page.regions {
            if existing.contains(&region.id) {
                host.render_region(&region.id, &region.tree);
            } else if let Some(selector) = &region.attach_to {
                if !host.attach_region(&region.id, selector, &region.tree) {
                    tracing::warn!("no mount point '{selector}' for region '{}'", region.id);
                }
            } else {
                tracing::warn!("region '{}' is new but has no attach selector", region.id);
            }
        }
        if let Some(title) = &page.title {
            host.set_title(title);
        }
        host.set_loading(false);
        host.update_url(url.as_str(), options.replace);
        if options.screen_reader_announcement {
            host.announce(&self.texts.borrow().loaded);
        }
        if let Some(fragment) = url.fragment() {
            host.scroll_to_anchor(fragment);
        }
    }

    /// Navigation texts come from the first page carrying them and stay
    /// fixed for the session.
    fn adopt_router_data(&self, page: &Page) {
        if self.texts_loaded.get() {
            return;
        }
        let Some(data) = &page.router_data else {
            return;
        };
        if let Some(texts) = data.get("texts") {
            let mut current = self.texts.borrow_mut();
            if let Some(s) = texts.get("loading").and_then(|v| v.as_str()) {
                current.loading = s.to_string();
            }
            if let Some(s) = texts.get("loaded").and_then(|v| v.as_str()) {
                current.loaded = s.to_string();
            }
        }
        self.texts_loaded.set(true);
    }

    fn resolve_href(&self, href: &str) -> Option<Url> {
        match self.base_url.join(href) {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!("invalid href '{href}': {err}");
                None
            }
        }
    }
}

/// Cache key: path plus query. Domain and fragment never distinguish
/// cached pages.
fn page_key(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}
