//! Host seams the router drives.
//!
//! Network, module loading and rendering are environment concerns; the
//! router only sequences them. Hosts implement these traits against
//! their real document, fetch stack and module system.

use crate::page::StyleAsset;
use futures::future::LocalBoxFuture;
use reef_vdom::VNode;
use serde_json::Value;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("request for {url} failed: {reason}")]
pub struct FetchError {
    pub url: String,
    pub reason: String,
}

/// Fetches page markup over the network.
pub trait PageFetcher {
    fn fetch(&self, url: String) -> LocalBoxFuture<'static, Result<String, FetchError>>;
}

/// Loads script modules by resolved URL.
pub trait ModuleLoader {
    fn import(&self, url: String) -> LocalBoxFuture<'static, Result<(), FetchError>>;
}

/// The live document the router renders into.
pub trait RenderHost {
    /// Router regions currently present in the document, by id.
    fn region_ids(&self) -> Vec<String>;

    /// Re-render an existing region from a translated tree.
    fn render_region(&mut self, id: &str, tree: &Rc<VNode>);

    /// Mount a region that has no counterpart in the current document at
    /// the element matching `selector`. Returns false when no such
    /// element exists.
    fn attach_region(&mut self, id: &str, selector: &str, tree: &Rc<VNode>) -> bool;

    /// Ensure the page's stylesheets are present, preserving order.
    fn apply_styles(&mut self, styles: &[StyleAsset]);

    fn set_title(&mut self, title: &str);

    /// Merge server-provided state/config payloads before rendering.
    fn populate_server_data(&mut self, data: &Value);

    /// Update the address bar. `replace` swaps the current history entry
    /// instead of pushing.
    fn update_url(&mut self, url: &str, replace: bool);

    /// Toggle the long-navigation loading indicator.
    fn set_loading(&mut self, active: bool);

    /// Full page load; client-side navigation is abandoned.
    fn reload(&mut self, url: &str);

    /// Screen-reader announcement.
    fn announce(&mut self, message: &str);

    /// Scroll to a fragment anchor, if present.
    fn scroll_to_anchor(&mut self, anchor: &str);
}
