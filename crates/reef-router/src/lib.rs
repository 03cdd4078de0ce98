//! Reef Router - page cache and client-side navigation
//!
//! Fetches pages in the background, translates their router regions to
//! virtual trees, and swaps them into the live document without a full
//! load. Script modules are resolved through merged import maps; every
//! failure path degrades to a normal full-page navigation.

mod host;
mod importmap;
mod page;
mod router;

pub use host::{FetchError, ModuleLoader, PageFetcher, RenderHost};
pub use importmap::ImportMap;
pub use page::{Page, Region, StyleAsset, prepare_page};
pub use router::{History, NAVIGATION_TIMEOUT_MS, NavigateOptions, Router};
