//! Headless browser capability.
//!
//! Everything above this module talks to the browser through the [`Page`]
//! and [`Element`] traits, so the login, enumeration and scrape logic can run
//! against Chrome or against a scripted DOM in tests.
//!
//! ```text
//! BrowserSession ──lazy launch──▶ Engine ──new isolated context──▶ Page ──▶ Element
//! ```
//!
//! Each call that waits carries its own timeout. A wait that runs out
//! returns an error for which [`CrawlerError::is_timeout`] is true.
//!
//! [`CrawlerError::is_timeout`]: crate::app::CrawlerError::is_timeout

mod chrome;
mod config;
pub mod script;
mod session;

#[cfg(test)]
pub(crate) mod fake;

pub use chrome::{ChromeEngine, ChromeLauncher};
pub use config::BrowserSettings;
pub use session::{BrowserSession, PageLease};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::app::Result;

/// Element condition awaited by [`Page::wait_for_selector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// Present in the DOM, visible or not.
    Attached,
    /// Present and rendered with a non-empty box.
    Visible,
    /// Absent or not rendered.
    Hidden,
    /// Absent from the DOM.
    Detached,
}

/// A handle to one DOM element.
///
/// Every getter treats absence as data: a missing attribute or child is
/// `Ok(None)`, not an error.
#[async_trait]
pub trait Element: Send + Sync {
    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    async fn inner_text(&self) -> Result<Option<String>>;

    async fn query_selector(&self, selector: &str) -> Result<Option<Box<dyn Element>>>;
}

/// One navigable document inside an isolated browser context.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate and wait until network activity settles.
    ///
    /// Fails with `NavigationTimeout` when `timeout` expires and with
    /// `NavigationFailed` on a load error or an HTTP error status.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Replace the value of an input once it is visible.
    async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> Result<()>;

    async fn click(&self, selector: &str, timeout: Duration) -> Result<()>;

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<()>;

    async fn query_selector(&self, selector: &str) -> Result<Option<Box<dyn Element>>>;

    /// All matching elements in document order.
    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Box<dyn Element>>>;

    /// Reset the scroll offset of the first match to its origin.
    ///
    /// Returns `false` when no element matches.
    async fn scroll_to_top(&self, selector: &str) -> Result<bool>;

    /// Close the page and dispose of the context that owns it.
    async fn close(&self) -> Result<()>;
}

/// A running browser engine that hands out isolated pages.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Create a fresh context and a blank page inside it.
    async fn new_page(&self) -> Result<Box<dyn Page>>;

    fn is_connected(&self) -> bool;

    async fn shutdown(&self) -> Result<()>;
}

/// Starts an [`Engine`].
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Engine>>;
}
