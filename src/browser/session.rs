use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::app::{CrawlerError, Result};
use crate::browser::chrome::ChromeLauncher;
use crate::browser::config::BrowserSettings;
use crate::browser::{Engine, Launcher, Page};

/// Owns the shared browser engine and hands out isolated pages.
///
/// The engine starts on the first [`acquire`](Self::acquire) and stops on
/// [`shutdown`](Self::shutdown). Start and stop are serialized behind one
/// lock; pages are used without further locking once acquired.
pub struct BrowserSession {
    launcher: Box<dyn Launcher>,
    engine: Mutex<Option<Arc<dyn Engine>>>,
}

impl BrowserSession {
    pub fn new(launcher: impl Launcher + 'static) -> Self {
        Self {
            launcher: Box::new(launcher),
            engine: Mutex::new(None),
        }
    }

    /// A session backed by a local Chrome/Chromium install
    pub fn chrome(settings: BrowserSettings, network_idle: Duration) -> Self {
        Self::new(ChromeLauncher::new(settings, network_idle))
    }

    async fn engine(&self) -> Result<Arc<dyn Engine>> {
        let mut guard = self.engine.lock().await;

        if let Some(engine) = guard.as_ref() {
            if engine.is_connected() {
                return Ok(engine.clone());
            }
            warn!("Browser disconnected, relaunching");
            if let Err(e) = engine.shutdown().await {
                debug!("Failed to shut down stale browser: {}", e);
            }
            *guard = None;
        }

        info!("Launching browser");
        let engine = self.launcher.launch().await.map_err(|e| match e {
            CrawlerError::EngineUnavailable(_) => e,
            other => CrawlerError::EngineUnavailable(other.to_string()),
        })?;
        *guard = Some(engine.clone());
        Ok(engine)
    }

    /// Open a fresh page in its own context.
    pub async fn acquire(&self) -> Result<PageLease> {
        let engine = self.engine().await?;
        let page = engine.new_page().await.map_err(|e| match e {
            CrawlerError::EngineUnavailable(_) => e,
            other => CrawlerError::EngineUnavailable(other.to_string()),
        })?;
        debug!("Page acquired");
        Ok(PageLease::new(Arc::from(page)))
    }

    /// Close a page and the context behind it.
    pub async fn release(&self, lease: PageLease) {
        lease.close().await;
    }

    /// Stop the engine. Safe to call repeatedly or before any acquire.
    pub async fn shutdown(&self) -> Result<()> {
        let mut guard = self.engine.lock().await;
        if let Some(engine) = guard.take() {
            info!("Closing browser");
            engine.shutdown().await?;
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.engine
            .lock()
            .await
            .as_ref()
            .is_some_and(|e| e.is_connected())
    }
}

/// A page owned by exactly one operation.
///
/// Call [`close`](Self::close) when done. A lease dropped without closing
/// schedules the close on the current runtime.
pub struct PageLease {
    page: Arc<dyn Page>,
    closed: bool,
}

impl PageLease {
    fn new(page: Arc<dyn Page>) -> Self {
        Self {
            page,
            closed: false,
        }
    }

    pub async fn close(mut self) {
        self.closed = true;
        if let Err(e) = self.page.close().await {
            warn!("Error closing page context: {}", e);
        }
    }
}

impl Deref for PageLease {
    type Target = dyn Page;

    fn deref(&self) -> &Self::Target {
        self.page.as_ref()
    }
}

impl Drop for PageLease {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let page = self.page.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = page.close().await {
                        warn!("Error closing dropped page context: {}", e);
                    }
                });
            }
            Err(_) => warn!("Page dropped outside a runtime; its context was not closed"),
        }
    }
}
