use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::element::Element as CdpElement;
use chromiumoxide::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::{CrawlerError, Result};
use crate::browser::config::BrowserSettings;
use crate::browser::{script, Element, Engine, Launcher, Page, WaitState};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn browser_err(context: &str, e: impl std::fmt::Display) -> CrawlerError {
    CrawlerError::Browser(format!("{}: {}", context, e))
}

/// Launches Chrome/Chromium through chromiumoxide
pub struct ChromeLauncher {
    settings: BrowserSettings,
    network_idle: Duration,
}

impl ChromeLauncher {
    pub fn new(settings: BrowserSettings, network_idle: Duration) -> Self {
        Self {
            settings,
            network_idle,
        }
    }
}

#[async_trait]
impl Launcher for ChromeLauncher {
    async fn launch(&self) -> Result<Arc<dyn Engine>> {
        let engine = ChromeEngine::launch(self.settings.clone(), self.network_idle).await?;
        Ok(Arc::new(engine))
    }
}

/// A running browser process
pub struct ChromeEngine {
    browser: Arc<Mutex<Option<Browser>>>,
    handler: std::sync::Mutex<Option<JoinHandle<()>>>,
    connected: Arc<AtomicBool>,
    settings: BrowserSettings,
    network_idle: Duration,
}

impl ChromeEngine {
    pub async fn launch(settings: BrowserSettings, network_idle: Duration) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(settings.request_timeout())
            .window_size(settings.viewport_width, settings.viewport_height);

        for arg in settings.launch_args() {
            builder = builder.arg(arg);
        }
        if settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = settings.executable {
            builder = builder.chrome_executable(path);
        }

        let browser_config = builder.build().map_err(|e| {
            CrawlerError::EngineUnavailable(format!("Failed to build browser config: {}", e))
        })?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            CrawlerError::EngineUnavailable(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        let connected = Arc::new(AtomicBool::new(true));
        let flag = connected.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
            flag.store(false, Ordering::SeqCst);
        });

        Ok(Self {
            browser: Arc::new(Mutex::new(Some(browser))),
            handler: std::sync::Mutex::new(Some(handle)),
            connected,
            settings,
            network_idle,
        })
    }

    async fn prepare_page(&self, page: &CdpPage) -> Result<()> {
        if let Some(ref ua) = self.settings.user_agent {
            page.set_user_agent(ua)
                .await
                .map_err(|e| browser_err("Failed to set user agent", e))?;
        }

        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(self.settings.viewport_width as i64)
            .height(self.settings.viewport_height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| browser_err("Failed to build viewport", e))?;
        page.execute(metrics)
            .await
            .map_err(|e| browser_err("Failed to set viewport", e))?;

        if self.settings.stealth {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
                script::STEALTH_SCRIPT,
            ))
            .await
            .map_err(|e| browser_err("Failed to install init script", e))?;
        }

        Ok(())
    }
}

async fn dispose_context(browser: &Mutex<Option<Browser>>, context_id: BrowserContextId) {
    let guard = browser.lock().await;
    if let Some(browser) = guard.as_ref() {
        if let Err(e) = browser
            .execute(DisposeBrowserContextParams::new(context_id))
            .await
        {
            debug!("Failed to dispose browser context: {}", e);
        }
    }
}

#[async_trait]
impl Engine for ChromeEngine {
    async fn new_page(&self) -> Result<Box<dyn Page>> {
        let (context_id, page) = {
            let guard = self.browser.lock().await;
            let browser = guard
                .as_ref()
                .ok_or_else(|| CrawlerError::EngineUnavailable("Browser is closed".into()))?;

            let context_id = browser
                .execute(CreateBrowserContextParams::default())
                .await
                .map_err(|e| {
                    CrawlerError::EngineUnavailable(format!("Failed to create context: {}", e))
                })?
                .result
                .browser_context_id;

            let params = CreateTargetParams::builder()
                .url("about:blank")
                .browser_context_id(context_id.clone())
                .build()
                .map_err(CrawlerError::EngineUnavailable)?;

            match browser.new_page(params).await {
                Ok(page) => (context_id, page),
                Err(e) => {
                    let _ = browser
                        .execute(DisposeBrowserContextParams::new(context_id))
                        .await;
                    return Err(CrawlerError::EngineUnavailable(format!(
                        "Failed to create page: {}",
                        e
                    )));
                }
            }
        };

        if let Err(e) = self.prepare_page(&page).await {
            let _ = page.clone().close().await;
            dispose_context(&self.browser, context_id).await;
            return Err(CrawlerError::EngineUnavailable(e.to_string()));
        }

        Ok(Box::new(ChromePage {
            page,
            context_id,
            browser: self.browser.clone(),
            network_idle: self.network_idle,
        }))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<()> {
        let browser = self.browser.lock().await.take();
        if let Some(mut browser) = browser {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser cleanly: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Failed to wait for browser exit: {}", e);
            }
        }

        let handle = self.handler.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            handle.abort();
        }
        self.connected.store(false, Ordering::SeqCst);

        Ok(())
    }
}

#[derive(Deserialize)]
struct DocumentActivity {
    ready: bool,
    resources: u64,
}

/// A page in its own browser context
pub struct ChromePage {
    page: CdpPage,
    context_id: BrowserContextId,
    browser: Arc<Mutex<Option<Browser>>>,
    network_idle: Duration,
}

impl ChromePage {
    async fn eval<T: DeserializeOwned>(&self, js: String) -> Result<T> {
        self.page
            .evaluate(js)
            .await
            .map_err(|e| browser_err("Script execution failed", e))?
            .into_value::<T>()
            .map_err(|e| browser_err("Failed to parse script result", format!("{:?}", e)))
    }

    /// Wait until the document is loaded and no new resources were
    /// requested for one idle period.
    async fn wait_for_network_idle(&self) -> Result<()> {
        let mut last_count = None;
        let mut quiet_since = Instant::now();

        loop {
            let activity: DocumentActivity =
                match self.eval(script::document_activity().to_string()).await {
                    Ok(activity) => activity,
                    Err(e) => {
                        // The document is being swapped; start the quiet window over
                        debug!("Document activity unavailable: {}", e);
                        last_count = None;
                        tokio::time::sleep(POLL_INTERVAL).await;
                        continue;
                    }
                };

            if activity.ready && last_count == Some(activity.resources) {
                if quiet_since.elapsed() >= self.network_idle {
                    return Ok(());
                }
            } else {
                last_count = Some(activity.resources);
                quiet_since = Instant::now();
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn state_of(&self, selector: &str) -> String {
        observed_state(selector, self.eval(script::element_state(selector)).await)
    }
}

/// A failed evaluation reads as "absent": while a navigation swaps the
/// document there is no execution context to ask.
fn observed_state(selector: &str, evaluated: Result<String>) -> String {
    match evaluated {
        Ok(state) => state,
        Err(e) => {
            debug!(selector, "Element state unavailable: {}", e);
            "absent".to_string()
        }
    }
}

fn state_matches(state: &str, wanted: WaitState) -> bool {
    match wanted {
        WaitState::Attached => state != "absent",
        WaitState::Visible => state == "visible",
        WaitState::Hidden => state != "visible",
        WaitState::Detached => state == "absent",
    }
}

#[async_trait]
impl Page for ChromePage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        let navigation = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| CrawlerError::NavigationFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            self.wait_for_network_idle().await
        };

        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| CrawlerError::NavigationTimeout {
                url: url.to_string(),
                timeout_secs: timeout.as_secs(),
            })??;

        let status: Option<u16> = self.eval(script::navigation_status().to_string()).await?;
        match status {
            Some(code) if code >= 400 => Err(CrawlerError::NavigationFailed {
                url: url.to_string(),
                reason: format!("HTTP status {}", code),
            }),
            _ => Ok(()),
        }
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| browser_err("Failed to read page URL", e))?;
        Ok(url.unwrap_or_default())
    }

    async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> Result<()> {
        self.wait_for_selector(selector, WaitState::Visible, timeout)
            .await?;
        let filled: bool = self.eval(script::fill_field(selector, value)).await?;
        if filled {
            Ok(())
        } else {
            Err(CrawlerError::FormFieldMissing(selector.to_string()))
        }
    }

    async fn click(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.wait_for_selector(selector, WaitState::Visible, timeout)
            .await?;
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| browser_err("Failed to find element", e))?;
        element
            .click()
            .await
            .map_err(|e| browser_err("Click failed", e))?;
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<()> {
        let poll = async {
            loop {
                let current = self.state_of(selector).await;
                if state_matches(&current, state) {
                    return;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| CrawlerError::ElementTimeout(selector.to_string()))
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<Box<dyn Element>>> {
        Ok(self.query_selector_all(selector).await?.into_iter().next())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Box<dyn Element>>> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| browser_err("Query failed", e))?;
        Ok(elements
            .into_iter()
            .map(|element| Box::new(ChromeElement { element }) as Box<dyn Element>)
            .collect())
    }

    async fn scroll_to_top(&self, selector: &str) -> Result<bool> {
        self.eval(script::scroll_to_top(selector)).await
    }

    async fn close(&self) -> Result<()> {
        if let Err(e) = self.page.clone().close().await {
            debug!("Failed to close page: {}", e);
        }
        dispose_context(&self.browser, self.context_id.clone()).await;
        Ok(())
    }
}

struct ChromeElement {
    element: CdpElement,
}

#[async_trait]
impl Element for ChromeElement {
    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.element
            .attribute(name)
            .await
            .map_err(|e| browser_err("Failed to read attribute", e))
    }

    async fn inner_text(&self) -> Result<Option<String>> {
        self.element
            .inner_text()
            .await
            .map_err(|e| browser_err("Failed to read text", e))
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<Box<dyn Element>>> {
        let mut found = self
            .element
            .find_elements(selector)
            .await
            .map_err(|e| browser_err("Query failed", e))?;
        if found.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(ChromeElement {
            element: found.remove(0),
        })))
    }
}
