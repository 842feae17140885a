//! Scripted in-memory browser used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::app::{CrawlerError, Result};
use crate::browser::{Element, Engine, Launcher, Page, WaitState};

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    attrs: HashMap<String, String>,
    text: Option<String>,
    children: Vec<(String, FakeElement)>,
    broken: bool,
}

impl FakeElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn child(mut self, selector: &str, child: FakeElement) -> Self {
        self.children.push((selector.to_string(), child));
        self
    }

    /// Child lookups fail as if the node had been detached mid-read.
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }
}

#[async_trait]
impl Element for FakeElement {
    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.attrs.get(name).cloned())
    }

    async fn inner_text(&self) -> Result<Option<String>> {
        Ok(self.text.clone())
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<Box<dyn Element>>> {
        if self.broken {
            return Err(CrawlerError::Browser("Node is detached from document".into()));
        }
        Ok(self
            .children
            .iter()
            .find(|(sel, _)| sel == selector)
            .map(|(_, child)| Box::new(child.clone()) as Box<dyn Element>))
    }
}

#[derive(Debug, Clone)]
enum GotoFailure {
    Timeout,
    Status(u16),
}

/// The DOM script a fake page plays back, plus what the page was asked to do.
#[derive(Debug, Clone, Default)]
pub struct FakeDom {
    pub url: String,
    visible: HashSet<String>,
    elements: HashMap<String, Vec<FakeElement>>,
    reveal_on_click: HashMap<String, Vec<String>>,
    goto_failure: Option<GotoFailure>,
    snapshot_selector: Option<String>,
    snapshots: Vec<Vec<FakeElement>>,
    cursor: usize,
    failing_query: Option<(String, usize)>,
    queries: HashMap<String, usize>,
    container_scroll_limit: Option<usize>,
    loading: Option<LoadingIndicator>,
    pub visits: Vec<String>,
    pub fills: Vec<(String, String)>,
    pub clicks: Vec<String>,
    pub scrolls: usize,
    /// Times a loading indicator was seen going away
    pub loads_finished: usize,
    pub closed: bool,
}

#[derive(Debug, Clone)]
struct LoadingIndicator {
    selector: String,
    clears: bool,
    showing: bool,
}

impl FakeDom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible(mut self, selector: &str) -> Self {
        self.visible.insert(selector.to_string());
        self
    }

    pub fn elements(mut self, selector: &str, elements: Vec<FakeElement>) -> Self {
        self.elements.insert(selector.to_string(), elements);
        self
    }

    /// Clicking `clicked` makes `revealed` visible.
    pub fn reveal_on_click(mut self, clicked: &str, revealed: &str) -> Self {
        self.reveal_on_click
            .entry(clicked.to_string())
            .or_default()
            .push(revealed.to_string());
        self
    }

    pub fn goto_times_out(mut self) -> Self {
        self.goto_failure = Some(GotoFailure::Timeout);
        self
    }

    pub fn goto_status(mut self, status: u16) -> Self {
        self.goto_failure = Some(GotoFailure::Status(status));
        self
    }

    /// Each scroll-to-top moves to the next snapshot; the last one repeats.
    pub fn snapshots(mut self, selector: &str, snapshots: Vec<Vec<FakeElement>>) -> Self {
        self.snapshot_selector = Some(selector.to_string());
        self.snapshots = snapshots;
        self
    }

    /// `query_selector_all(selector)` answers `ok_queries` times, then fails.
    pub fn fail_queries_after(mut self, selector: &str, ok_queries: usize) -> Self {
        self.failing_query = Some((selector.to_string(), ok_queries));
        self
    }

    /// The scroll container disappears after `scrolls` successful scrolls.
    pub fn container_lost_after(mut self, scrolls: usize) -> Self {
        self.container_scroll_limit = Some(scrolls);
        self
    }

    /// `selector` shows up after every scroll; it goes away once waited on
    /// unless `clears` is false.
    pub fn loading_on_scroll(mut self, selector: &str, clears: bool) -> Self {
        self.loading = Some(LoadingIndicator {
            selector: selector.to_string(),
            clears,
            showing: false,
        });
        self
    }

    /// Wait outcome for the loading indicator, if `selector` is it.
    fn wait_loading(&mut self, selector: &str, state: WaitState) -> Option<bool> {
        let loading = self.loading.as_mut().filter(|l| l.selector == selector)?;
        let satisfied = match state {
            WaitState::Attached | WaitState::Visible => loading.showing,
            WaitState::Hidden | WaitState::Detached => {
                if loading.clears {
                    loading.showing = false;
                }
                !loading.showing
            }
        };
        if satisfied && matches!(state, WaitState::Hidden | WaitState::Detached) {
            self.loads_finished += 1;
        }
        Some(satisfied)
    }

    fn current_snapshot(&self) -> Vec<FakeElement> {
        self.snapshots
            .get(self.cursor.min(self.snapshots.len().saturating_sub(1)))
            .cloned()
            .unwrap_or_default()
    }

    fn matches(&self, selector: &str) -> Vec<FakeElement> {
        if self.snapshot_selector.as_deref() == Some(selector) {
            return self.current_snapshot();
        }
        self.elements.get(selector).cloned().unwrap_or_default()
    }

    fn is_present(&self, selector: &str) -> bool {
        self.visible.contains(selector) || !self.matches(selector).is_empty()
    }
}

pub struct FakePage {
    dom: Mutex<FakeDom>,
    stats: Option<Arc<FakeStats>>,
}

impl FakePage {
    pub fn new(dom: FakeDom) -> Self {
        Self {
            dom: Mutex::new(dom),
            stats: None,
        }
    }

    fn dom(&self) -> MutexGuard<'_, FakeDom> {
        self.dom.lock().unwrap()
    }

    /// Copy of the page state, including recorded interactions.
    pub fn recorded(&self) -> FakeDom {
        self.dom().clone()
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        let mut dom = self.dom();
        dom.visits.push(url.to_string());
        match dom.goto_failure {
            Some(GotoFailure::Timeout) => Err(CrawlerError::NavigationTimeout {
                url: url.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
            Some(GotoFailure::Status(code)) => Err(CrawlerError::NavigationFailed {
                url: url.to_string(),
                reason: format!("HTTP status {}", code),
            }),
            None => {
                dom.url = url.to_string();
                Ok(())
            }
        }
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.dom().url.clone())
    }

    async fn fill(&self, selector: &str, value: &str, _timeout: Duration) -> Result<()> {
        let mut dom = self.dom();
        if !dom.visible.contains(selector) {
            return Err(CrawlerError::ElementTimeout(selector.to_string()));
        }
        dom.fills.push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> Result<()> {
        let mut dom = self.dom();
        if !dom.visible.contains(selector) {
            return Err(CrawlerError::ElementTimeout(selector.to_string()));
        }
        dom.clicks.push(selector.to_string());
        if let Some(revealed) = dom.reveal_on_click.get(selector).cloned() {
            dom.visible.extend(revealed);
        }
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        _timeout: Duration,
    ) -> Result<()> {
        let mut dom = self.dom();
        let satisfied = match dom.wait_loading(selector, state) {
            Some(satisfied) => satisfied,
            None => {
                let present = dom.is_present(selector);
                match state {
                    WaitState::Attached | WaitState::Visible => present,
                    WaitState::Hidden | WaitState::Detached => !present,
                }
            }
        };
        if satisfied {
            Ok(())
        } else {
            Err(CrawlerError::ElementTimeout(selector.to_string()))
        }
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<Box<dyn Element>>> {
        Ok(self.query_selector_all(selector).await?.into_iter().next())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<Box<dyn Element>>> {
        let mut dom = self.dom();
        let answered = dom.queries.entry(selector.to_string()).or_default();
        *answered += 1;
        let answered = *answered;
        if let Some((failing, ok_queries)) = &dom.failing_query {
            if failing == selector && answered > *ok_queries {
                return Err(CrawlerError::Browser("Target closed while querying".into()));
            }
        }
        Ok(dom
            .matches(selector)
            .into_iter()
            .map(|e| Box::new(e) as Box<dyn Element>)
            .collect())
    }

    async fn scroll_to_top(&self, selector: &str) -> Result<bool> {
        let mut dom = self.dom();
        if dom.container_scroll_limit == Some(dom.scrolls) {
            dom.visible.remove(selector);
        }
        if !dom.visible.contains(selector) {
            return Ok(false);
        }
        dom.scrolls += 1;
        dom.cursor += 1;
        if let Some(loading) = dom.loading.as_mut() {
            loading.showing = true;
        }
        Ok(true)
    }

    async fn close(&self) -> Result<()> {
        self.dom().closed = true;
        if let Some(ref stats) = self.stats {
            stats.pages_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeStats {
    pub launches: AtomicUsize,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub disconnect: AtomicBool,
}

/// Launches [`FakeEngine`]s whose pages all play back the same [`FakeDom`].
pub struct FakeLauncher {
    dom: FakeDom,
    stats: Arc<FakeStats>,
    fail_launch: bool,
    fail_pages: bool,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::with_dom(FakeDom::new())
    }

    pub fn with_dom(dom: FakeDom) -> Self {
        Self {
            dom,
            stats: Arc::new(FakeStats::default()),
            fail_launch: false,
            fail_pages: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_launch: true,
            ..Self::new()
        }
    }

    pub fn failing_pages() -> Self {
        Self {
            fail_pages: true,
            ..Self::new()
        }
    }

    pub fn stats(&self) -> Arc<FakeStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self) -> Result<Arc<dyn Engine>> {
        if self.fail_launch {
            return Err(CrawlerError::Browser("no browser binary".into()));
        }
        tokio::task::yield_now().await;
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        self.stats.disconnect.store(false, Ordering::SeqCst);
        Ok(Arc::new(FakeEngine {
            dom: self.dom.clone(),
            stats: self.stats.clone(),
            fail_pages: self.fail_pages,
        }))
    }
}

pub struct FakeEngine {
    dom: FakeDom,
    stats: Arc<FakeStats>,
    fail_pages: bool,
}

#[async_trait]
impl Engine for FakeEngine {
    async fn new_page(&self) -> Result<Box<dyn Page>> {
        if self.fail_pages {
            return Err(CrawlerError::Browser("target crashed".into()));
        }
        self.stats.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            dom: Mutex::new(self.dom.clone()),
            stats: Some(self.stats.clone()),
        }))
    }

    fn is_connected(&self) -> bool {
        !self.stats.disconnect.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<()> {
        self.stats.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
