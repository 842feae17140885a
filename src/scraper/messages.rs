use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::sleep;

use crate::app::{CrawlerError, Result};
use crate::browser::{Element, Page, WaitState};
use crate::config::{Config, SelectorConfig, TimeoutConfig};
use crate::domain::{Channel, DepthPolicy, Message, UNKNOWN_SENDER};
use crate::progress::ProgressReporter;
use crate::scraper::{ScrapeConfig, ScrapeResult, TimestampParser};

/// Why the scroll loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A message older than the depth cutoff was reached.
    CutoffReached,
    /// Several passes in a row surfaced nothing new.
    TopOfHistory,
    /// Several passes in a row rendered no messages at all.
    NoMessagesRendered,
    /// The scroll container disappeared.
    ContainerLost,
    /// Nobody is listening to the progress stream anymore.
    Cancelled,
    /// A browser error interrupted the loop; see [`ScrapeReport::error`].
    Aborted,
}

impl StopReason {
    pub fn describe(&self) -> &'static str {
        match self {
            StopReason::CutoffReached => "depth limit reached",
            StopReason::TopOfHistory => "top of channel history",
            StopReason::NoMessagesRendered => "no messages rendered",
            StopReason::ContainerLost => "message container lost",
            StopReason::Cancelled => "cancelled",
            StopReason::Aborted => "aborted",
        }
    }
}

/// What one channel scrape produced. Messages gathered before an
/// interruption are always kept.
#[derive(Debug)]
pub struct ScrapeReport {
    pub result: ScrapeResult,
    pub stop: StopReason,
    pub passes: u32,
    pub error: Option<CrawlerError>,
}

#[derive(Default)]
struct LoopState {
    seen: HashSet<String>,
    messages: Vec<Message>,
    empty_passes: u32,
    stale_passes: u32,
    passes: u32,
}

/// Walks a channel's history upward, scroll by scroll.
///
/// Every pass reads the rendered message list bottom to top, keeps
/// messages whose id has not been seen yet, then scrolls the container to
/// the top so the site lazily renders older history.
pub struct MessageScraper {
    selectors: SelectorConfig,
    timeouts: TimeoutConfig,
    config: ScrapeConfig,
    parser: TimestampParser,
}

impl MessageScraper {
    pub fn new(selectors: SelectorConfig, timeouts: TimeoutConfig, config: ScrapeConfig) -> Self {
        let parser = TimestampParser::from_config(&config);
        Self {
            selectors,
            timeouts,
            config,
            parser,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.selectors.clone(),
            config.timeouts.clone(),
            config.scrape.clone(),
        )
    }

    /// Scrape one channel back to `depth`.
    ///
    /// Errors only when the channel cannot be opened at all; anything that
    /// goes wrong once scrolling has started ends the loop with the
    /// messages gathered so far.
    pub async fn scrape(
        &self,
        page: &dyn Page,
        channel: &Channel,
        depth: DepthPolicy,
        progress: &ProgressReporter,
    ) -> Result<ScrapeReport> {
        progress.info(format!("Navigating to channel: {}", channel.target));
        page.goto(&channel.target, self.timeouts.navigation()).await?;

        let channel_name = self.confirm_room(page, channel, progress).await;

        progress.dev(format!(
            "Waiting for message container ({})...",
            self.selectors.message_container
        ));
        page.wait_for_selector(
            &self.selectors.message_container,
            WaitState::Visible,
            self.timeouts.message_container(),
        )
        .await?;

        let cutoff = depth.cutoff(Utc::now());
        progress.info(format!(
            "Starting message scraping for '{}' ({}).",
            channel_name, depth
        ));

        let mut state = LoopState::default();
        let mut error = None;
        let stop = loop {
            if progress.is_closed() {
                break StopReason::Cancelled;
            }
            state.passes += 1;
            match self.pass(page, cutoff, &mut state, progress).await {
                Ok(Some(stop)) => break stop,
                Ok(None) => {}
                Err(e) => {
                    progress.warn(format!(
                        "Scraping '{}' interrupted on pass {}: {}",
                        channel_name, state.passes, e
                    ));
                    error = Some(e);
                    break StopReason::Aborted;
                }
            }
        };

        let mut result = ScrapeResult {
            channel_name,
            messages: state.messages,
        };
        if self.config.sort_by_timestamp {
            result.sort_chronologically();
        }

        progress.success(format!(
            "Scraping finished for '{}'. Found {} messages ({}).",
            result.channel_name,
            result.messages.len(),
            stop.describe()
        ));

        Ok(ScrapeReport {
            result,
            stop,
            passes: state.passes,
            error,
        })
    }

    /// Returns the name results are filed under.
    async fn confirm_room(
        &self,
        page: &dyn Page,
        channel: &Channel,
        progress: &ProgressReporter,
    ) -> String {
        let header = match page
            .wait_for_selector(
                &self.selectors.room_header,
                WaitState::Visible,
                self.timeouts.room_header(),
            )
            .await
        {
            Ok(()) => match page.query_selector(&self.selectors.room_header).await {
                Ok(Some(el)) => el.inner_text().await.ok().flatten(),
                _ => None,
            },
            Err(_) => None,
        };
        let header = header.map(|h| h.trim().to_string()).filter(|h| !h.is_empty());

        match header {
            Some(title) => {
                if !channel.name.is_empty() && !title.eq_ignore_ascii_case(channel.name.trim()) {
                    progress.warn(format!(
                        "Room header says '{}' but '{}' was requested.",
                        title, channel.name
                    ));
                }
                progress.success(format!("Entered channel: {}", title));
                if channel.name.is_empty() {
                    title
                } else {
                    channel.name.clone()
                }
            }
            None => {
                progress.dev("Room header not found. Continuing.");
                channel.display_name().to_string()
            }
        }
    }

    async fn pass(
        &self,
        page: &dyn Page,
        cutoff: Option<DateTime<Utc>>,
        state: &mut LoopState,
        progress: &ProgressReporter,
    ) -> Result<Option<StopReason>> {
        progress.dev(format!("Looking for messages (pass {})...", state.passes));
        let rendered = self.rendered_messages(page).await?;

        if rendered.is_empty() {
            state.empty_passes += 1;
            progress.warn(format!(
                "No message elements found ({}/{}).",
                state.empty_passes, self.config.empty_render_limit
            ));
            if state.empty_passes >= self.config.empty_render_limit {
                progress.warn("No messages found for several passes. Stopping scroll for this channel.");
                return Ok(Some(StopReason::NoMessagesRendered));
            }
            return self.load_older(page, progress).await;
        }
        state.empty_passes = 0;

        let mut discovered = 0;
        for element in rendered.iter().rev() {
            let id = match element.attribute(&self.selectors.message_id_attribute).await {
                Ok(Some(id)) if !id.trim().is_empty() => id.trim().to_string(),
                Ok(_) => continue,
                Err(e) => {
                    progress.dev(format!("Could not read message id: {}", e));
                    continue;
                }
            };
            if !state.seen.insert(id.clone()) {
                continue;
            }

            let message = match self.extract(element.as_ref(), id).await {
                Ok(message) => message,
                Err(e) => {
                    progress.warn(format!("Could not parse message details: {}", e));
                    continue;
                }
            };
            discovered += 1;

            if message.timestamp.is_none() && !message.timestamp_raw.is_empty() {
                progress.dev(format!(
                    "Could not parse timestamp '{}'. Storing as text.",
                    message.timestamp_raw
                ));
            }

            if let Some(cutoff) = cutoff {
                if message.is_older_than(cutoff) {
                    progress.info(format!(
                        "Reached depth limit ({}). Stopping scroll.",
                        cutoff.format("%Y-%m-%d %H:%M")
                    ));
                    return Ok(Some(StopReason::CutoffReached));
                }
                if message.timestamp.is_none() && !self.config.keep_unparsed_under_cutoff {
                    continue;
                }
            }

            state.messages.push(message);
        }

        if discovered == 0 {
            state.stale_passes += 1;
            progress.info(format!(
                "No new messages this pass, though {} elements exist ({}/{}).",
                rendered.len(),
                state.stale_passes,
                self.config.top_of_history_limit
            ));
            if state.stale_passes >= self.config.top_of_history_limit {
                progress.info("Likely at the top of the channel history. Stopping scroll.");
                return Ok(Some(StopReason::TopOfHistory));
            }
        } else {
            state.stale_passes = 0;
        }

        progress.dev(format!(
            "Scraped {} total messages. Scrolling up...",
            state.messages.len()
        ));
        self.load_older(page, progress).await
    }

    async fn rendered_messages(&self, page: &dyn Page) -> Result<Vec<Box<dyn Element>>> {
        match page
            .wait_for_selector(
                &self.selectors.message_item,
                WaitState::Attached,
                self.timeouts.message_wait(),
            )
            .await
        {
            Ok(()) => page.query_selector_all(&self.selectors.message_item).await,
            Err(e) if e.is_timeout() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Scroll to the top and give the site time to render older history.
    async fn load_older(
        &self,
        page: &dyn Page,
        progress: &ProgressReporter,
    ) -> Result<Option<StopReason>> {
        if !page.scroll_to_top(&self.selectors.message_container).await? {
            progress.warn("Scrollable message container not found. Stopping scroll.");
            return Ok(Some(StopReason::ContainerLost));
        }
        sleep(self.config.settle_interval()).await;
        self.await_loading_indicator(page, progress).await;
        Ok(None)
    }

    async fn await_loading_indicator(&self, page: &dyn Page, progress: &ProgressReporter) {
        let selector = &self.selectors.loading_indicator;
        if selector.is_empty() {
            return;
        }
        let appeared = page
            .wait_for_selector(selector, WaitState::Visible, self.timeouts.loading_appear())
            .await;
        if appeared.is_err() {
            return;
        }
        progress.dev("Waiting for loading indicator to disappear...");
        if let Err(e) = page
            .wait_for_selector(selector, WaitState::Hidden, self.timeouts.loading_disappear())
            .await
        {
            progress.dev(format!("Loading indicator did not go away: {}", e));
        }
    }

    async fn extract(&self, element: &dyn Element, id: String) -> Result<Message> {
        let sender = child_text(element, &self.selectors.message_sender).await?;
        let text = child_text(element, &self.selectors.message_body).await?;

        let raw = match element
            .query_selector(&self.selectors.message_timestamp)
            .await?
        {
            Some(stamp) => match stamp.attribute(&self.selectors.timestamp_attribute).await? {
                Some(value) if !value.trim().is_empty() => Some(value),
                _ => stamp.inner_text().await?,
            },
            None => None,
        };
        let raw = raw.map(|r| r.trim().to_string()).unwrap_or_default();

        let mut message = Message::new(id);
        message.sender = sender.unwrap_or_else(|| UNKNOWN_SENDER.to_string());
        message.text = text.unwrap_or_default();
        message.timestamp = self.parser.parse(&raw);
        message.timestamp_raw = raw;
        Ok(message)
    }
}

async fn child_text(element: &dyn Element, selector: &str) -> Result<Option<String>> {
    let Some(child) = element.query_selector(selector).await? else {
        return Ok(None);
    };
    Ok(child
        .inner_text()
        .await?
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty()))
}
