use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::app::{CrawlerError, Result};
use crate::browser::BrowserSession;
use crate::config::Config;
use crate::domain::{Channel, Credentials, DepthPolicy};
use crate::progress::{ProgressReporter, ProgressStream};
use crate::scraper::{Authenticator, ChannelEnumerator, MessageScraper, ScrapeResult};
use crate::store::ResultStore;
use crate::task::{TaskKind, TaskRegistry};

/// Starts enumeration and scrape tasks and wires them to progress streams.
///
/// Every page a task opens is closed again on every path, and every task
/// ends its stream exactly once.
#[derive(Clone)]
pub struct TaskOrchestrator {
    config: Arc<Config>,
    session: Arc<BrowserSession>,
    store: Arc<dyn ResultStore>,
    registry: Arc<TaskRegistry>,
}

impl TaskOrchestrator {
    pub fn new(
        config: Arc<Config>,
        session: Arc<BrowserSession>,
        store: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            config,
            session,
            store,
            registry: Arc::new(TaskRegistry::new()),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Take the progress stream of a started task.
    pub fn subscribe(&self, task_id: &str) -> Result<ProgressStream> {
        self.registry.take_stream(task_id)
    }

    /// Log in and list channels in the background. Returns the task id.
    pub fn start_enumeration(&self, credentials: Credentials) -> String {
        let (id, progress) = self
            .registry
            .register(TaskKind::Enumeration, self.config.progress.capacity);
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let _ = this.run_enumeration(&credentials, &progress).await;
        });
        self.registry.attach(&id, handle);
        id
    }

    /// Scrape every channel concurrently in the background. Returns the task id.
    pub fn start_scrape(
        &self,
        credentials: Credentials,
        channels: Vec<Channel>,
        depth: DepthPolicy,
    ) -> Result<String> {
        if channels.is_empty() {
            return Err(CrawlerError::Other("No channels selected".into()));
        }
        let (id, progress) = self
            .registry
            .register(TaskKind::Scrape, self.config.progress.capacity);
        let this = self.clone();
        let handle = tokio::spawn(async move {
            let _ = this
                .run_scrape(&credentials, channels, depth, &progress)
                .await;
        });
        self.registry.attach(&id, handle);
        Ok(id)
    }

    pub async fn run_enumeration(
        &self,
        credentials: &Credentials,
        progress: &ProgressReporter,
    ) -> Result<Vec<Channel>> {
        info!(task = %progress.task_id(), "Enumeration started");
        let outcome = self.enumerate(credentials, progress).await;

        match &outcome {
            Ok(channels) if channels.is_empty() => {
                progress.warn("No channels found after login.");
                finish(progress, "Enumeration finished without channels.");
            }
            Ok(channels) => {
                progress.channels(channels);
                finish(progress, "Enumeration complete.");
            }
            Err(e) => {
                progress.error(e.to_string());
                finish(progress, "Enumeration failed.");
            }
        }
        outcome
    }

    async fn enumerate(
        &self,
        credentials: &Credentials,
        progress: &ProgressReporter,
    ) -> Result<Vec<Channel>> {
        let page = self.session.acquire().await?;
        let outcome = async {
            Authenticator::from_config(&self.config)
                .login(&*page, credentials, progress)
                .await?;
            ChannelEnumerator::from_config(&self.config)
                .enumerate(&*page, progress)
                .await
        }
        .await;
        self.session.release(page).await;
        outcome
    }

    /// Scrape `channels`, store what was gathered and close the stream.
    ///
    /// Results come back in the order the channels were given. Only an
    /// engine failure fails the whole task; other per-channel failures are
    /// reported and the channel is left out or kept partial.
    pub async fn run_scrape(
        &self,
        credentials: &Credentials,
        channels: Vec<Channel>,
        depth: DepthPolicy,
        progress: &ProgressReporter,
    ) -> Result<Vec<ScrapeResult>> {
        info!(task = %progress.task_id(), channels = channels.len(), "Scrape started");
        progress.info(format!(
            "Scraping {} channels ({}).",
            channels.len(),
            depth
        ));

        let mut set = JoinSet::new();
        for (index, channel) in channels.into_iter().enumerate() {
            progress.info(format!("Queueing scrape for: {}", channel.display_name()));
            let this = self.clone();
            let credentials = credentials.clone();
            let progress = progress.clone();
            set.spawn(async move {
                let outcome = this
                    .scrape_channel(&credentials, &channel, depth, &progress)
                    .await;
                (index, outcome)
            });
        }

        let mut gathered = Vec::new();
        let mut fatal = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(Some(result)))) => gathered.push((index, result)),
                Ok((_, Ok(None))) => {}
                Ok((_, Err(e))) => {
                    if fatal.is_none() {
                        set.abort_all();
                        fatal = Some(e);
                    }
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    error!(task = %progress.task_id(), "Channel worker panicked: {}", e);
                    progress.error(format!("A channel scrape crashed: {}", e));
                }
            }
        }

        if let Some(e) = fatal {
            progress.error(e.to_string());
            finish(progress, "Scraping aborted.");
            return Err(e);
        }

        gathered.sort_by_key(|(index, _)| *index);
        let results: Vec<ScrapeResult> = gathered.into_iter().map(|(_, r)| r).collect();

        if let Err(e) = self.store.save_results(progress.task_id(), &results) {
            progress.error(format!("Could not store results: {}", e));
            finish(progress, "Scraping finished, results not stored.");
            return Err(e);
        }

        progress.all_done();
        progress.download_ready();
        finish(progress, "All scraping tasks finished.");
        Ok(results)
    }

    /// `Ok(None)` when the channel failed on its own and was reported.
    async fn scrape_channel(
        &self,
        credentials: &Credentials,
        channel: &Channel,
        depth: DepthPolicy,
        progress: &ProgressReporter,
    ) -> Result<Option<ScrapeResult>> {
        let page = self.session.acquire().await?;
        let outcome = async {
            Authenticator::from_config(&self.config)
                .login(&*page, credentials, progress)
                .await?;
            MessageScraper::from_config(&self.config)
                .scrape(&*page, channel, depth, progress)
                .await
        }
        .await;
        self.session.release(page).await;

        match outcome {
            Ok(report) => {
                progress.scrape_result(&report.result);
                if let Some(e) = report.error {
                    progress.error(format!(
                        "Scraping '{}' stopped early: {}",
                        channel.display_name(),
                        e
                    ));
                }
                Ok(Some(report.result))
            }
            Err(e) if e.is_fatal_for_task() => Err(e),
            Err(e) => {
                progress.error(format!(
                    "Scraping '{}' failed: {}",
                    channel.display_name(),
                    e
                ));
                Ok(None)
            }
        }
    }
}

/// End the stream, noting events lost to a full queue.
fn finish(progress: &ProgressReporter, summary: &str) {
    match progress.dropped_events() {
        0 => progress.end_stream(summary),
        dropped => {
            warn!(task = %progress.task_id(), dropped, "Slow consumer missed progress events");
            progress.end_stream(format!("{} ({} progress events dropped)", summary, dropped));
        }
    }
}
