//! Browser-driven login, channel discovery and message history scraping.
//!
//! # Architecture
//!
//! ```text
//! Page → Authenticator → ChannelEnumerator → MessageScraper (per channel) → ScrapeResult
//! ```
//!
//! All three stages work on a [`Page`](crate::browser::Page) they do not
//! own and report what they do through a
//! [`ProgressReporter`](crate::progress::ProgressReporter). Fatal problems
//! come back as [`CrawlerError`](crate::app::CrawlerError); soft outcomes
//! (no channels, top of history reached, nothing rendered) are ordinary
//! return values.
//!
//! # Usage
//!
//! ```rust,ignore
//! let lease = session.acquire().await?;
//! Authenticator::from_config(&config).login(&*lease, &credentials, &progress).await?;
//! let channels = ChannelEnumerator::from_config(&config).enumerate(&*lease, &progress).await?;
//! let report = MessageScraper::from_config(&config)
//!     .scrape(&*lease, &channels[0], DepthPolicy::EntireHistory, &progress)
//!     .await?;
//! session.release(lease).await;
//! ```

mod auth;
mod channels;
mod config;
mod messages;
mod timestamp;

pub use auth::{Authenticator, LoginSuccess};
pub use channels::ChannelEnumerator;
pub use config::ScrapeConfig;
pub use messages::{MessageScraper, ScrapeReport, StopReason};
pub use timestamp::TimestampParser;

use serde::{Deserialize, Serialize};

use crate::domain::Message;

/// Messages collected from one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub channel_name: String,
    /// Discovery order unless sorting by timestamp is enabled
    pub messages: Vec<Message>,
}

impl ScrapeResult {
    pub fn new(channel_name: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            messages: Vec::new(),
        }
    }

    /// Stable sort by parsed timestamp, oldest first; unparsed messages
    /// keep their relative order at the end.
    pub fn sort_chronologically(&mut self) {
        self.messages
            .sort_by_key(|m| (m.timestamp.is_none(), m.timestamp));
    }
}
