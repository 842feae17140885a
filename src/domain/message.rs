use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_SENDER: &str = "Unknown Sender";

/// One chat message as extracted from the rendered message list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// DOM-assigned identifier, unique within one channel scrape.
    pub id: String,
    pub sender: String,
    pub text: String,
    /// Timestamp exactly as the page showed it, empty when absent.
    pub timestamp_raw: String,
    #[serde(rename = "timestamp_dt")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sender: UNKNOWN_SENDER.to_string(),
            text: String::new(),
            timestamp_raw: String::new(),
            timestamp: None,
        }
    }

    pub fn is_older_than(&self, cutoff: DateTime<Utc>) -> bool {
        self.timestamp.is_some_and(|ts| ts < cutoff)
    }
}
