use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Info,
    Dev,
    Warn,
    Error,
    Success,
    Channels,
    ScrapeResult,
    AllDone,
    DownloadReady,
    EndStream,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Info => "info",
            EventKind::Dev => "dev",
            EventKind::Warn => "warn",
            EventKind::Error => "error",
            EventKind::Success => "success",
            EventKind::Channels => "channels",
            EventKind::ScrapeResult => "scrape_result",
            EventKind::AllDone => "all_done",
            EventKind::DownloadReady => "download_ready",
            EventKind::EndStream => "end_stream",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub content: Value,
}

impl ProgressEvent {
    pub fn new(kind: EventKind, content: impl Into<Value>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn message(kind: EventKind, text: impl Into<String>) -> Self {
        Self::new(kind, Value::String(text.into()))
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == EventKind::EndStream
    }

    /// One JSON line as written to a transport
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"type":"{}","content":null}}"#, self.kind.as_str())
        })
    }

    /// Short human-readable description for logs
    pub fn summary(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Array(entries) => format!("{} entries", entries.len()),
            Value::Object(map) => match map.get("channel_name").and_then(Value::as_str) {
                Some(name) => format!("results for {}", name),
                None => "structured payload".to_string(),
            },
            other => other.to_string(),
        }
    }
}
