//! Live progress events for one task.
//!
//! Producers hold a cloneable [`ProgressReporter`]; the single consumer
//! holds the matching [`ProgressStream`]. Emitting never blocks: when the
//! queue is full the event is dropped and counted. The stream always ends
//! with exactly one `end_stream` event, after which it yields `None`.
//!
//! On the wire each event is one JSON object per line:
//!
//! ```text
//! {"type":"info","content":"Navigating to https://chat.example.com..."}
//! {"type":"end_stream","content":"Enumeration complete."}
//! ```

mod event;
mod reporter;

pub use event::{EventKind, ProgressEvent};
pub use reporter::{channel, ProgressReporter, ProgressStream};

use serde::{Deserialize, Serialize};

/// Progress queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Events buffered per task before new ones are dropped (default: 1024)
    pub capacity: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}
