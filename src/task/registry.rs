use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::app::{CrawlerError, Result};
use crate::progress::{self, ProgressReporter, ProgressStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Enumeration,
    Scrape,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Enumeration => write!(f, "enumeration"),
            TaskKind::Scrape => write!(f, "scrape"),
        }
    }
}

struct TaskEntry {
    stream: Option<ProgressStream>,
    handle: Option<JoinHandle<()>>,
}

/// Live tasks keyed by id.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<String, TaskEntry>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, TaskEntry>> {
        // A poisoned map is still structurally valid.
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a task id and its progress channel.
    pub fn register(&self, kind: TaskKind, capacity: usize) -> (String, ProgressReporter) {
        let id = Uuid::new_v4().to_string();
        let (reporter, stream) = progress::channel(id.clone(), capacity);
        self.tasks().insert(
            id.clone(),
            TaskEntry {
                stream: Some(stream),
                handle: None,
            },
        );
        debug!(task = %id, %kind, "Task registered");
        (id, reporter)
    }

    pub fn attach(&self, id: &str, handle: JoinHandle<()>) {
        if let Some(entry) = self.tasks().get_mut(id) {
            entry.handle = Some(handle);
        }
    }

    /// Hand the task's stream to its one consumer.
    pub fn take_stream(&self, id: &str) -> Result<ProgressStream> {
        self.tasks()
            .get_mut(id)
            .and_then(|entry| entry.stream.take())
            .ok_or_else(|| CrawlerError::TaskNotFound(id.to_string()))
    }

    /// Wait for the task's worker to exit.
    pub async fn wait(&self, id: &str) -> Result<()> {
        let handle = self
            .tasks()
            .get_mut(id)
            .ok_or_else(|| CrawlerError::TaskNotFound(id.to_string()))?
            .handle
            .take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| CrawlerError::Other(format!("Task {} panicked: {}", id, e)))?;
        }
        Ok(())
    }

    /// Forget a task; a still-running worker is aborted.
    pub fn remove(&self, id: &str) -> bool {
        match self.tasks().remove(id) {
            Some(entry) => {
                if let Some(handle) = entry.handle {
                    handle.abort();
                }
                true
            }
            None => false,
        }
    }
}
