pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::{CrawlerError, Result};
use crate::scraper::ScrapeResult;

pub use sqlite::SqliteStore;

/// One stored task as listed by [`ResultStore::list_tasks`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub task_id: String,
    pub created_at: DateTime<Utc>,
    pub channels: usize,
    pub messages: usize,
}

pub trait ResultStore: Send + Sync {
    /// Store a task's results, replacing anything saved under the same id.
    fn save_results(&self, task_id: &str, results: &[ScrapeResult]) -> Result<()>;
    fn load_results(&self, task_id: &str) -> Result<Option<Vec<ScrapeResult>>>;
    /// Newest first.
    fn list_tasks(&self) -> Result<Vec<TaskSummary>>;
    /// Returns whether anything was deleted.
    fn delete_task(&self, task_id: &str) -> Result<bool>;
}

/// File name offered for a task's download.
pub fn download_filename(task_id: &str) -> String {
    let short: String = task_id.chars().take(8).collect();
    format!("kumocrawler_scrape_{}.json", short)
}

/// Pretty-printed JSON document of a task's results.
///
/// Fails with `TaskNotFound` when the task is unknown or has no channels.
pub fn export_json(store: &dyn ResultStore, task_id: &str) -> Result<String> {
    let results = store
        .load_results(task_id)?
        .filter(|results| !results.is_empty())
        .ok_or_else(|| CrawlerError::TaskNotFound(task_id.to_string()))?;
    Ok(serde_json::to_string_pretty(&results)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Message;

    #[test]
    fn test_download_filename_uses_id_prefix() {
        assert_eq!(
            download_filename("0f8fad5b-d9cb-469f-a165-70867728950e"),
            "kumocrawler_scrape_0f8fad5b.json"
        );
        assert_eq!(download_filename("abc"), "kumocrawler_scrape_abc.json");
    }

    #[test]
    fn test_export_json_is_a_list_of_channel_results() {
        let store = SqliteStore::in_memory().unwrap();
        let mut result = ScrapeResult::new("general");
        let mut message = Message::new("m1");
        message.text = "hello".into();
        result.messages.push(message);
        store.save_results("task-1", &[result]).unwrap();

        let json = export_json(&store, "task-1").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["channel_name"], "general");
        assert_eq!(value[0]["messages"][0]["id"], "m1");
        assert!(value[0]["messages"][0]["timestamp_dt"].is_null());
        assert!(json.contains('\n'));
    }

    #[test]
    fn test_export_unknown_or_empty_task() {
        let store = SqliteStore::in_memory().unwrap();
        store.save_results("empty", &[]).unwrap();

        assert!(matches!(
            export_json(&store, "missing"),
            Err(CrawlerError::TaskNotFound(_))
        ));
        assert!(matches!(
            export_json(&store, "empty"),
            Err(CrawlerError::TaskNotFound(_))
        ));
    }
}
