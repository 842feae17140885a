use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::app::{CrawlerError, Result};
use crate::domain::Message;
use crate::scraper::ScrapeResult;
use crate::store::{ResultStore, TaskSummary};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;

        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| CrawlerError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            CrawlerError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

impl ResultStore for SqliteStore {
    fn save_results(&self, task_id: &str, results: &[ScrapeResult]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
        tx.execute(
            "INSERT INTO tasks (id, created_at) VALUES (?1, ?2)",
            params![task_id, Self::format_datetime(&Utc::now())],
        )?;

        for (position, result) in results.iter().enumerate() {
            tx.execute(
                "INSERT INTO channel_results (task_id, position, channel_name) VALUES (?1, ?2, ?3)",
                params![task_id, position as i64, result.channel_name],
            )?;
            let result_id = tx.last_insert_rowid();

            let mut stmt = tx.prepare_cached(
                "INSERT INTO messages (result_id, position, message_id, sender, text, timestamp_raw, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (index, message) in result.messages.iter().enumerate() {
                stmt.execute(params![
                    result_id,
                    index as i64,
                    message.id,
                    message.sender,
                    message.text,
                    message.timestamp_raw,
                    message.timestamp.as_ref().map(Self::format_datetime),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn load_results(&self, task_id: &str) -> Result<Option<Vec<ScrapeResult>>> {
        let conn = self.conn()?;

        let exists = conn
            .query_row(
                "SELECT 1 FROM tasks WHERE id = ?1",
                params![task_id],
                |_| Ok(()),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }

        let mut channels_stmt = conn.prepare(
            "SELECT id, channel_name FROM channel_results WHERE task_id = ?1 ORDER BY position",
        )?;
        let channels = channels_stmt
            .query_map(params![task_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut messages_stmt = conn.prepare(
            "SELECT message_id, sender, text, timestamp_raw, timestamp
             FROM messages WHERE result_id = ?1 ORDER BY position",
        )?;

        let mut results = Vec::with_capacity(channels.len());
        for (result_id, channel_name) in channels {
            let messages = messages_stmt
                .query_map(params![result_id], |row| {
                    Ok(Message {
                        id: row.get(0)?,
                        sender: row.get(1)?,
                        text: row.get(2)?,
                        timestamp_raw: row.get(3)?,
                        timestamp: row
                            .get::<_, Option<String>>(4)?
                            .and_then(|s| Self::parse_datetime(&s)),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            results.push(ScrapeResult {
                channel_name,
                messages,
            });
        }

        Ok(Some(results))
    }

    fn list_tasks(&self) -> Result<Vec<TaskSummary>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT t.id, t.created_at,
                    (SELECT COUNT(*) FROM channel_results c WHERE c.task_id = t.id),
                    (SELECT COUNT(*) FROM messages m
                       JOIN channel_results c ON m.result_id = c.id
                      WHERE c.task_id = t.id)
             FROM tasks t
             ORDER BY t.created_at DESC, t.rowid DESC",
        )?;

        let tasks = stmt
            .query_map([], |row| {
                Ok(TaskSummary {
                    task_id: row.get(0)?,
                    created_at: row
                        .get::<_, String>(1)
                        .ok()
                        .and_then(|s| Self::parse_datetime(&s))
                        .unwrap_or_else(Utc::now),
                    channels: row.get::<_, i64>(2)? as usize,
                    messages: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tasks)
    }

    fn delete_task(&self, task_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
        Ok(deleted > 0)
    }
}
