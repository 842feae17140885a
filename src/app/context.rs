use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{CrawlerError, Result};
use crate::browser::BrowserSession;
use crate::config::Config;
use crate::store::sqlite::SqliteStore;
use crate::store::ResultStore;
use crate::task::TaskOrchestrator;

pub struct AppContext {
    pub config: Arc<Config>,
    pub session: Arc<BrowserSession>,
    pub store: Arc<dyn ResultStore>,
    pub orchestrator: TaskOrchestrator,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match config.store.path.clone() {
            Some(p) => p,
            None => Self::default_db_path()?,
        };
        let store: Arc<dyn ResultStore> = Arc::new(SqliteStore::new(&db_path)?);
        let session = BrowserSession::chrome(config.browser.clone(), config.timeouts.network_idle());
        Ok(Self::with_parts(config, session, store))
    }

    pub fn in_memory(config: Config, session: BrowserSession) -> Result<Self> {
        let store: Arc<dyn ResultStore> = Arc::new(SqliteStore::in_memory()?);
        Ok(Self::with_parts(config, session, store))
    }

    fn with_parts(config: Config, session: BrowserSession, store: Arc<dyn ResultStore>) -> Self {
        let config = Arc::new(config);
        let session = Arc::new(session);
        let orchestrator = TaskOrchestrator::new(config.clone(), session.clone(), store.clone());
        Self {
            config,
            session,
            store,
            orchestrator,
        }
    }

    /// Stop the browser if one was started.
    pub async fn shutdown(&self) -> Result<()> {
        self.session.shutdown().await
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| CrawlerError::Config("Could not find data directory".into()))?;
        let app_dir = data_dir.join("kumocrawler");
        std::fs::create_dir_all(&app_dir)?;
        Ok(app_dir.join("results.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeLauncher;

    #[tokio::test]
    async fn test_context_uses_configured_store_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.path = Some(dir.path().join("kumo.db"));

        let ctx = AppContext::new(config).unwrap();
        ctx.store.save_results("task-1", &[]).unwrap();

        assert!(dir.path().join("kumo.db").exists());
        assert!(!ctx.session.is_running().await);
        ctx.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_started_browser() {
        let launcher = FakeLauncher::new();
        let stats = launcher.stats();
        let ctx = AppContext::in_memory(Config::default(), BrowserSession::new(launcher)).unwrap();

        let page = ctx.session.acquire().await.unwrap();
        ctx.session.release(page).await;
        ctx.shutdown().await.unwrap();
        ctx.shutdown().await.unwrap();

        assert_eq!(stats.shutdowns.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
