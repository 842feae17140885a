use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlerError {
    #[error("Browser engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Navigation to {url} timed out after {timeout_secs}s")]
    NavigationTimeout { url: String, timeout_secs: u64 },

    #[error("Navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("Login failed: {0}")]
    CredentialsRejected(String),

    #[error("Login timed out: neither the success nor the error marker appeared within {0}s")]
    LoginTimeout(u64),

    #[error("Form field not found: {0}")]
    FormFieldMissing(String),

    #[error("Timed out waiting for element: {0}")]
    ElementTimeout(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl CrawlerError {
    /// True for every failure caused by a bounded wait running out.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            CrawlerError::NavigationTimeout { .. }
                | CrawlerError::LoginTimeout(_)
                | CrawlerError::ElementTimeout(_)
        )
    }

    /// Errors that abort a whole task rather than one operation inside it.
    pub fn is_fatal_for_task(&self) -> bool {
        matches!(self, CrawlerError::EngineUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, CrawlerError>;
