//! Configuration management for kumocrawler.
//!
//! Configuration is read from `~/.config/kumocrawler/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

pub mod selectors;
pub mod timeouts;

pub use selectors::SelectorConfig;
pub use timeouts::TimeoutConfig;

use crate::browser::BrowserSettings;
use crate::progress::ProgressConfig;
use crate::scraper::ScrapeConfig;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserSettings,
    pub timeouts: TimeoutConfig,
    pub scrape: ScrapeConfig,
    pub selectors: SelectorConfig,
    pub progress: ProgressConfig,
    pub store: StoreConfig,
}

/// Where scrape results are persisted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path; the platform data directory when unset
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/kumocrawler/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("kumocrawler").join("config.toml"))
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# kumocrawler configuration
#
# Every key is optional; anything left out falls back to the value shown.

[browser]
# Run Chrome without a visible window
headless = true

# Pass --no-sandbox (needed in most containers)
no_sandbox = true

# Hide the automation flag from page scripts
stealth = true

ignore_https_errors = true
viewport_width = 1280
viewport_height = 800

# Per CDP request timeout in seconds
request_timeout_secs = 30

# Path to a Chrome/Chromium binary (auto-detected when unset)
# executable = "/usr/bin/chromium"

# Extra command line switches for Chrome
extra_args = []

# user_agent = "Mozilla/5.0 ..."

[timeouts]
navigation_secs = 60
network_idle_ms = 500
form_fill_secs = 30
click_secs = 30
login_outcome_secs = 45
channel_list_secs = 30
message_container_secs = 30
message_wait_secs = 10
room_header_secs = 10
loading_appear_ms = 1500
loading_disappear_secs = 15

[scrape]
# Consecutive passes with no rendered messages before giving up
empty_render_limit = 4

# Consecutive passes with no new messages before assuming the top is reached
top_of_history_limit = 3

# Randomized wait after each scroll (milliseconds)
settle_min_ms = 3000
settle_max_ms = 5000

# Randomized pause after each form field (milliseconds)
typing_pause_min_ms = 500
typing_pause_max_ms = 1000

# Sort each channel's messages oldest first instead of discovery order
sort_by_timestamp = false

# Keep messages whose timestamp could not be parsed when a depth limit is set
keep_unparsed_under_cutoff = true

# chrono formats tried after RFC 3339, in order
timestamp_formats = [
    "%b %d, %Y %I:%M %p",
    "%I:%M %p, %B %d, %Y",
    "%B %d, %Y %I:%M %p",
    "%Y-%m-%d %H:%M:%S",
]

# Offset for zone-less timestamps in minutes east of UTC (local time when unset)
# timestamp_utc_offset_minutes = 0

[selectors]
# CSS selectors for the chat site. Defaults match Rocket.Chat.
username_field = 'input[name="usernameOrEmail"]'
password_field = 'input[name="password"]'
login_button = 'button[type="submit"]'
login_error = '.rcx-toastbar--error, div[role="alert"]'
login_success = ".rcx-sidebar"

channel_list = ".rcx-sidebar"
channel_item = "a.rcx-sidebar-item"
channel_name = ".rcx-sidebar-item__title"
# Descendant anchor read when the item itself has no reference
channel_link = "a[href]"
channel_reference_attribute = "href"

room_header = "h1.rcx-css-15uaxsl"
message_container = ".messages-box .rc-scrollbars-view"
message_item = 'div.rcx-message[role="listitem"]'
message_id_attribute = "id"
message_sender = '.rcx-message-header__name[data-qa-type="username"]'
message_body = "div.rcx-message-body"
message_timestamp = ".rcx-message-header__time"
timestamp_attribute = "title"
loading_indicator = ".rcx-loading, .loading-animation"

[progress]
# Events buffered per task before new ones are dropped
capacity = 1024

[store]
# SQLite database for scrape results (platform data directory when unset)
# path = "/var/lib/kumocrawler/results.db"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        let defaults = Config::default();
        assert_eq!(config.scrape.empty_render_limit, 4);
        assert_eq!(config.scrape.timestamp_formats, defaults.scrape.timestamp_formats);
        assert_eq!(config.selectors.message_item, defaults.selectors.message_item);
        assert_eq!(config.selectors.login_error, defaults.selectors.login_error);
        assert_eq!(config.timeouts.login_outcome(), Duration::from_secs(45));
        assert_eq!(config.progress.capacity, 1024);
        assert!(config.store.path.is_none());
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[scrape]
top_of_history_limit = 5

[selectors]
message_item = "li.msg"
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.scrape.top_of_history_limit, 5);
        assert_eq!(config.selectors.message_item, "li.msg");
        assert_eq!(config.scrape.empty_render_limit, 4);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config.scrape.settle_min_ms, 3000);
        assert_eq!(config.scrape.settle_max_ms, 5000);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[store]\npath = \"/tmp/kumo.db\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.store.path, Some(PathBuf::from("/tmp/kumo.db")));
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scrape]\nempty_render_limit = \"four\"\n").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_created_default_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::create_default_config(&path).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.scrape.top_of_history_limit, 3);
    }
}
