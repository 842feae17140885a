use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Tuning for the login form and the message scroll loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Consecutive passes without any rendered message before giving up (default: 4)
    pub empty_render_limit: u32,

    /// Consecutive passes without a new message before assuming the top of history (default: 3)
    pub top_of_history_limit: u32,

    /// Lower bound of the randomized wait after each scroll in milliseconds (default: 3000)
    pub settle_min_ms: u64,

    /// Upper bound of the randomized wait after each scroll in milliseconds (default: 5000)
    pub settle_max_ms: u64,

    /// Lower bound of the pause after filling a form field in milliseconds (default: 500)
    pub typing_pause_min_ms: u64,

    /// Upper bound of the pause after filling a form field in milliseconds (default: 1000)
    pub typing_pause_max_ms: u64,

    /// Sort each channel's messages by parsed timestamp instead of discovery order (default: false)
    pub sort_by_timestamp: bool,

    /// Keep messages whose timestamp could not be parsed when a depth cutoff applies (default: true)
    pub keep_unparsed_under_cutoff: bool,

    /// chrono formats tried in order after RFC 3339
    pub timestamp_formats: Vec<String>,

    /// UTC offset of the site's timestamps in minutes, local time when unset
    pub timestamp_utc_offset_minutes: Option<i32>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            empty_render_limit: 4,
            top_of_history_limit: 3,
            settle_min_ms: 3000,
            settle_max_ms: 5000,
            typing_pause_min_ms: 500,
            typing_pause_max_ms: 1000,
            sort_by_timestamp: false,
            keep_unparsed_under_cutoff: true,
            timestamp_formats: vec![
                // May 21, 2025 10:47 PM
                "%b %d, %Y %I:%M %p".to_string(),
                // 10:00 PM, August 23, 2023
                "%I:%M %p, %B %d, %Y".to_string(),
                // August 23, 2023 10:00 PM
                "%B %d, %Y %I:%M %p".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
            ],
            timestamp_utc_offset_minutes: None,
        }
    }
}

fn jitter(range: RangeInclusive<u64>) -> Duration {
    let (lo, hi) = (*range.start(), *range.end());
    let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    let ms = rand::rng().random_range(lo..=hi);
    Duration::from_millis(ms)
}

impl ScrapeConfig {
    /// Randomized wait after triggering a lazy load
    pub fn settle_interval(&self) -> Duration {
        jitter(self.settle_min_ms..=self.settle_max_ms)
    }

    /// Randomized pause between form interactions
    pub fn typing_pause(&self) -> Duration {
        jitter(self.typing_pause_min_ms..=self.typing_pause_max_ms)
    }

    /// Shorter pauses for fast, responsive sites. Other settings are kept.
    pub fn fast(self) -> Self {
        Self {
            settle_min_ms: 800,
            settle_max_ms: 1500,
            typing_pause_min_ms: 100,
            typing_pause_max_ms: 300,
            ..self
        }
    }

    /// Near-zero pauses for scripted pages
    #[cfg(test)]
    pub(crate) fn instant() -> Self {
        Self {
            settle_min_ms: 0,
            settle_max_ms: 1,
            typing_pause_min_ms: 0,
            typing_pause_max_ms: 1,
            ..Default::default()
        }
    }

    /// More patience for slow sites with large histories. Other settings are kept.
    pub fn thorough(self) -> Self {
        Self {
            empty_render_limit: 6,
            top_of_history_limit: 5,
            settle_min_ms: 5000,
            settle_max_ms: 8000,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ScrapeConfig::default();
        assert_eq!(config.empty_render_limit, 4);
        assert_eq!(config.top_of_history_limit, 3);
        assert_eq!(config.settle_min_ms, 3000);
        assert_eq!(config.settle_max_ms, 5000);
        assert!(!config.sort_by_timestamp);
        assert!(config.keep_unparsed_under_cutoff);
        assert_eq!(config.timestamp_formats[0], "%b %d, %Y %I:%M %p");
        assert!(config.timestamp_utc_offset_minutes.is_none());
    }

    #[test]
    fn test_settle_interval_within_bounds() {
        let config = ScrapeConfig::default();
        for _ in 0..50 {
            let wait = config.settle_interval();
            assert!(wait >= Duration::from_millis(3000));
            assert!(wait <= Duration::from_millis(5000));
        }
    }

    #[test]
    fn test_inverted_range_is_tolerated() {
        let config = ScrapeConfig {
            settle_min_ms: 20,
            settle_max_ms: 10,
            ..Default::default()
        };
        let wait = config.settle_interval();
        assert!(wait >= Duration::from_millis(10) && wait <= Duration::from_millis(20));
    }

    #[test]
    fn test_presets_keep_other_settings() {
        let custom = ScrapeConfig {
            sort_by_timestamp: true,
            timestamp_formats: vec!["%d/%m/%Y %H:%M".to_string()],
            ..Default::default()
        };

        let fast = custom.clone().fast();
        assert_eq!(fast.settle_max_ms, 1500);
        assert_eq!(fast.empty_render_limit, 4);
        assert!(fast.sort_by_timestamp);

        let thorough = custom.thorough();
        assert_eq!(thorough.top_of_history_limit, 5);
        assert_eq!(thorough.settle_min_ms, 5000);
        assert_eq!(thorough.timestamp_formats, vec!["%d/%m/%Y %H:%M"]);
    }
}
