use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};

use crate::scraper::ScrapeConfig;

/// Parses the timestamp strings chat sites put on messages.
///
/// RFC 3339 is tried first, then each configured format in order; the
/// first match wins. Formats without a zone are read in the configured
/// offset, or local time when none is set.
#[derive(Debug, Clone)]
pub struct TimestampParser {
    formats: Vec<String>,
    offset: Option<FixedOffset>,
}

impl TimestampParser {
    pub fn new(formats: Vec<String>, offset: Option<FixedOffset>) -> Self {
        Self { formats, offset }
    }

    pub fn from_config(config: &ScrapeConfig) -> Self {
        let offset = config
            .timestamp_utc_offset_minutes
            .and_then(|minutes| FixedOffset::east_opt(minutes * 60));
        Self::new(config.timestamp_formats.clone(), offset)
    }

    pub fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }

        self.formats
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .and_then(|naive| self.localize(naive))
    }

    fn localize(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self.offset {
            Some(offset) => offset
                .from_local_datetime(&naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
            None => Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}
