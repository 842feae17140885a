use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

/// How far back in a channel's history a scrape goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthPolicy {
    EntireHistory,
    /// Stop at the first message older than `now - duration`.
    SinceCutoff(Duration),
}

impl DepthPolicy {
    /// The oldest instant still inside the window, if any. A window reaching
    /// past the earliest representable instant covers the whole history.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            DepthPolicy::EntireHistory => None,
            DepthPolicy::SinceCutoff(d) => now.checked_sub_signed(*d),
        }
    }

    /// Parse a depth like "all", "3months", "90d", "2w", "12h"
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim().to_lowercase();

        if matches!(s.as_str(), "all" | "entire" | "everything") {
            return Ok(DepthPolicy::EntireHistory);
        }

        let (count, unit) =
            if let Some(n) = s.strip_suffix("months").or_else(|| s.strip_suffix("mo")) {
                (n, "months")
            } else if let Some(n) = s.strip_suffix('w') {
                (n, "weeks")
            } else if let Some(n) = s.strip_suffix('d') {
                (n, "days")
            } else if let Some(n) = s.strip_suffix('h') {
                (n, "hours")
            } else {
                return Err(format!(
                    "Invalid depth: {}. Use 'all', '3months', '90d', '2w' or '12h'",
                    s
                ));
            };

        let n = count
            .parse::<i64>()
            .map_err(|_| format!("Invalid {}: {}", unit, count))?;
        if n <= 0 {
            return Err(format!("Depth must be positive, got {} {}", n, unit));
        }
        let duration = match unit {
            "months" => n.checked_mul(30).and_then(Duration::try_days),
            "weeks" => Duration::try_weeks(n),
            "days" => Duration::try_days(n),
            _ => Duration::try_hours(n),
        };
        duration
            .map(DepthPolicy::SinceCutoff)
            .ok_or_else(|| format!("Depth out of range: {} {}", n, unit))
    }
}

impl FromStr for DepthPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DepthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepthPolicy::EntireHistory => write!(f, "entire history"),
            DepthPolicy::SinceCutoff(d) if d.num_hours() % 24 == 0 => {
                write!(f, "last {} days", d.num_days())
            }
            DepthPolicy::SinceCutoff(d) => write!(f, "last {} hours", d.num_hours()),
        }
    }
}
