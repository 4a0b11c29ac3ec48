//! Timestamps for history events and inspection notes.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// `YYYY-MM-DD HH:MM:SS`, UTC.
const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Source of event timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> String;
}

/// Wall-clock time in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> String {
        format_timestamp(OffsetDateTime::now_utc())
    }
}

/// Always returns the same timestamp.
#[derive(Debug, Clone)]
pub struct FixedClock(pub String);

impl FixedClock {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self(timestamp.into())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> String {
        self.0.clone()
    }
}

pub fn format_timestamp(at: OffsetDateTime) -> String {
    // Formatting into a String only fails for components the description
    // doesn't use.
    at.format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn formats_seconds_resolution_utc() {
        let at = datetime!(2025-03-01 09:05:07 UTC);
        assert_eq!(format_timestamp(at), "2025-03-01 09:05:07");
    }

    #[test]
    fn system_clock_matches_format() {
        let now = SystemClock.now();
        assert_eq!(now.len(), 19);
        assert_eq!(&now[4..5], "-");
        assert_eq!(&now[10..11], " ");
    }
}
