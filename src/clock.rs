//! Civil-time source pinned to a fixed UTC offset.
//!
//! The bot's chats live in one timezone regardless of where the process runs,
//! so every date computation (partition names, friendly headers, daily flag
//! resets) goes through this type instead of ambient local time.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Default offset in hours (UTC−3).
pub const DEFAULT_OFFSET_HOURS: i32 = -3;

#[derive(Debug, Clone, Copy)]
pub struct Clock {
    offset: FixedOffset,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(DEFAULT_OFFSET_HOURS)
    }
}

impl Clock {
    /// Offsets outside ±23 h fall back to the default.
    pub fn new(offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(DEFAULT_OFFSET_HOURS * 3600).unwrap());
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Partition-name date string, `YYYY-MM-DD`.
    pub fn date_str(&self) -> String {
        self.now().format("%Y-%m-%d").to_string()
    }

    /// `HH:MM`, used for chat-log rendering and the generation cue.
    pub fn time_str(&self) -> String {
        self.now().format("%H:%M").to_string()
    }

    /// RFC 3339 timestamp carrying the fixed offset, as stored in chat logs.
    pub fn timestamp(&self) -> String {
        self.now().to_rfc3339()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_offset_applied() {
        let clock = Clock::new(-3);
        assert_eq!(clock.offset().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn invalid_offset_falls_back() {
        let clock = Clock::new(99);
        assert_eq!(clock.offset().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn timestamp_round_trips() {
        let clock = Clock::default();
        let ts = clock.timestamp();
        let parsed = DateTime::parse_from_rfc3339(&ts).unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), -3 * 3600);
    }
}
