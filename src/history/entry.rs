//! Chat-log record types — one entry per message, one document per
//! `(chat_id, date)` partition.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A single logged message. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatLogEntry {
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// RFC 3339 with the fixed civil-time offset.
    pub timestamp: String,
    pub message: String,
}

impl ChatLogEntry {
    pub fn parsed_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.timestamp).ok()
    }

    /// `First Last (@username)` — last name and username only when present.
    pub fn display_name(&self) -> String {
        let mut name = self.first_name.clone();
        if !self.last_name.is_empty() {
            name.push(' ');
            name.push_str(&self.last_name);
        }
        if let Some(ref username) = self.username {
            if !username.is_empty() {
                let at = if username.starts_with('@') { "" } else { "@" };
                name.push_str(&format!(" ({}{})", at, username));
            }
        }
        name
    }
}

/// On-disk partition document. Validated on load — a file that fails to
/// deserialize is rejected whole rather than patched up field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayLog {
    pub chat_id: i64,
    #[serde(default)]
    pub entries: Vec<ChatLogEntry>,
}

impl DayLog {
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            entries: Vec::new(),
        }
    }
}

/// Uniform stride crop: reduce `items` to at most `k` elements by keeping
/// every stride-th element starting at index `stride − 1`, with
/// `stride = ceil(len / k)`. Keeps later-in-partition items and always keeps
/// at least one element of a non-empty input.
pub fn stride_crop<T: Clone>(items: &[T], k: usize) -> Vec<T> {
    if items.is_empty() || k == 0 {
        return Vec::new();
    }
    let stride = items.len().div_ceil(k);
    items
        .iter()
        .skip(stride - 1)
        .step_by(stride)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(first: &str, last: &str, user: Option<&str>) -> ChatLogEntry {
        ChatLogEntry {
            user_id: "1".into(),
            username: user.map(|u| u.to_string()),
            first_name: first.into(),
            last_name: last.into(),
            timestamp: "2026-08-06T14:30:00-03:00".into(),
            message: "hi".into(),
        }
    }

    #[test]
    fn display_name_variants() {
        assert_eq!(entry("Ana", "Silva", Some("ana_s")).display_name(), "Ana Silva (@ana_s)");
        assert_eq!(entry("Ana", "", None).display_name(), "Ana");
        assert_eq!(entry("Ana", "", Some("@ana_s")).display_name(), "Ana (@ana_s)");
    }

    #[test]
    fn timestamp_parses_with_offset() {
        let at = entry("Ana", "", None).parsed_at().unwrap();
        assert_eq!(at.offset().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn crop_of_five_to_two_keeps_one() {
        // stride = ceil(5/2) = 3 → indices 2 only.
        let items: Vec<i32> = (0..5).collect();
        assert_eq!(stride_crop(&items, 2), vec![2]);
    }

    #[test]
    fn crop_of_six_to_two_keeps_two() {
        // stride = ceil(6/2) = 3 → indices 2, 5.
        let items: Vec<i32> = (0..6).collect();
        assert_eq!(stride_crop(&items, 2), vec![2, 5]);
    }

    #[test]
    fn crop_never_exceeds_budget() {
        for len in 1..40usize {
            let items: Vec<usize> = (0..len).collect();
            for k in 1..10usize {
                let kept = stride_crop(&items, k);
                assert!(!kept.is_empty());
                assert!(kept.len() <= k, "len={} k={} kept={}", len, k, kept.len());
            }
        }
    }

    #[test]
    fn crop_noop_when_budget_covers_input() {
        let items: Vec<i32> = (0..4).collect();
        assert_eq!(stride_crop(&items, 4), vec![0, 1, 2, 3]);
    }
}
