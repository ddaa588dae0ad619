//! Durable, append-only chat history with windowed retrieval.
//!
//! Layout: `<root>/<chat_id>/<YYYY-MM-DD>.json`, one document per chat per
//! calendar day (dates at the fixed offset). Partitions are created lazily on
//! the first message of the day and written through on every append — there
//! is no buffering across process restarts. Files are opened per logical
//! operation and never held across await points; concurrent handlers may race
//! on the same day's file with last-writer-wins semantics (appends are
//! idempotent in practice, see DESIGN.md).

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{Datelike, Duration, NaiveDate};
use thiserror::Error;
use tracing::warn;

use super::entry::{stride_crop, ChatLogEntry, DayLog};
use crate::clock::Clock;
use crate::telegram::message::Incoming;
use crate::utils::text;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed partition: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub struct ChatHistoryStore {
    root: PathBuf,
    clock: Clock,
}

impl ChatHistoryStore {
    pub fn new(root: PathBuf, clock: Clock) -> Self {
        Self { root, clock }
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    fn chat_dir(&self, chat_id: i64) -> PathBuf {
        self.root.join(chat_id.to_string())
    }

    fn partition_path(&self, chat_id: i64, date: &str) -> PathBuf {
        self.chat_dir(chat_id).join(format!("{}.json", date))
    }

    /// Append one entry to today's partition, creating it if absent.
    pub fn append(&self, chat_id: i64, entry: ChatLogEntry) -> Result<(), StoreError> {
        let dir = self.chat_dir(chat_id);
        std::fs::create_dir_all(&dir)?;

        let path = self.partition_path(chat_id, &self.clock.date_str());
        let mut day = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<DayLog>(&content)?,
            Err(_) => DayLog::new(chat_id),
        };
        day.entries.push(entry);
        std::fs::write(&path, serde_json::to_string(&day)?)?;
        Ok(())
    }

    /// Append a message received from a user.
    pub fn append_incoming(&self, msg: &Incoming) -> Result<(), StoreError> {
        let username = msg.sender.username.clone().or_else(|| {
            let h = text::handle(Some(&msg.sender.first_name), None);
            (!h.is_empty()).then_some(h)
        });
        self.append(
            msg.chat_id,
            ChatLogEntry {
                user_id: msg.sender.id.to_string(),
                username,
                first_name: msg.sender.first_name.clone(),
                last_name: msg.sender.last_name.clone().unwrap_or_default(),
                timestamp: self.clock.timestamp(),
                message: msg.content_text().unwrap_or_default().to_string(),
            },
        )
    }

    /// Append one of the bot's own replies.
    pub fn append_bot(&self, chat_id: i64, persona: &str, message: &str) -> Result<(), StoreError> {
        self.append(
            chat_id,
            ChatLogEntry {
                user_id: "0".to_string(),
                username: None,
                first_name: persona.to_string(),
                last_name: String::new(),
                timestamp: self.clock.timestamp(),
                message: message.to_string(),
            },
        )
    }

    /// Load every partition with date ≥ now − `since_days` (all partitions
    /// when `since_days` ≤ 0), entries sorted by timestamp within each day.
    /// When the combined count exceeds `max_total` (> 0), each partition is
    /// stride-cropped to an even per-partition budget, keeping at least one
    /// entry per day as long as `max_total` covers the partition count.
    ///
    /// Malformed files are skipped with a warning — never fatal.
    pub fn get_window(
        &self,
        chat_id: i64,
        since_days: i64,
        max_total: usize,
    ) -> BTreeMap<NaiveDate, Vec<ChatLogEntry>> {
        let mut result: BTreeMap<NaiveDate, Vec<ChatLogEntry>> = BTreeMap::new();

        let dir = self.chat_dir(chat_id);
        let read_dir = match std::fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(_) => return result,
        };

        let cutoff = (since_days > 0).then(|| self.clock.today() - Duration::days(since_days));

        for item in read_dir.flatten() {
            let name = item.file_name().to_string_lossy().to_string();
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            let date = match NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                Ok(d) => d,
                Err(e) => {
                    warn!("skipping partition with unparseable date {:?}: {}", name, e);
                    continue;
                }
            };
            if let Some(cutoff) = cutoff {
                if date < cutoff {
                    continue;
                }
            }

            let day: DayLog = match std::fs::read_to_string(item.path())
                .map_err(StoreError::from)
                .and_then(|c| serde_json::from_str(&c).map_err(StoreError::from))
            {
                Ok(day) => day,
                Err(e) => {
                    warn!("skipping partition {}: {}", item.path().display(), e);
                    continue;
                }
            };
            if day.entries.is_empty() {
                continue;
            }

            let mut entries = day.entries;
            entries.sort_by_key(|e| e.parsed_at().map(|at| at.timestamp()).unwrap_or(i64::MIN));
            result.insert(date, entries);
        }

        if max_total > 0 && !result.is_empty() {
            let total: usize = result.values().map(Vec::len).sum();
            if total > max_total {
                let per_partition = if result.len() > max_total {
                    1
                } else {
                    (max_total / result.len()).max(1)
                };
                for entries in result.values_mut() {
                    let k = per_partition.min(entries.len());
                    *entries = stride_crop(entries, k);
                }
            }
        }

        result
    }

    /// Flatten `get_window` chronologically, trailing `limit` entries.
    pub fn last_messages(&self, chat_id: i64, limit: usize, since_days: i64) -> Vec<ChatLogEntry> {
        let all: Vec<ChatLogEntry> = self
            .get_window(chat_id, since_days, 0)
            .into_values()
            .flatten()
            .collect();
        if all.len() > limit {
            all[all.len() - limit..].to_vec()
        } else {
            all
        }
    }

    /// The window "since the user last spoke", over the 100 most recent
    /// entries. The returned slice starts at the beginning of the user's
    /// previous activity burst: the first earlier message by the same user
    /// more than `tolerance` positions before their last one, extended
    /// backwards over messages within `tolerance` of that anchor. A user with
    /// no earlier separated message gets the slice from their last message;
    /// a user with no messages at all gets the whole window.
    pub fn messages_since_user(
        &self,
        chat_id: i64,
        user_id: &str,
        tolerance: usize,
    ) -> Vec<ChatLogEntry> {
        let flat: Vec<ChatLogEntry> = self
            .get_window(chat_id, 0, 100)
            .into_values()
            .flatten()
            .collect();

        let positions: Vec<usize> = flat
            .iter()
            .enumerate()
            .filter(|(_, e)| e.user_id == user_id)
            .map(|(i, _)| i)
            .collect();

        let Some(&last) = positions.last() else {
            return flat;
        };

        let mut start = last;
        if let Some(anchor_pos) = positions
            .iter()
            .rev()
            .skip(1)
            .position(|&i| last - i > tolerance)
        {
            // positions index of the anchor, counted from the end.
            let anchor_idx = positions.len() - 2 - anchor_pos;
            let anchor = positions[anchor_idx];
            start = anchor;
            for &i in positions[..anchor_idx].iter().rev() {
                if anchor - i <= tolerance {
                    start = i;
                } else {
                    break;
                }
            }
        }

        flat[start..].to_vec()
    }

    /// Render entries for prompt injection: a date header on every calendar
    /// day change, then `HH:MM - DisplayName: message` lines.
    pub fn friendly_render(entries: &[ChatLogEntry]) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut current_date: Option<NaiveDate> = None;

        for entry in entries {
            let Some(at) = entry.parsed_at() else {
                warn!("skipping entry with unparseable timestamp {:?}", entry.timestamp);
                continue;
            };
            let date = at.date_naive();
            if current_date != Some(date) {
                current_date = Some(date);
                lines.push(format!(
                    "--- {}, {} ---",
                    weekday_name(date),
                    date.format("%Y-%m-%d")
                ));
            }
            lines.push(format!(
                "{} - {}: {}",
                at.format("%H:%M"),
                entry.display_name(),
                entry.message
            ));
        }

        lines.join("\n")
    }
}

fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        chrono::Weekday::Mon => "Monday",
        chrono::Weekday::Tue => "Tuesday",
        chrono::Weekday::Wed => "Wednesday",
        chrono::Weekday::Thu => "Thursday",
        chrono::Weekday::Fri => "Friday",
        chrono::Weekday::Sat => "Saturday",
        chrono::Weekday::Sun => "Sunday",
    }
}
