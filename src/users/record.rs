//! Per-user ledger record.

use serde::{Deserialize, Serialize};

use crate::utils::text;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Free-text impressions, oldest first. Bounded by the ledger.
    #[serde(default)]
    pub opinions: Vec<String>,
    /// Grudge meter: 0.0 = fine, higher = worse. Never negative.
    #[serde(default)]
    pub affinity_score: f64,
    /// Side-channel, not used by the reaction pipeline.
    #[serde(default)]
    pub last_location: Option<String>,
}

impl UserRecord {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            username: None,
            first_name: None,
            last_name: None,
            opinions: Vec::new(),
            affinity_score: 0.0,
            last_location: None,
        }
    }

    /// Append an opinion; evict the oldest when past `max`.
    pub fn push_opinion(&mut self, opinion: String, max: usize) {
        self.opinions.push(opinion);
        while self.opinions.len() > max {
            self.opinions.remove(0);
        }
    }

    /// Adjust the affinity score, clamped at 0.0.
    pub fn adjust_affinity(&mut self, delta: f64) {
        self.affinity_score = (self.affinity_score + delta).max(0.0);
    }

    /// Mention handle: `@username` or lowercased first name.
    pub fn handle(&self) -> String {
        text::handle(self.first_name.as_deref(), self.username.as_deref())
    }
}
