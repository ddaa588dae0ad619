//! User ledger: identity, bounded opinion history, decaying affinity score.
//!
//! Persisted as a single JSON table keyed by user id. The file is loaded and
//! written per logical operation and never held across await points —
//! concurrent reaction handlers may race with last-writer-wins semantics on
//! the same user, an accepted tradeoff (see DESIGN.md). Appends are bounded
//! and adjustments are monotone-clamped, so a lost update degrades accuracy,
//! not invariants.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::record::UserRecord;
use super::tone::{self, Tone};
use crate::llm::{GenOptions, LlmService};
use crate::telegram::message::{Incoming, Sender};
use crate::utils::text;

/// Decay step applied per tick to every user with a positive score.
const DECAY_STEP: f64 = -0.1;
/// Seconds between decay ticks (20 minutes).
const DECAY_INTERVAL_SECS: u64 = 1200;
/// Backoff after a failed tick.
const DECAY_RETRY_SECS: u64 = 60;

/// Default similarity threshold for name matching.
pub const MATCH_THRESHOLD: f64 = 0.8;

/// Persona directives by rounded affinity score, ascending severity.
const MOOD_TIERS: &[&str] = &[
    "Reply in a friendly, matter-of-fact way.",
    "Reply in a friendly, matter-of-fact way.",
    "Reply in a friendly, matter-of-fact way.",
    "Be helpful and keep answers to the point.",
    "Give very short answers.",
    "Reply with indifference, but stay on topic.",
    "Be cold and give very short answers.",
    "Be slightly impatient and passive-aggressive.",
    "Be a bit blunt. Use what you know about people for small jabs.",
    "Reply grudgingly and always passive-aggressively. Use what you know about \
     people for small jabs. Never apologize for anything.",
];

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed ledger: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerTable {
    #[serde(default)]
    users: BTreeMap<i64, UserRecord>,
}

pub struct OpinionLedger {
    path: PathBuf,
    llm: Arc<LlmService>,
    max_opinions: usize,
}

impl OpinionLedger {
    pub fn new(path: PathBuf, llm: Arc<LlmService>, max_opinions: usize) -> Self {
        Self {
            path,
            llm,
            max_opinions,
        }
    }

    /// A missing file is an empty table (first run); a corrupt file is an
    /// error so a later save cannot clobber data we failed to read.
    fn load(&self) -> Result<LedgerTable, LedgerError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LedgerTable::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, table: &LedgerTable) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(table)?)?;
        Ok(())
    }

    pub fn get(&self, user_id: i64) -> Option<UserRecord> {
        match self.load() {
            Ok(table) => table.users.get(&user_id).cloned(),
            Err(e) => {
                warn!("ledger read failed: {}", e);
                None
            }
        }
    }

    pub fn all(&self) -> Vec<UserRecord> {
        match self.load() {
            Ok(table) => table.users.into_values().collect(),
            Err(e) => {
                warn!("ledger read failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Return the existing record or create one from the sender's identity.
    pub fn ensure(&self, sender: &Sender) -> Result<UserRecord, LedgerError> {
        let mut table = self.load()?;
        if let Some(record) = table.users.get(&sender.id) {
            return Ok(record.clone());
        }

        let record = UserRecord {
            user_id: sender.id,
            username: sender.username.clone(),
            first_name: Some(sender.first_name.clone()),
            last_name: sender.last_name.clone(),
            ..UserRecord::new(sender.id)
        };
        table.users.insert(sender.id, record.clone());
        self.save(&table)?;
        debug!("created ledger record for user {}", sender.id);
        Ok(record)
    }

    /// Adjust the affinity score, clamped at 0.0. Silent no-op for unknown
    /// users — identity creation happens earlier in the pipeline.
    pub fn adjust(&self, user_id: i64, delta: f64) -> Option<UserRecord> {
        let mut table = match self.load() {
            Ok(t) => t,
            Err(e) => {
                warn!("ledger read failed: {}", e);
                return None;
            }
        };
        let record = table.users.get_mut(&user_id)?;
        record.adjust_affinity(delta);
        let updated = record.clone();
        if let Err(e) = self.save(&table) {
            warn!("ledger write failed: {}", e);
            return None;
        }
        Some(updated)
    }

    /// Append an opinion, resolved by user id first, then by exact username.
    /// Silent no-op when neither resolves.
    pub fn add_opinion(
        &self,
        opinion: &str,
        user_id: Option<i64>,
        username: Option<&str>,
    ) -> Option<UserRecord> {
        let mut table = match self.load() {
            Ok(t) => t,
            Err(e) => {
                warn!("ledger read failed: {}", e);
                return None;
            }
        };

        let id = match user_id {
            Some(id) if table.users.contains_key(&id) => Some(id),
            _ => username.and_then(|name| {
                table
                    .users
                    .values()
                    .find(|r| r.username.as_deref() == Some(name))
                    .map(|r| r.user_id)
            }),
        }?;

        let record = table.users.get_mut(&id)?;
        record.push_opinion(opinion.to_string(), self.max_opinions);
        let updated = record.clone();
        if let Err(e) = self.save(&table) {
            warn!("ledger write failed: {}", e);
            return None;
        }
        Some(updated)
    }

    /// Persona directive for the rounded affinity score, clamped into the
    /// tier range. Unknown users get tier 0.
    pub fn mood_prompt(&self, user_id: i64) -> &'static str {
        let level = self
            .get(user_id)
            .map(|r| (r.affinity_score.round() as i64).clamp(0, MOOD_TIERS.len() as i64 - 1))
            .unwrap_or(0);
        MOOD_TIERS[level as usize]
    }

    /// Users whose first name or username fuzzily matches any whitespace
    /// token of `text`. Best-effort index for cross-referencing mentions —
    /// never used for identity.
    pub fn find_by_text(&self, text_input: &str, threshold: f64) -> Vec<UserRecord> {
        let lower = text_input.to_lowercase();
        let tokens: Vec<&str> = lower.split_whitespace().collect();

        self.all()
            .into_iter()
            .filter(|user| {
                let names = [
                    user.first_name.as_deref().map(|n| n.to_lowercase()),
                    user.username.as_deref().map(|n| n.to_lowercase()),
                ];
                names.iter().flatten().any(|name| {
                    !name.is_empty()
                        && tokens
                            .iter()
                            .any(|token| text::similarity_ratio(name, token) >= threshold)
                })
            })
            .collect()
    }

    /// Tone pipeline for one inbound message: classify, apply the affinity
    /// delta, pick a reaction emoji, probabilistically record an opinion.
    /// Classification failures degrade to neutral.
    pub async fn observe(&self, msg: &Incoming) -> (Tone, Option<&'static str>) {
        let Some(message_text) = msg.content_text().map(|t| t.to_string()) else {
            return (Tone::Neutral, None);
        };
        if message_text.is_empty() {
            return (Tone::Neutral, None);
        }

        let tone = match self
            .llm
            .generate(&tone::classification_prompt(&message_text), GenOptions::default())
            .await
        {
            Ok(reply) => tone::parse_tone_reply(&reply),
            Err(e) => {
                warn!("tone classification failed: {}", e);
                Tone::Neutral
            }
        };

        if tone.affinity_delta() != 0.0 {
            self.adjust(msg.sender.id, tone.affinity_delta());
        }

        let reaction = tone.reactions().choose(&mut rand::thread_rng()).copied();

        let record_opinion = tone != Tone::Neutral
            || rand::thread_rng().gen::<f64>() < tone::NEUTRAL_OPINION_PROBABILITY;
        if record_opinion {
            self.opinion_from_message(&message_text, msg).await;
        }

        (tone, reaction)
    }

    async fn opinion_from_message(&self, message_text: &str, msg: &Incoming) {
        let handle = text::handle(
            Some(&msg.sender.first_name),
            msg.sender.username.as_deref(),
        );
        match self
            .llm
            .generate(&tone::opinion_prompt(message_text, &handle), GenOptions::default())
            .await
        {
            Ok(opinion) => {
                let opinion = opinion.trim();
                if !opinion.is_empty() && !tone::is_rejected_opinion(opinion) {
                    self.add_opinion(opinion, Some(msg.sender.id), msg.sender.username.as_deref());
                }
            }
            Err(e) => warn!("opinion generation failed: {}", e),
        }
    }

    /// One decay tick: every positive score moves toward 0 by the fixed step.
    fn decay_once(&self) -> Result<usize, LedgerError> {
        let mut table = self.load()?;
        let mut touched = 0;
        for record in table.users.values_mut() {
            if record.affinity_score > 0.0 {
                record.adjust_affinity(DECAY_STEP);
                touched += 1;
            }
        }
        if touched > 0 {
            self.save(&table)?;
        }
        Ok(touched)
    }

    /// Background decay loop. Runs for the process lifetime; a failed tick is
    /// logged and retried after a short backoff, never fatal.
    pub async fn decay_loop(self: Arc<Self>) {
        info!("starting affinity decay loop");
        loop {
            match self.decay_once() {
                Ok(touched) => {
                    if touched > 0 {
                        debug!("decayed affinity for {} users", touched);
                    }
                    tokio::time::sleep(Duration::from_secs(DECAY_INTERVAL_SECS)).await;
                }
                Err(e) => {
                    warn!("decay tick failed: {}", e);
                    tokio::time::sleep(Duration::from_secs(DECAY_RETRY_SECS)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Generator, LlmConfig};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Backend that replays a fixed script of replies.
    struct ScriptedGen {
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedGen {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            })
        }
    }

    #[async_trait]
    impl Generator for ScriptedGen {
        async fn generate_text(&self, _prompt: &str, _options: GenOptions) -> Result<String, String> {
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "3".to_string()))
        }

        fn id(&self) -> &str {
            "scripted"
        }
    }

    fn ledger_with(replies: &[&str]) -> (tempfile::TempDir, OpinionLedger) {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(LlmService::with_provider(
            ScriptedGen::new(replies),
            LlmConfig::default(),
        ));
        let ledger = OpinionLedger::new(dir.path().join("users.json"), llm, 8);
        (dir, ledger)
    }

    fn sender(id: i64, first: &str, username: Option<&str>) -> Sender {
        Sender {
            id,
            is_bot: false,
            first_name: first.to_string(),
            last_name: None,
            username: username.map(|u| u.to_string()),
        }
    }

    #[test]
    fn ensure_creates_once() {
        let (_guard, ledger) = ledger_with(&[]);
        let a = ledger.ensure(&sender(1, "Ana", Some("ana"))).unwrap();
        assert_eq!(a.affinity_score, 0.0);
        assert!(a.opinions.is_empty());

        ledger.adjust(1, 3.0);
        let again = ledger.ensure(&sender(1, "Ana", Some("ana"))).unwrap();
        assert_eq!(again.affinity_score, 3.0, "ensure must not reset state");
    }

    #[test]
    fn adjust_clamps_and_ignores_unknown() {
        let (_guard, ledger) = ledger_with(&[]);
        ledger.ensure(&sender(1, "Ana", None)).unwrap();

        ledger.adjust(1, 2.5);
        ledger.adjust(1, -100.0);
        assert_eq!(ledger.get(1).unwrap().affinity_score, 0.0);

        assert!(ledger.adjust(999, 1.0).is_none());
    }

    #[test]
    fn add_opinion_resolves_by_username_fallback() {
        let (_guard, ledger) = ledger_with(&[]);
        ledger.ensure(&sender(1, "Ana", Some("ana"))).unwrap();

        assert!(ledger.add_opinion("curious", None, Some("ana")).is_some());
        assert!(ledger.add_opinion("lost", Some(42), Some("nobody")).is_none());
        assert_eq!(ledger.get(1).unwrap().opinions, vec!["curious"]);
    }

    #[test]
    fn opinion_fifo_bound_holds() {
        let (_guard, ledger) = ledger_with(&[]);
        ledger.ensure(&sender(1, "Ana", None)).unwrap();
        for i in 0..10 {
            ledger.add_opinion(&format!("op{}", i), Some(1), None);
        }
        let opinions = ledger.get(1).unwrap().opinions;
        assert_eq!(opinions.len(), 8);
        assert_eq!(opinions[0], "op2");
    }

    #[test]
    fn mood_prompt_tiers() {
        let (_guard, ledger) = ledger_with(&[]);
        ledger.ensure(&sender(1, "Ana", None)).unwrap();

        assert_eq!(ledger.mood_prompt(1), MOOD_TIERS[0]);
        assert_eq!(ledger.mood_prompt(999), MOOD_TIERS[0]);

        ledger.adjust(1, 7.2);
        assert_eq!(ledger.mood_prompt(1), MOOD_TIERS[7]);

        ledger.adjust(1, 100.0);
        assert_eq!(ledger.mood_prompt(1), MOOD_TIERS[MOOD_TIERS.len() - 1]);
    }

    #[test]
    fn find_by_text_tolerates_typos() {
        let (_guard, ledger) = ledger_with(&[]);
        ledger.ensure(&sender(1, "Renato", Some("renatok"))).unwrap();
        ledger.ensure(&sender(2, "Bia", None)).unwrap();

        let hits = ledger.find_by_text("someone said renata was late", MATCH_THRESHOLD);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].user_id, 1);

        assert!(ledger.find_by_text("completely unrelated words", MATCH_THRESHOLD).is_empty());
    }

    #[test]
    fn corrupt_ledger_is_not_clobbered() {
        let (_guard, ledger) = ledger_with(&[]);
        ledger.ensure(&sender(1, "Ana", None)).unwrap();
        std::fs::write(&ledger.path, "{broken").unwrap();

        assert!(ledger.adjust(1, 1.0).is_none());
        // The corrupt content must still be on disk, not replaced by an
        // empty table.
        assert_eq!(std::fs::read_to_string(&ledger.path).unwrap(), "{broken");
    }

    #[test]
    fn decay_moves_toward_zero_and_stops() {
        let (_guard, ledger) = ledger_with(&[]);
        ledger.ensure(&sender(1, "Ana", None)).unwrap();
        ledger.ensure(&sender(2, "Bia", None)).unwrap();
        ledger.adjust(1, 0.25);

        assert_eq!(ledger.decay_once().unwrap(), 1);
        assert!((ledger.get(1).unwrap().affinity_score - 0.15).abs() < 1e-9);

        ledger.decay_once().unwrap();
        ledger.decay_once().unwrap();
        assert_eq!(ledger.get(1).unwrap().affinity_score, 0.0);
        assert_eq!(ledger.decay_once().unwrap(), 0);
    }

    #[tokio::test]
    async fn rude_message_raises_score_and_records_opinion() {
        let (_guard, ledger) = ledger_with(&["4", "Aggressive with everyone."]);
        let from = sender(1, "Ana", Some("ana"));
        ledger.ensure(&from).unwrap();

        let msg = Incoming {
            chat_id: 10,
            message_id: 1,
            sender: from,
            text: Some("you are useless".into()),
            caption: None,
            photo_file_id: None,
            reply_to: None,
        };

        let (tone, reaction) = ledger.observe(&msg).await;
        assert_eq!(tone, Tone::Rude);
        assert!(Tone::Rude.reactions().contains(&reaction.unwrap()));

        let record = ledger.get(1).unwrap();
        assert_eq!(record.affinity_score, 1.0);
        assert_eq!(record.opinions, vec!["Aggressive with everyone."]);
    }

    #[tokio::test]
    async fn message_without_text_is_neutral() {
        let (_guard, ledger) = ledger_with(&[]);
        let from = sender(1, "Ana", None);
        ledger.ensure(&from).unwrap();

        let msg = Incoming {
            chat_id: 10,
            message_id: 1,
            sender: from,
            text: None,
            caption: None,
            photo_file_id: Some("f".into()),
            reply_to: None,
        };
        let (tone, reaction) = ledger.observe(&msg).await;
        assert_eq!(tone, Tone::Neutral);
        assert!(reaction.is_none());
    }

    proptest! {
        #[test]
        fn affinity_floor_under_any_sequence(deltas in proptest::collection::vec(-60.0f64..60.0, 0..40)) {
            let (_guard, ledger) = ledger_with(&[]);
            ledger.ensure(&sender(1, "Ana", None)).unwrap();
            for delta in deltas {
                ledger.adjust(1, delta);
                prop_assert!(ledger.get(1).unwrap().affinity_score >= 0.0);
            }
        }

        #[test]
        fn opinion_bound_under_any_sequence(count in 0usize..30) {
            let (_guard, ledger) = ledger_with(&[]);
            ledger.ensure(&sender(1, "Ana", None)).unwrap();
            for i in 0..count {
                ledger.add_opinion(&format!("op{}", i), Some(1), None);
            }
            let opinions = ledger.get(1).unwrap().opinions;
            prop_assert!(opinions.len() <= 8);
            if count > 8 {
                prop_assert_eq!(opinions[0].clone(), format!("op{}", count - 8));
            }
        }
    }
}
