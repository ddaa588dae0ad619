//! Reply trigger policy and the daily engagement flags.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Duration as ChronoDuration;
use rand::Rng;
use tracing::info;

use crate::clock::Clock;
use crate::telegram::message::Incoming;

/// True when the text starts or ends with the persona name token,
/// case-insensitive, ignoring a trailing question mark.
pub fn name_trigger(text: &str, persona: &str) -> bool {
    let text = text.to_lowercase();
    let text = text.trim();
    let name = persona.to_lowercase();
    text.starts_with(&name) || text.trim_end_matches('?').trim_end().ends_with(&name)
}

/// True when the message replies to one of the bot's own messages.
pub fn is_reply_to_bot(msg: &Incoming, persona: &str) -> bool {
    let Some(reply) = &msg.reply_to else {
        return false;
    };
    let Some(sender) = &reply.sender else {
        return false;
    };
    sender.is_bot
        && sender
            .username
            .as_deref()
            .unwrap_or_default()
            .to_lowercase()
            .contains(&persona.to_lowercase())
}

/// Cues that route a reply through the web-search generation path.
const SEARCH_CUES: [&str; 4] = ["search for", "search the web", "look up", "look it up"];

pub fn wants_web_search(text: &str) -> bool {
    let lower = text.to_lowercase();
    SEARCH_CUES.iter().any(|cue| lower.contains(cue))
}

/// Once-a-day-per-chat random engagement.
///
/// Injected state rather than a process-wide global: the set of chats that
/// already engaged today, rolled against a fixed probability and cleared by
/// `reset_loop` at a fixed wall-clock hour.
pub struct EngagementFlags {
    engaged: Mutex<HashSet<i64>>,
    probability: f64,
    reset_hour: u32,
}

impl EngagementFlags {
    pub fn new(probability: f64, reset_hour: u32) -> Self {
        Self {
            engaged: Mutex::new(HashSet::new()),
            probability,
            reset_hour: reset_hour.min(23),
        }
    }

    /// One roll for this chat. At most one success per chat per day.
    pub fn roll<R: Rng>(&self, chat_id: i64, rng: &mut R) -> bool {
        let mut engaged = match self.engaged.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if engaged.contains(&chat_id) {
            return false;
        }
        if rng.gen::<f64>() < self.probability {
            engaged.insert(chat_id);
            return true;
        }
        false
    }

    pub fn reset(&self) {
        match self.engaged.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    /// Background task: clear the flags every day at `reset_hour` (at the
    /// fixed offset). Runs for the process lifetime.
    pub async fn reset_loop(self: Arc<Self>, clock: Clock) {
        info!("daily flags reset at {:02}:00", self.reset_hour);
        loop {
            let now = clock.now().naive_local();
            let today_reset = now
                .date()
                .and_hms_opt(self.reset_hour, 0, 0)
                .unwrap_or(now);
            let next = if now < today_reset {
                today_reset
            } else {
                today_reset + ChronoDuration::days(1)
            };
            let wait = (next - now)
                .to_std()
                .unwrap_or(std::time::Duration::from_secs(3600));

            tokio::time::sleep(wait).await;
            self.reset();
            info!("daily engagement flags reset");
        }
    }
}

impl std::fmt::Debug for EngagementFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngagementFlags")
            .field("probability", &self.probability)
            .field("reset_hour", &self.reset_hour)
            .finish()
    }
}
