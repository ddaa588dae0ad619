//! Deterministic prompt assembly: persona + memory window + relevant
//! opinions + the message to answer, in a fixed order, under a bounded
//! window. The only non-deterministic inputs are the two external calls
//! (reply-photo description and opinion text), both already persisted or
//! degraded before concatenation.

use std::sync::Arc;

use tracing::warn;

use super::topics;
use crate::clock::Clock;
use crate::history::ChatHistoryStore;
use crate::llm::{GenOptions, LlmService};
use crate::telegram::message::Incoming;
use crate::telegram::Transport;
use crate::users::{OpinionLedger, MATCH_THRESHOLD};
use crate::utils::text;

/// Character cap applied to each opinion line in the prompt.
const OPINION_CHAR_CAP: usize = 140;
/// Cap on quoted parent-message text in the back-reference clause.
const BACK_REF_CHAR_CAP: usize = 200;

#[derive(Debug, Clone)]
pub struct PromptOptions {
    pub total_messages: usize,
    pub include_opinions: bool,
    pub include_mood: bool,
}

impl PromptOptions {
    /// The normal reply path: a 10-message window with opinions and mood.
    pub fn standard() -> Self {
        Self {
            total_messages: 10,
            include_opinions: true,
            include_mood: true,
        }
    }

    /// Latency/cost-sensitive path (web search, image replies): a few
    /// messages of context, no ledger lookups.
    pub fn compact() -> Self {
        Self {
            total_messages: 3,
            include_opinions: false,
            include_mood: false,
        }
    }
}

pub struct PromptAssembler {
    history: Arc<ChatHistoryStore>,
    ledger: Arc<OpinionLedger>,
    llm: Arc<LlmService>,
    transport: Arc<dyn Transport>,
    persona: String,
    clock: Clock,
}

impl PromptAssembler {
    pub fn new(
        history: Arc<ChatHistoryStore>,
        ledger: Arc<OpinionLedger>,
        llm: Arc<LlmService>,
        transport: Arc<dyn Transport>,
        persona: String,
        clock: Clock,
    ) -> Self {
        Self {
            history,
            ledger,
            llm,
            transport,
            persona,
            clock,
        }
    }

    pub async fn build(&self, msg: &Incoming, opts: &PromptOptions) -> String {
        let entries = self
            .history
            .last_messages(msg.chat_id, opts.total_messages, 0);
        let chat_history = ChatHistoryStore::friendly_render(&entries);

        let back_reference = self.back_reference(msg).await;

        let own_text = msg.content_text().unwrap_or_default();
        let ask = if own_text.is_empty() {
            format!(
                "Pretending to be {}, answer {} about the image at the end of the conversation.",
                self.persona, msg.sender.first_name
            )
        } else {
            format!(
                "Pretending to be {}, answer the message '{}{}' sent by {} at the end of the conversation.",
                self.persona, own_text, back_reference, msg.sender.first_name
            )
        };

        let mut prompt = String::new();
        if opts.include_mood {
            prompt.push_str(self.ledger.mood_prompt(msg.sender.id));
            prompt.push_str("\n\n");
        }
        prompt.push_str(&ask);
        prompt.push_str("\n\n");

        if let Some(guard) = topics::guard_block(&chat_history) {
            prompt.push_str(guard);
            prompt.push('\n');
        }

        if opts.include_opinions {
            prompt.push_str(&self.opinions_block(&chat_history));
        }

        prompt.push_str(&chat_history);
        prompt.push_str(&back_reference);
        prompt.push_str(&format!("\n{} - {}: ", self.clock.time_str(), self.persona));
        prompt
    }

    /// Opinion blocks for every user the rendered window mentions.
    fn opinions_block(&self, chat_history: &str) -> String {
        let mut block = String::new();
        for user in self.ledger.find_by_text(chat_history, MATCH_THRESHOLD) {
            if user.opinions.is_empty() {
                continue;
            }
            let display = user.handle();
            let lines: Vec<String> = user
                .opinions
                .iter()
                .map(|op| text::truncate_chars(op, OPINION_CHAR_CAP))
                .collect();
            block.push_str(&format!(
                "What {} knows about {}:\n{}\nTreat this as reliable context whenever {} comes up.\n\n",
                self.persona,
                display,
                lines.join("\n"),
                display
            ));
        }
        block
    }

    /// Bracketed clause describing the message being replied to. Resolution
    /// failures (missing photo, vision error) degrade to an empty fragment —
    /// never abort prompt construction.
    async fn back_reference(&self, msg: &Incoming) -> String {
        let Some(reply) = &msg.reply_to else {
            return String::new();
        };
        let who = reply
            .sender
            .as_ref()
            .map(|s| s.first_name.clone())
            .unwrap_or_else(|| "someone".to_string());

        if let Some(parent_text) = reply.text.as_deref().filter(|t| !t.is_empty()) {
            return format!(
                " [in reply to {}: \"{}\"]",
                who,
                text::truncate_chars(parent_text, BACK_REF_CHAR_CAP)
            );
        }

        if let Some(file_id) = &reply.photo_file_id {
            if let Some(description) = self.describe_photo(file_id).await {
                return format!(" [in reply to a photo from {}: {}]", who, description);
            }
        }

        String::new()
    }

    async fn describe_photo(&self, file_id: &str) -> Option<String> {
        let bytes = self.transport.download_image(file_id).await?;
        let data_url = crate::utils::image::to_data_url(&bytes);

        match self
            .llm
            .generate(
                "Describe this image in one short sentence.",
                GenOptions {
                    image: Some(data_url),
                    ..GenOptions::default()
                },
            )
            .await
        {
            Ok(description) if !description.trim().is_empty() => {
                Some(description.trim().to_string())
            }
            Ok(_) => None,
            Err(e) => {
                warn!("reply-photo description failed: {}", e);
                None
            }
        }
    }
}
