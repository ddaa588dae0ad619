//! Reply orchestration: decide whether to react, assemble the prompt, call
//! the generation backend (with the refusal escalation ladder), normalize
//! casing, persist and deliver.

pub mod casing;
pub mod feedback;
pub mod trigger;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::history::ChatHistoryStore;
use crate::llm::{GenOptions, LlmService};
use crate::prompt::{PromptAssembler, PromptOptions};
use crate::telegram::message::Incoming;
use crate::telegram::Transport;
use crate::users::OpinionLedger;
use crate::utils::image::to_data_url;

use casing::adjust_casing;
use feedback::WorkingIndicator;
use trigger::{is_reply_to_bot, name_trigger, wants_web_search, EngagementFlags};

/// Replies shorter than this that match a refusal marker trigger escalation.
const REFUSAL_MAX_LEN: usize = 220;

const REFUSAL_MARKERS: [&str; 8] = [
    "i can't",
    "i cannot",
    "i won't",
    "i am unable",
    "i'm unable",
    "as an ai",
    "can't help with",
    "can't assist",
];

fn looks_like_refusal(text: &str) -> bool {
    if text.chars().count() >= REFUSAL_MAX_LEN {
        return false;
    }
    let lower = text.to_lowercase();
    REFUSAL_MARKERS.iter().any(|marker| lower.contains(marker))
}

pub struct ReplyOrchestrator {
    pub history: Arc<ChatHistoryStore>,
    pub ledger: Arc<OpinionLedger>,
    pub llm: Arc<LlmService>,
    pub transport: Arc<dyn Transport>,
    pub assembler: PromptAssembler,
    pub flags: Arc<EngagementFlags>,
    pub persona: String,
    pub clock: Clock,
}

impl ReplyOrchestrator {
    /// The default reaction for every inbound message: update sentiment,
    /// maybe react with an emoji, maybe reply. Errors are logged and
    /// swallowed here — a failed reaction means no reply, nothing else.
    pub async fn handle(&self, msg: &Incoming) {
        let (tone, reaction) = self.ledger.observe(msg).await;
        debug!("message from {} classified as {:?}", msg.sender.id, tone);

        if let Some(emoji) = reaction {
            let transport = self.transport.clone();
            let (chat_id, message_id) = (msg.chat_id, msg.message_id);
            tokio::spawn(async move {
                transport.send_reaction(chat_id, message_id, emoji).await;
            });
        }

        if !self.should_reply(msg) {
            return;
        }

        let web_search = msg
            .content_text()
            .map(wants_web_search)
            .unwrap_or(false);

        let _working = WorkingIndicator::start(
            self.transport.clone(),
            self.history.clone(),
            msg.chat_id,
            msg.sender.username.clone(),
            self.persona.clone(),
        );

        let mut gen_opts = GenOptions {
            web_search,
            ..GenOptions::default()
        };

        let prompt_opts = if web_search {
            PromptOptions::compact()
        } else if let Some(file_id) = &msg.photo_file_id {
            if let Some(bytes) = self.transport.download_image(file_id).await {
                gen_opts.image = Some(to_data_url(&bytes));
                gen_opts.model = Some(self.llm.config().strong_model.clone());
            }
            PromptOptions {
                total_messages: 3,
                include_opinions: true,
                include_mood: true,
            }
        } else {
            PromptOptions::standard()
        };

        let prompt = self.assembler.build(msg, &prompt_opts).await;

        match self.generate_with_escalation(&prompt, gen_opts).await {
            Ok(raw) => {
                let reply = adjust_casing(&raw, &self.persona);
                if let Err(e) = self.history.append_bot(msg.chat_id, &self.persona, &reply) {
                    warn!("failed to persist own reply: {}", e);
                }
                if let Err(e) = self
                    .transport
                    .send_text(msg.chat_id, &reply, Some(msg.message_id))
                    .await
                {
                    warn!("failed to send reply: {}", e);
                }
            }
            Err(e) => warn!("generation failed, staying silent: {}", e),
        }
    }

    /// `/tldr`: summarize what the requester missed since they last spoke.
    pub async fn summarize(&self, msg: &Incoming) {
        let Some(text) = msg.text.as_deref() else {
            return;
        };
        if !text.to_lowercase().starts_with("/tldr") {
            return;
        }

        let _working = WorkingIndicator::start(
            self.transport.clone(),
            self.history.clone(),
            msg.chat_id,
            msg.sender.username.clone(),
            self.persona.clone(),
        );

        let entries =
            self.history
                .messages_since_user(msg.chat_id, &msg.sender.id.to_string(), 5);
        if entries.is_empty() {
            return;
        }
        let rendered = ChatHistoryStore::friendly_render(&entries);

        let prompt = format!(
            "In at most 500 characters, summarize the conversation below:\n\n{}",
            rendered
        );
        match self.llm.generate(&prompt, GenOptions::default()).await {
            Ok(raw) => {
                let reply = adjust_casing(&raw.to_lowercase(), &self.persona);
                if let Err(e) = self.history.append_bot(msg.chat_id, &self.persona, &reply) {
                    warn!("failed to persist summary: {}", e);
                }
                if let Err(e) = self
                    .transport
                    .send_text(msg.chat_id, &reply, Some(msg.message_id))
                    .await
                {
                    warn!("failed to send summary: {}", e);
                }
            }
            Err(e) => warn!("summary generation failed: {}", e),
        }
    }

    fn should_reply(&self, msg: &Incoming) -> bool {
        if let Some(text) = msg.content_text() {
            if name_trigger(text, &self.persona) {
                return true;
            }
        }
        if is_reply_to_bot(msg, &self.persona) {
            return true;
        }
        // Random engagement: plain text only, never commands.
        if msg.text.is_some() && !msg.is_command() {
            let mut rng = rand::thread_rng();
            if self.flags.roll(msg.chat_id, &mut rng) {
                debug!("random engagement fired for chat {}", msg.chat_id);
                return true;
            }
        }
        false
    }

    /// First attempt on the caller's model; a short refusal escalates to the
    /// strong model, then once more to the fallback. Never more than two
    /// escalations.
    async fn generate_with_escalation(
        &self,
        prompt: &str,
        mut opts: GenOptions,
    ) -> Result<String, String> {
        let first = self.llm.generate(prompt, opts.clone()).await?;
        if !looks_like_refusal(&first) {
            return Ok(first);
        }

        warn!("reply looks like a refusal, escalating to strong model");
        opts.model = Some(self.llm.config().strong_model.clone());
        let second = self.llm.generate(prompt, opts.clone()).await?;
        if !looks_like_refusal(&second) {
            return Ok(second);
        }

        warn!("still refusing, escalating to fallback model");
        opts.model = Some(self.llm.config().fallback_model.clone());
        self.llm.generate(prompt, opts).await
    }
}
