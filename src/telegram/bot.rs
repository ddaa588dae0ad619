//! Polling loop and the teloxide-backed Transport implementation.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, MessageId, ReactionType, ReplyParameters};
use tracing::{debug, info, warn};

use super::message::Incoming;
use super::Transport;
use crate::clock::Clock;
use crate::config::BotConfig;
use crate::history::ChatHistoryStore;
use crate::llm::LlmService;
use crate::prompt::PromptAssembler;
use crate::reply::trigger::EngagementFlags;
use crate::reply::ReplyOrchestrator;
use crate::users::OpinionLedger;

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i32>,
    ) -> Result<(), String> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(message_id) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(message_id)));
        }
        request.await.map(|_| ()).map_err(|e| e.to_string())
    }

    async fn send_reaction(&self, chat_id: i64, message_id: i32, emoji: &str) {
        let result = self
            .bot
            .set_message_reaction(ChatId(chat_id), MessageId(message_id))
            .reaction(vec![ReactionType::Emoji {
                emoji: emoji.to_string(),
            }])
            .await;
        if let Err(e) = result {
            warn!("failed to send reaction: {}", e);
        }
    }

    async fn send_typing(&self, chat_id: i64) {
        if let Err(e) = self
            .bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
        {
            debug!("typing action failed: {}", e);
        }
    }

    async fn download_image(&self, file_id: &str) -> Option<Vec<u8>> {
        let file = match self.bot.get_file(file_id.to_string()).await {
            Ok(file) => file,
            Err(e) => {
                warn!("get_file failed: {}", e);
                return None;
            }
        };
        let mut buf = Vec::new();
        match teloxide::net::Download::download_file(&self.bot, &file.path, &mut buf).await {
            Ok(()) => Some(buf),
            Err(e) => {
                warn!("photo download failed: {}", e);
                None
            }
        }
    }
}

/// Build the pipeline and run long polling until the process is stopped.
pub async fn run(config: BotConfig) -> anyhow::Result<()> {
    let token = config
        .telegram
        .resolve_bot_token()
        .context("no Telegram bot token configured")?;

    let bot = Bot::new(token);
    let clock = Clock::new(config.utc_offset_hours);
    let transport: Arc<dyn Transport> = Arc::new(TelegramTransport::new(bot.clone()));

    let history = Arc::new(ChatHistoryStore::new(
        config.data_dir.join("chat_logs"),
        clock,
    ));
    let llm = Arc::new(LlmService::from_config(config.llm.clone()));
    let ledger = Arc::new(OpinionLedger::new(
        config.data_dir.join("users.json"),
        llm.clone(),
        config.max_opinions,
    ));
    let flags = Arc::new(EngagementFlags::new(
        config.engagement_probability,
        config.flags_reset_hour,
    ));

    // Supervised background loops — process lifetime, log-and-continue.
    tokio::spawn(ledger.clone().decay_loop());
    tokio::spawn(flags.clone().reset_loop(clock));

    let assembler = PromptAssembler::new(
        history.clone(),
        ledger.clone(),
        llm.clone(),
        transport.clone(),
        config.persona.clone(),
        clock,
    );
    let orchestrator = Arc::new(ReplyOrchestrator {
        history,
        ledger,
        llm,
        transport,
        assembler,
        flags,
        persona: config.persona.clone(),
        clock,
    });
    let config = Arc::new(config);

    info!("bot polling started as persona {:?}", orchestrator.persona);

    let handler = Update::filter_message().endpoint(handle_message);
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![orchestrator, config])
        .default_handler(|_upd| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("bot polling stopped");
    Ok(())
}

/// Per-update entry point: whitelist, persist, then fan out the reactions.
/// Each reaction swallows its own errors, so one failing reaction never
/// cancels its siblings.
async fn handle_message(
    msg: Message,
    orchestrator: Arc<ReplyOrchestrator>,
    config: Arc<BotConfig>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let chat_id = msg.chat.id.0;
    if !config.telegram.allowed_chat_ids.contains(&chat_id) {
        debug!("chat {} not whitelisted, ignoring", chat_id);
        return Ok(());
    }

    let Some(incoming) = Incoming::from_telegram(&msg) else {
        return Ok(());
    };
    if incoming.sender.is_bot {
        return Ok(());
    }

    if let Err(e) = orchestrator.history.append_incoming(&incoming) {
        warn!("failed to persist inbound message: {}", e);
    }
    if let Err(e) = orchestrator.ledger.ensure(&incoming.sender) {
        warn!("failed to ensure ledger record: {}", e);
    }

    tokio::join!(
        orchestrator.handle(&incoming),
        orchestrator.summarize(&incoming),
    );

    Ok(())
}
