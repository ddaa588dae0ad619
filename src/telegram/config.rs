//! Telegram configuration — the `telegram` section of the bot config.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token (direct value).
    #[serde(default)]
    pub bot_token: Option<String>,
    /// Or read the token from this environment variable.
    #[serde(default = "default_token_env")]
    pub bot_token_env: Option<String>,
    /// Chat ID whitelist — only these chats can interact with the bot.
    /// Empty list = reject all.
    #[serde(default)]
    pub allowed_chat_ids: Vec<i64>,
}

fn default_token_env() -> Option<String> {
    Some("TELEGRAM_BOT_TOKEN".to_string())
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            bot_token_env: default_token_env(),
            allowed_chat_ids: Vec::new(),
        }
    }
}

impl TelegramConfig {
    /// Resolve the bot token: check the direct field first, then the env var.
    pub fn resolve_bot_token(&self) -> Option<String> {
        crate::config::resolve_api_key(&self.bot_token, &self.bot_token_env)
    }
}
