//! Telegram boundary: the transport seam the reaction pipeline depends on,
//! the inbound message view, and the polling loop.

pub mod bot;
pub mod config;
pub mod message;

pub use config::TelegramConfig;

use async_trait::async_trait;

/// What the core needs from the chat platform. Implemented over teloxide in
/// `bot`; stubbed in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i32>,
    ) -> Result<(), String>;

    /// Fire-and-forget emoji reaction; failures are logged, not surfaced.
    async fn send_reaction(&self, chat_id: i64, message_id: i32, emoji: &str);

    /// One "typing…" chat action.
    async fn send_typing(&self, chat_id: i64);

    /// Raw bytes of a photo by file id, `None` when unavailable.
    async fn download_image(&self, file_id: &str) -> Option<Vec<u8>>;
}
