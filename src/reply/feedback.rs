//! "Still working" feedback: a typing-action loop plus a couple of courtesy
//! stall messages while generation runs. Scoped cancellation — dropping the
//! guard aborts both tasks, no manual cleanup tracking.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::history::ChatHistoryStore;
use crate::telegram::Transport;

const TYPING_REFRESH_SECS: u64 = 4;
const FIRST_STALL_SECS: u64 = 5;

pub struct WorkingIndicator {
    handles: Vec<JoinHandle<()>>,
}

impl WorkingIndicator {
    pub fn start(
        transport: Arc<dyn Transport>,
        history: Arc<ChatHistoryStore>,
        chat_id: i64,
        username: Option<String>,
        persona: String,
    ) -> Self {
        let mut handles = Vec::new();

        let typing_transport = transport.clone();
        handles.push(tokio::spawn(async move {
            loop {
                typing_transport.send_typing(chat_id).await;
                tokio::time::sleep(Duration::from_secs(TYPING_REFRESH_SECS)).await;
            }
        }));

        // Stall messages only make sense when there is someone to address.
        if let Some(user) = username {
            handles.push(tokio::spawn(async move {
                let mut wait = FIRST_STALL_SECS;
                for text in [
                    format!("@{} already on it", user),
                    format!("@{} just a minute", user),
                ] {
                    let jitter = (rand::random::<f64>() * wait as f64 / 5.0) as u64;
                    tokio::time::sleep(Duration::from_secs(wait + jitter)).await;

                    // Stalls are part of the conversation — log them too.
                    if let Err(e) = history.append_bot(chat_id, &persona, &text) {
                        warn!("failed to log stall message: {}", e);
                    }
                    if let Err(e) = transport.send_text(chat_id, &text, None).await {
                        warn!("failed to send stall message: {}", e);
                    }
                    wait *= 2;
                }
            }));
        }

        Self { handles }
    }
}

impl Drop for WorkingIndicator {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
