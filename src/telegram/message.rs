//! Transport-independent view of an inbound message.
//!
//! The reaction pipeline never touches teloxide types directly — everything
//! it needs (sender identity, text/caption, reply linkage, the largest photo
//! variant) is projected into `Incoming` at the dispatcher boundary.

use teloxide::types::{Message, User};

#[derive(Debug, Clone)]
pub struct Sender {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl Sender {
    fn from_user(user: &User) -> Self {
        Self {
            id: user.id.0 as i64,
            is_bot: user.is_bot,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
        }
    }
}

/// The message this one replies to, reduced to what the prompt needs.
#[derive(Debug, Clone)]
pub struct ReplyRef {
    pub sender: Option<Sender>,
    pub text: Option<String>,
    pub photo_file_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Incoming {
    pub chat_id: i64,
    pub message_id: i32,
    pub sender: Sender,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub photo_file_id: Option<String>,
    pub reply_to: Option<ReplyRef>,
}

impl Incoming {
    /// Project a teloxide message. Returns `None` for service messages with
    /// no sender.
    pub fn from_telegram(msg: &Message) -> Option<Self> {
        let sender = msg.from.as_ref().map(Sender::from_user)?;

        let reply_to = msg.reply_to_message().map(|parent| ReplyRef {
            sender: parent.from.as_ref().map(Sender::from_user),
            text: parent
                .text()
                .or_else(|| parent.caption())
                .map(|t| t.to_string()),
            photo_file_id: largest_photo_id(parent),
        });

        Some(Self {
            chat_id: msg.chat.id.0,
            message_id: msg.id.0,
            sender,
            text: msg.text().map(|t| t.to_string()),
            caption: msg.caption().map(|t| t.to_string()),
            photo_file_id: largest_photo_id(msg),
            reply_to,
        })
    }

    /// The text to react to: caption takes precedence when both are present
    /// (image messages carry their ask in the caption).
    pub fn content_text(&self) -> Option<&str> {
        self.caption.as_deref().or(self.text.as_deref())
    }

    pub fn is_command(&self) -> bool {
        self.text.as_deref().map(|t| t.starts_with('/')).unwrap_or(false)
    }
}

/// Telegram sends several sizes per photo; the last is the largest.
fn largest_photo_id(msg: &Message) -> Option<String> {
    msg.photo()
        .and_then(|sizes| sizes.last())
        .map(|p| p.file.id.clone())
}
