//! Chat platform seam.
//!
//! The greeting pipeline talks to the platform only through `ChatClient`,
//! so the flows can run against Telegram or an in-memory fake.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::buttons::Keyboard;
use super::error::DeliveryError;

/// Platform message id.
pub type MessageId = i32;

/// A chat member as the greeting flows see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: u64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub is_bot: bool,
}

impl From<&teloxide::types::User> for Member {
    fn from(user: &teloxide::types::User) -> Self {
        Self {
            id: user.id.0,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            is_bot: user.is_bot,
        }
    }
}

/// How a message is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Text,
    Sticker,
    Document,
    Photo,
    Audio,
    Voice,
    Video,
}

impl MediaKind {
    /// Whether the platform lets this kind carry a caption.
    pub fn takes_caption(self) -> bool {
        !matches!(self, Self::Sticker)
    }
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub chat_id: i64,
    pub kind: MediaKind,
    /// Platform file handle; unused for `MediaKind::Text`.
    pub file_id: Option<String>,
    /// Body for text, caption for media.
    pub text: String,
    pub keyboard: Keyboard,
    pub reply_to: Option<MessageId>,
}

impl Outgoing {
    /// Plain HTML text message.
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            kind: MediaKind::Text,
            file_id: None,
            text: text.into(),
            keyboard: Keyboard::default(),
            reply_to: None,
        }
    }

    /// Media message with caption.
    pub fn media(chat_id: i64, kind: MediaKind, file_id: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            chat_id,
            kind,
            file_id: Some(file_id.into()),
            text: caption.into(),
            keyboard: Keyboard::default(),
            reply_to: None,
        }
    }

    #[must_use]
    pub fn keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = keyboard;
        self
    }

    #[must_use]
    pub fn reply_to(mut self, reply_to: Option<MessageId>) -> Self {
        self.reply_to = reply_to;
        self
    }
}

/// Outbound operations the greeting flows need.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send any kind of message. Returns the new message id.
    async fn send(&self, msg: Outgoing) -> Result<MessageId, DeliveryError>;

    async fn edit_text(
        &self,
        chat_id: i64,
        message_id: MessageId,
        text: String,
        keyboard: Keyboard,
    ) -> Result<(), DeliveryError>;

    async fn edit_caption(
        &self,
        chat_id: i64,
        message_id: MessageId,
        caption: String,
        keyboard: Keyboard,
    ) -> Result<(), DeliveryError>;

    /// Replace only the inline keyboard, for media without a caption.
    async fn edit_keyboard(
        &self,
        chat_id: i64,
        message_id: MessageId,
        keyboard: Keyboard,
    ) -> Result<(), DeliveryError>;

    async fn delete_message(&self, chat_id: i64, message_id: MessageId) -> Result<(), DeliveryError>;

    /// Take away send rights. `None` means until lifted.
    async fn restrict_member(
        &self,
        chat_id: i64,
        user_id: u64,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), DeliveryError>;

    /// Grant messaging, media and link-preview rights back.
    async fn lift_restriction(&self, chat_id: i64, user_id: u64) -> Result<(), DeliveryError>;

    async fn member_count(&self, chat_id: i64) -> Result<u32, DeliveryError>;

    async fn leave_chat(&self, chat_id: i64) -> Result<(), DeliveryError>;
}

/// Admin and protection checks.
#[async_trait]
pub trait PermissionOracle: Send + Sync {
    async fn is_admin(&self, chat_id: i64, user_id: u64) -> anyhow::Result<bool>;

    /// Members that verification never applies to.
    async fn is_ban_protected(&self, chat_id: i64, user_id: u64) -> anyhow::Result<bool>;

    async fn bot_can_restrict(&self, chat_id: i64) -> anyhow::Result<bool>;
}
