//! `ChatClient` over the Telegram Bot API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::prelude::*;
use teloxide::types::{
    ChatPermissions, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, LinkPreviewOptions,
    MessageId as TgMessageId, ParseMode, ReplyParameters,
};

use super::buttons::{ButtonTarget, Keyboard};
use super::client::{ChatClient, MediaKind, MessageId, Outgoing};
use super::error::DeliveryError;
use crate::bot::ThrottledBot;

/// Telegram-backed chat client. Everything is sent as HTML.
#[derive(Clone)]
pub struct TelegramClient {
    bot: ThrottledBot,
}

impl TelegramClient {
    pub fn new(bot: ThrottledBot) -> Self {
        Self { bot }
    }
}

fn markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|btn| match &btn.target {
                    ButtonTarget::Url(url) => InlineKeyboardButton::url(&btn.label, url.clone()),
                    ButtonTarget::Callback(data) => InlineKeyboardButton::callback(&btn.label, data),
                })
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

fn no_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

/// Send rights given back after verification.
fn unmuted() -> ChatPermissions {
    ChatPermissions::SEND_MESSAGES
        | ChatPermissions::SEND_AUDIOS
        | ChatPermissions::SEND_DOCUMENTS
        | ChatPermissions::SEND_PHOTOS
        | ChatPermissions::SEND_VIDEOS
        | ChatPermissions::SEND_VIDEO_NOTES
        | ChatPermissions::SEND_VOICE_NOTES
        | ChatPermissions::SEND_OTHER_MESSAGES
        | ChatPermissions::ADD_WEB_PAGE_PREVIEWS
}

/// Captioned media share the same builder surface.
macro_rules! send_captioned {
    ($req:expr, $msg:expr) => {{
        let mut req = $req;
        if !$msg.text.is_empty() {
            req = req.caption(&$msg.text).parse_mode(ParseMode::Html);
        }
        if !$msg.keyboard.is_empty() {
            req = req.reply_markup(markup(&$msg.keyboard));
        }
        if let Some(reply_to) = $msg.reply_to {
            req = req.reply_parameters(ReplyParameters::new(TgMessageId(reply_to)));
        }
        req.await?.id.0
    }};
}

#[async_trait]
impl ChatClient for TelegramClient {
    async fn send(&self, msg: Outgoing) -> Result<MessageId, DeliveryError> {
        let chat_id = ChatId(msg.chat_id);
        let file = msg.file_id.clone().map(InputFile::file_id);

        let id = match (msg.kind, file) {
            (MediaKind::Photo, Some(file)) => send_captioned!(self.bot.send_photo(chat_id, file), msg),
            (MediaKind::Document, Some(file)) => {
                send_captioned!(self.bot.send_document(chat_id, file), msg)
            }
            (MediaKind::Audio, Some(file)) => send_captioned!(self.bot.send_audio(chat_id, file), msg),
            (MediaKind::Voice, Some(file)) => send_captioned!(self.bot.send_voice(chat_id, file), msg),
            (MediaKind::Video, Some(file)) => send_captioned!(self.bot.send_video(chat_id, file), msg),
            (MediaKind::Sticker, Some(file)) => {
                let mut req = self.bot.send_sticker(chat_id, file);
                if !msg.keyboard.is_empty() {
                    req = req.reply_markup(markup(&msg.keyboard));
                }
                if let Some(reply_to) = msg.reply_to {
                    req = req.reply_parameters(ReplyParameters::new(TgMessageId(reply_to)));
                }
                req.await?.id.0
            }
            _ => {
                let mut req = self
                    .bot
                    .send_message(chat_id, &msg.text)
                    .parse_mode(ParseMode::Html)
                    .link_preview_options(no_preview());
                if !msg.keyboard.is_empty() {
                    req = req.reply_markup(markup(&msg.keyboard));
                }
                if let Some(reply_to) = msg.reply_to {
                    req = req.reply_parameters(ReplyParameters::new(TgMessageId(reply_to)));
                }
                req.await?.id.0
            }
        };

        Ok(id)
    }

    async fn edit_text(
        &self,
        chat_id: i64,
        message_id: MessageId,
        text: String,
        keyboard: Keyboard,
    ) -> Result<(), DeliveryError> {
        self.bot
            .edit_message_text(ChatId(chat_id), TgMessageId(message_id), text)
            .parse_mode(ParseMode::Html)
            .link_preview_options(no_preview())
            .reply_markup(markup(&keyboard))
            .await?;
        Ok(())
    }

    async fn edit_caption(
        &self,
        chat_id: i64,
        message_id: MessageId,
        caption: String,
        keyboard: Keyboard,
    ) -> Result<(), DeliveryError> {
        self.bot
            .edit_message_caption(ChatId(chat_id), TgMessageId(message_id))
            .caption(caption)
            .parse_mode(ParseMode::Html)
            .reply_markup(markup(&keyboard))
            .await?;
        Ok(())
    }

    async fn edit_keyboard(
        &self,
        chat_id: i64,
        message_id: MessageId,
        keyboard: Keyboard,
    ) -> Result<(), DeliveryError> {
        self.bot
            .edit_message_reply_markup(ChatId(chat_id), TgMessageId(message_id))
            .reply_markup(markup(&keyboard))
            .await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: MessageId) -> Result<(), DeliveryError> {
        self.bot
            .delete_message(ChatId(chat_id), TgMessageId(message_id))
            .await?;
        Ok(())
    }

    async fn restrict_member(
        &self,
        chat_id: i64,
        user_id: u64,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), DeliveryError> {
        // No rights = muted
        let req = self
            .bot
            .restrict_chat_member(ChatId(chat_id), UserId(user_id), ChatPermissions::empty());
        let req = if let Some(dt) = until {
            req.until_date(dt)
        } else {
            req
        };
        req.await?;
        Ok(())
    }

    async fn lift_restriction(&self, chat_id: i64, user_id: u64) -> Result<(), DeliveryError> {
        self.bot
            .restrict_chat_member(ChatId(chat_id), UserId(user_id), unmuted())
            .await?;
        Ok(())
    }

    async fn member_count(&self, chat_id: i64) -> Result<u32, DeliveryError> {
        Ok(self.bot.get_chat_member_count(ChatId(chat_id)).await?)
    }

    async fn leave_chat(&self, chat_id: i64) -> Result<(), DeliveryError> {
        self.bot.leave_chat(ChatId(chat_id)).await?;
        Ok(())
    }
}
