//! Greeting configuration model (welcome + goodbye) for its own collection.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::common::ButtonDef;
use crate::greeting::MediaKind;

/// What a greeting is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Text,
    ButtonText,
    Sticker,
    Document,
    Photo,
    Audio,
    Voice,
    Video,
}

impl ContentType {
    /// Text greetings go through the fallback dispatcher; media greetings
    /// are sent directly with a caption.
    pub fn is_text(self) -> bool {
        matches!(self, Self::Text | Self::ButtonText)
    }

    pub fn media_kind(self) -> MediaKind {
        match self {
            Self::Text | Self::ButtonText => MediaKind::Text,
            Self::Sticker => MediaKind::Sticker,
            Self::Document => MediaKind::Document,
            Self::Photo => MediaKind::Photo,
            Self::Audio => MediaKind::Audio,
            Self::Voice => MediaKind::Voice,
            Self::Video => MediaKind::Video,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::ButtonText => "text with buttons",
            Self::Sticker => "sticker",
            Self::Document => "document",
            Self::Photo => "photo",
            Self::Audio => "audio",
            Self::Voice => "voice",
            Self::Video => "video",
        }
    }
}

/// One greeting (welcome or goodbye).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingMessage {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Custom template; `None` uses the built-in default
    #[serde(default)]
    pub template: Option<String>,

    /// Media file id for non-text content
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub content_type: ContentType,

    #[serde(default)]
    pub buttons: Vec<Vec<ButtonDef>>,
}

fn default_enabled() -> bool {
    true
}

impl Default for GreetingMessage {
    fn default() -> Self {
        Self {
            enabled: true,
            template: None,
            content: None,
            content_type: ContentType::Text,
            buttons: Vec::new(),
        }
    }
}

impl GreetingMessage {
    /// Replace content, keeping the enabled flag.
    pub fn set_content(&mut self, captured: CapturedContent) {
        self.template = captured.text;
        self.content = captured.file_id;
        self.content_type = captured.content_type;
        self.buttons = captured.buttons;
    }

    /// Back to the built-in default, keeping the enabled flag.
    pub fn reset(&mut self) {
        *self = Self {
            enabled: self.enabled,
            ..Default::default()
        };
    }
}

/// Content captured from a `/setwelcome` or `/setgoodbye` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedContent {
    pub text: Option<String>,
    pub file_id: Option<String>,
    pub content_type: ContentType,
    pub buttons: Vec<Vec<ButtonDef>>,
}

/// Tracking of the last welcome so it can be removed when the next one goes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "message_id", rename_all = "snake_case")]
pub enum CleanWelcome {
    #[default]
    Disabled,
    /// Enabled, but nothing to delete yet
    Armed,
    /// Enabled; this message goes when the next welcome is sent
    Previous(i32),
}

impl CleanWelcome {
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Greeting configuration stored in its own collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingSettings {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Telegram chat ID (indexed)
    pub chat_id: i64,

    #[serde(default)]
    pub welcome: GreetingMessage,

    #[serde(default)]
    pub goodbye: GreetingMessage,

    /// Delete "x joined/left" service messages and stop replying to them
    #[serde(default)]
    pub clean_service: bool,

    #[serde(default)]
    pub clean_welcome: CleanWelcome,
}

impl GreetingSettings {
    /// Create new settings for a chat.
    pub fn new(chat_id: i64) -> Self {
        Self {
            id: None,
            chat_id,
            welcome: GreetingMessage::default(),
            goodbye: GreetingMessage::default(),
            clean_service: false,
            clean_welcome: CleanWelcome::Disabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_fields_are_missing() {
        let settings: GreetingSettings =
            serde_json::from_str(r#"{ "chat_id": -100 }"#).unwrap();
        assert!(settings.welcome.enabled);
        assert!(settings.goodbye.enabled);
        assert_eq!(settings.welcome.content_type, ContentType::Text);
        assert_eq!(settings.clean_welcome, CleanWelcome::Disabled);
    }

    #[test]
    fn test_clean_welcome_serde_shape() {
        let json = serde_json::to_string(&CleanWelcome::Previous(77)).unwrap();
        assert_eq!(json, r#"{"state":"previous","message_id":77}"#);
        let armed: CleanWelcome = serde_json::from_str(r#"{"state":"armed"}"#).unwrap();
        assert_eq!(armed, CleanWelcome::Armed);
    }

    #[test]
    fn test_reset_keeps_enabled_flag() {
        let mut msg = GreetingMessage {
            enabled: false,
            template: Some("Hi".to_string()),
            content: Some("file".to_string()),
            content_type: ContentType::Photo,
            buttons: vec![vec![ButtonDef::new("A", "a.com")]],
        };
        msg.reset();
        assert!(!msg.enabled);
        assert_eq!(msg.template, None);
        assert_eq!(msg.content_type, ContentType::Text);
        assert!(msg.buttons.is_empty());
    }
}
