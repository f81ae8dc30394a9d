//! Error taxonomy for the greeting pipeline.
//!
//! Template and delivery errors never escape the dispatcher: they select a
//! rung of the fallback ladder. Verification errors are shown to the user
//! who clicked.

use thiserror::Error;

/// Rendering failure. A template either renders completely or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A brace sequence the substitution engine cannot interpret.
    #[error("malformed placeholder at byte {0}")]
    MalformedPlaceholder(usize),

    /// The substituted text is not valid Telegram HTML.
    #[error("malformed markup: {0}")]
    MalformedMarkup(String),
}

/// Outbound delivery failure, classified from the platform's description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("button has an invalid url")]
    InvalidButtonUrl,

    #[error("button uses an unsupported url protocol")]
    UnsupportedProtocol,

    #[error("message has a wrong url host")]
    BadUrlHost,

    #[error("message to reply to was not found")]
    ReplyTargetMissing,

    #[error("bot has no rights to send messages here")]
    PermissionDenied,

    #[error("bot is muted in this chat")]
    BotMuted,

    #[error("{0}")]
    Unspecified(String),
}

impl DeliveryError {
    /// Classify a Bot API error description.
    pub fn classify(description: &str) -> Self {
        let lower = description.to_lowercase();

        if lower.contains("button_url_invalid") {
            Self::InvalidButtonUrl
        } else if lower.contains("unsupported url protocol") {
            Self::UnsupportedProtocol
        } else if lower.contains("wrong url host") || lower.contains("wrong http url") {
            Self::BadUrlHost
        } else if lower.contains("reply message not found")
            || lower.contains("message to be replied not found")
            || lower.contains("message to reply not found")
        {
            Self::ReplyTargetMissing
        } else if lower.contains("have no rights to send a message")
            || lower.contains("bot is not a member")
            || lower.contains("bot was kicked")
        {
            Self::PermissionDenied
        } else if lower.contains("not enough rights to send")
            || lower.contains("chat_write_forbidden")
            || lower.contains("chat_restricted")
        {
            Self::BotMuted
        } else {
            Self::Unspecified(description.to_string())
        }
    }
}

impl From<teloxide::RequestError> for DeliveryError {
    fn from(err: teloxide::RequestError) -> Self {
        Self::classify(&err.to_string())
    }
}

/// Rejected verification click. No state changes accompany these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("this button is meant for someone else")]
    WrongUser,

    #[error("already verified")]
    AlreadyVerified,

    /// The bot lost its restrict right, so the mute cannot be lifted.
    #[error("bot cannot restrict members in this chat")]
    RestrictionUnavailable,

    #[error("could not lift restriction: {0}")]
    LiftFailed(String),
}
