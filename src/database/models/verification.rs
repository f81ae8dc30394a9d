//! New-member verification models.

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// How long a new member stays muted while unverified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "secs", rename_all = "snake_case")]
pub enum MuteDuration {
    /// Until the member presses the button
    #[default]
    Forever,
    For(u64),
}

/// What the external scheduler does when verification times out.
///
/// Stored and shown, never enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutAction {
    #[default]
    Kick,
    Ban,
}

/// Per-chat verification policy ("welcome security").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationPolicy {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub chat_id: i64,

    #[serde(default)]
    pub enabled: bool,

    /// Send members to the bot's PM instead of a callback button
    #[serde(default)]
    pub require_external_verify_link: bool,

    #[serde(default)]
    pub mute_duration: MuteDuration,

    /// 0 disables the timeout
    #[serde(default)]
    pub timeout_secs: u64,

    #[serde(default)]
    pub timeout_action: TimeoutAction,

    /// Custom button label; `None` uses the localized default
    #[serde(default)]
    pub button_label: Option<String>,
}

impl VerificationPolicy {
    pub fn new(chat_id: i64) -> Self {
        Self {
            id: None,
            chat_id,
            enabled: false,
            require_external_verify_link: false,
            mute_duration: MuteDuration::Forever,
            timeout_secs: 0,
            timeout_action: TimeoutAction::Kick,
            button_label: None,
        }
    }
}

/// A member who joined under an active policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingVerification {
    pub chat_id: i64,
    pub user_id: u64,
    #[serde(default)]
    pub clicked: bool,
}

/// Scheduled release for an unverified member. Consumed by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutEntry {
    pub chat_id: i64,
    pub user_id: u64,
    /// Unix seconds
    pub fire_at: i64,
    #[serde(default)]
    pub action: TimeoutAction,
}
