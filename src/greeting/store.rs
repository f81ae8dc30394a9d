//! Storage seams for greeting and verification state.

use async_trait::async_trait;

use crate::database::{
    CleanWelcome, GreetingSettings, PendingVerification, TimeoutEntry, VerificationPolicy,
};

/// Greeting configuration and the chat allow-list.
#[async_trait]
pub trait GreetingStore: Send + Sync {
    /// Settings for a chat, defaults if never configured.
    async fn settings(&self, chat_id: i64) -> anyhow::Result<GreetingSettings>;

    async fn save_settings(&self, settings: &GreetingSettings) -> anyhow::Result<()>;

    /// Update only the clean-welcome tracker.
    async fn set_clean_welcome(&self, chat_id: i64, state: CleanWelcome) -> anyhow::Result<()>;

    async fn is_whitelisted(&self, chat_id: i64) -> anyhow::Result<bool>;

    /// Add or remove a chat. Returns whether anything changed.
    async fn set_whitelisted(&self, chat_id: i64, added_by: u64, allowed: bool) -> anyhow::Result<bool>;
}

/// Verification policy, pending records and scheduled timeouts.
#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// Policy for a chat, disabled defaults if never configured.
    async fn policy(&self, chat_id: i64) -> anyhow::Result<VerificationPolicy>;

    async fn save_policy(&self, policy: &VerificationPolicy) -> anyhow::Result<()>;

    async fn pending(&self, chat_id: i64, user_id: u64) -> anyhow::Result<Option<PendingVerification>>;

    /// Insert an unclicked record unless one already exists.
    async fn insert_pending(&self, chat_id: i64, user_id: u64) -> anyhow::Result<()>;

    /// Flip `clicked` from false to true. Returns false if the record is
    /// missing or was already clicked; only one caller ever gets true.
    async fn try_mark_verified(&self, chat_id: i64, user_id: u64) -> anyhow::Result<bool>;

    /// Undo a mark whose follow-up failed.
    async fn revert_verified(&self, chat_id: i64, user_id: u64) -> anyhow::Result<()>;

    /// Replace any timeout already scheduled for this member.
    async fn schedule_timeout(&self, entry: TimeoutEntry) -> anyhow::Result<()>;

    async fn clear_timeout(&self, chat_id: i64, user_id: u64) -> anyhow::Result<()>;

    /// Timeouts with `fire_at <= now`.
    async fn due_timeouts(&self, now: i64) -> anyhow::Result<Vec<TimeoutEntry>>;
}
