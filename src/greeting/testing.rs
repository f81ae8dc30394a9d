//! In-memory fakes of the greeting seams, for tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::buttons::Keyboard;
use super::client::{ChatClient, MessageId, Outgoing, PermissionOracle};
use super::error::DeliveryError;
use super::store::{GreetingStore, VerificationStore};
use crate::database::{
    CleanWelcome, GreetingSettings, PendingVerification, TimeoutEntry, VerificationPolicy,
};

/// An edit the fake chat received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub chat_id: i64,
    pub message_id: MessageId,
    pub text: String,
    pub keyboard: Keyboard,
    pub caption: bool,
}

/// Records every call; failures are queued up front.
pub struct FakeChat {
    next_id: AtomicI32,
    sent: Mutex<Vec<Outgoing>>,
    send_failures: Mutex<VecDeque<DeliveryError>>,
    restrict_failure: Mutex<Option<DeliveryError>>,
    lift_failure: Mutex<Option<DeliveryError>>,
    restrictions: Mutex<Vec<(i64, u64, Option<DateTime<Utc>>)>>,
    lifts: Mutex<Vec<(i64, u64)>>,
    edits: Mutex<Vec<Edit>>,
    keyboard_edits: Mutex<Vec<(i64, MessageId, Keyboard)>>,
    deleted: Mutex<Vec<(i64, MessageId)>>,
    left: Mutex<Vec<i64>>,
}

impl Default for FakeChat {
    fn default() -> Self {
        Self {
            next_id: AtomicI32::new(100),
            sent: Mutex::default(),
            send_failures: Mutex::default(),
            restrict_failure: Mutex::default(),
            lift_failure: Mutex::default(),
            restrictions: Mutex::default(),
            lifts: Mutex::default(),
            edits: Mutex::default(),
            keyboard_edits: Mutex::default(),
            deleted: Mutex::default(),
            left: Mutex::default(),
        }
    }
}

impl FakeChat {
    /// Fail the next `send` with `err`. Calls queue up.
    pub fn fail_next(&self, err: DeliveryError) {
        self.send_failures.lock().unwrap().push_back(err);
    }

    pub fn fail_restrict(&self, err: DeliveryError) {
        *self.restrict_failure.lock().unwrap() = Some(err);
    }

    /// Fail the next `lift_restriction` with `err`.
    pub fn fail_lift(&self, err: DeliveryError) {
        *self.lift_failure.lock().unwrap() = Some(err);
    }

    pub fn sent(&self) -> Vec<Outgoing> {
        self.sent.lock().unwrap().clone()
    }

    pub fn restrictions(&self) -> Vec<(i64, u64, Option<DateTime<Utc>>)> {
        self.restrictions.lock().unwrap().clone()
    }

    pub fn lifts(&self) -> Vec<(i64, u64)> {
        self.lifts.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<Edit> {
        self.edits.lock().unwrap().clone()
    }

    pub fn keyboard_edits(&self) -> Vec<(i64, MessageId, Keyboard)> {
        self.keyboard_edits.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<(i64, MessageId)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn left(&self) -> Vec<i64> {
        self.left.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn send(&self, msg: Outgoing) -> Result<MessageId, DeliveryError> {
        if let Some(err) = self.send_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.sent.lock().unwrap().push(msg);
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn edit_text(
        &self,
        chat_id: i64,
        message_id: MessageId,
        text: String,
        keyboard: Keyboard,
    ) -> Result<(), DeliveryError> {
        self.edits.lock().unwrap().push(Edit {
            chat_id,
            message_id,
            text,
            keyboard,
            caption: false,
        });
        Ok(())
    }

    async fn edit_caption(
        &self,
        chat_id: i64,
        message_id: MessageId,
        caption: String,
        keyboard: Keyboard,
    ) -> Result<(), DeliveryError> {
        self.edits.lock().unwrap().push(Edit {
            chat_id,
            message_id,
            text: caption,
            keyboard,
            caption: true,
        });
        Ok(())
    }

    async fn edit_keyboard(
        &self,
        chat_id: i64,
        message_id: MessageId,
        keyboard: Keyboard,
    ) -> Result<(), DeliveryError> {
        self.keyboard_edits
            .lock()
            .unwrap()
            .push((chat_id, message_id, keyboard));
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: MessageId) -> Result<(), DeliveryError> {
        self.deleted.lock().unwrap().push((chat_id, message_id));
        Ok(())
    }

    async fn restrict_member(
        &self,
        chat_id: i64,
        user_id: u64,
        until: Option<DateTime<Utc>>,
    ) -> Result<(), DeliveryError> {
        if let Some(err) = self.restrict_failure.lock().unwrap().clone() {
            return Err(err);
        }
        self.restrictions.lock().unwrap().push((chat_id, user_id, until));
        Ok(())
    }

    async fn lift_restriction(&self, chat_id: i64, user_id: u64) -> Result<(), DeliveryError> {
        if let Some(err) = self.lift_failure.lock().unwrap().take() {
            return Err(err);
        }
        self.lifts.lock().unwrap().push((chat_id, user_id));
        Ok(())
    }

    async fn member_count(&self, _chat_id: i64) -> Result<u32, DeliveryError> {
        Ok(10)
    }

    async fn leave_chat(&self, chat_id: i64) -> Result<(), DeliveryError> {
        self.left.lock().unwrap().push(chat_id);
        Ok(())
    }
}

/// Admins and protected members by id.
pub struct FakeOracle {
    admins: Mutex<HashSet<u64>>,
    protected: Mutex<HashSet<u64>>,
    can_restrict: AtomicBool,
}

impl Default for FakeOracle {
    fn default() -> Self {
        Self {
            admins: Mutex::default(),
            protected: Mutex::default(),
            can_restrict: AtomicBool::new(true),
        }
    }
}

impl FakeOracle {
    pub fn admin(&self, user_id: u64) {
        self.admins.lock().unwrap().insert(user_id);
        self.protect(user_id);
    }

    pub fn protect(&self, user_id: u64) {
        self.protected.lock().unwrap().insert(user_id);
    }

    pub fn set_can_restrict(&self, value: bool) {
        self.can_restrict.store(value, Ordering::SeqCst);
    }
}

#[async_trait]
impl PermissionOracle for FakeOracle {
    async fn is_admin(&self, _chat_id: i64, user_id: u64) -> anyhow::Result<bool> {
        Ok(self.admins.lock().unwrap().contains(&user_id))
    }

    async fn is_ban_protected(&self, _chat_id: i64, user_id: u64) -> anyhow::Result<bool> {
        Ok(self.protected.lock().unwrap().contains(&user_id))
    }

    async fn bot_can_restrict(&self, _chat_id: i64) -> anyhow::Result<bool> {
        Ok(self.can_restrict.load(Ordering::SeqCst))
    }
}

#[derive(Default)]
pub struct FakeGreetingStore {
    settings: Mutex<HashMap<i64, GreetingSettings>>,
    whitelist: Mutex<HashSet<i64>>,
}

impl FakeGreetingStore {
    pub fn with_settings(settings: GreetingSettings) -> Self {
        let store = Self::default();
        store.settings.lock().unwrap().insert(settings.chat_id, settings);
        store
    }

    pub fn stored(&self, chat_id: i64) -> Option<GreetingSettings> {
        self.settings.lock().unwrap().get(&chat_id).cloned()
    }
}

#[async_trait]
impl GreetingStore for FakeGreetingStore {
    async fn settings(&self, chat_id: i64) -> anyhow::Result<GreetingSettings> {
        Ok(self
            .stored(chat_id)
            .unwrap_or_else(|| GreetingSettings::new(chat_id)))
    }

    async fn save_settings(&self, settings: &GreetingSettings) -> anyhow::Result<()> {
        self.settings
            .lock()
            .unwrap()
            .insert(settings.chat_id, settings.clone());
        Ok(())
    }

    async fn set_clean_welcome(&self, chat_id: i64, state: CleanWelcome) -> anyhow::Result<()> {
        self.settings
            .lock()
            .unwrap()
            .entry(chat_id)
            .or_insert_with(|| GreetingSettings::new(chat_id))
            .clean_welcome = state;
        Ok(())
    }

    async fn is_whitelisted(&self, chat_id: i64) -> anyhow::Result<bool> {
        Ok(self.whitelist.lock().unwrap().contains(&chat_id))
    }

    async fn set_whitelisted(&self, chat_id: i64, _added_by: u64, allowed: bool) -> anyhow::Result<bool> {
        let mut whitelist = self.whitelist.lock().unwrap();
        Ok(if allowed {
            whitelist.insert(chat_id)
        } else {
            whitelist.remove(&chat_id)
        })
    }
}

#[derive(Default)]
pub struct FakeVerificationStore {
    policies: Mutex<HashMap<i64, VerificationPolicy>>,
    pending: Mutex<HashMap<(i64, u64), PendingVerification>>,
    timeouts: Mutex<HashMap<(i64, u64), TimeoutEntry>>,
}

impl FakeVerificationStore {
    pub fn with_policy(policy: VerificationPolicy) -> Self {
        let store = Self::default();
        store.policies.lock().unwrap().insert(policy.chat_id, policy);
        store
    }

    pub fn pending_record(&self, chat_id: i64, user_id: u64) -> Option<PendingVerification> {
        self.pending.lock().unwrap().get(&(chat_id, user_id)).cloned()
    }

    pub fn timeouts(&self) -> Vec<TimeoutEntry> {
        self.timeouts.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl VerificationStore for FakeVerificationStore {
    async fn policy(&self, chat_id: i64) -> anyhow::Result<VerificationPolicy> {
        Ok(self
            .policies
            .lock()
            .unwrap()
            .get(&chat_id)
            .cloned()
            .unwrap_or_else(|| VerificationPolicy::new(chat_id)))
    }

    async fn save_policy(&self, policy: &VerificationPolicy) -> anyhow::Result<()> {
        self.policies
            .lock()
            .unwrap()
            .insert(policy.chat_id, policy.clone());
        Ok(())
    }

    async fn pending(&self, chat_id: i64, user_id: u64) -> anyhow::Result<Option<PendingVerification>> {
        Ok(self.pending_record(chat_id, user_id))
    }

    async fn insert_pending(&self, chat_id: i64, user_id: u64) -> anyhow::Result<()> {
        self.pending
            .lock()
            .unwrap()
            .entry((chat_id, user_id))
            .or_insert(PendingVerification {
                chat_id,
                user_id,
                clicked: false,
            });
        Ok(())
    }

    async fn try_mark_verified(&self, chat_id: i64, user_id: u64) -> anyhow::Result<bool> {
        let mut pending = self.pending.lock().unwrap();
        match pending.get_mut(&(chat_id, user_id)) {
            Some(record) if !record.clicked => {
                record.clicked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revert_verified(&self, chat_id: i64, user_id: u64) -> anyhow::Result<()> {
        if let Some(record) = self.pending.lock().unwrap().get_mut(&(chat_id, user_id)) {
            record.clicked = false;
        }
        Ok(())
    }

    async fn schedule_timeout(&self, entry: TimeoutEntry) -> anyhow::Result<()> {
        self.timeouts
            .lock()
            .unwrap()
            .insert((entry.chat_id, entry.user_id), entry);
        Ok(())
    }

    async fn clear_timeout(&self, chat_id: i64, user_id: u64) -> anyhow::Result<()> {
        self.timeouts.lock().unwrap().remove(&(chat_id, user_id));
        Ok(())
    }

    async fn due_timeouts(&self, now: i64) -> anyhow::Result<Vec<TimeoutEntry>> {
        Ok(self
            .timeouts
            .lock()
            .unwrap()
            .values()
            .filter(|entry| entry.fire_at <= now)
            .cloned()
            .collect())
    }
}
