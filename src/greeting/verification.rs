//! New-member verification gate.
//!
//! Per (chat, user) the gate moves NONE -> PENDING -> VERIFIED. Entering
//! PENDING mutes the member and hands back a control to attach to the
//! welcome. A click by the right member lifts the mute exactly once.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::buttons::KeyboardButton;
use super::client::{ChatClient, Member, PermissionOracle};
use super::error::VerificationError;
use super::store::VerificationStore;
use crate::database::{MuteDuration, TimeoutEntry, VerificationPolicy};
use crate::i18n;

/// Callback data prefix of the verification button.
pub const CALLBACK_PREFIX: &str = "verify:";

pub fn callback_data(user_id: u64) -> String {
    format!("{}{}", CALLBACK_PREFIX, user_id)
}

/// User id a verification button was minted for.
pub fn parse_callback(data: &str) -> Option<u64> {
    data.strip_prefix(CALLBACK_PREFIX)?.parse().ok()
}

/// Deep link used when the chat requires verifying in PM.
pub fn verify_link(bot_username: &str, chat_id: i64) -> String {
    format!("https://t.me/{}?start=verify_{}", bot_username, chat_id)
}

/// Verification gate shared by every chat.
pub struct VerificationGate {
    client: Arc<dyn ChatClient>,
    store: Arc<dyn VerificationStore>,
    oracle: Arc<dyn PermissionOracle>,
    /// Clicks being processed right now
    in_flight: DashMap<(i64, u64), ()>,
}

impl VerificationGate {
    pub fn new(
        client: Arc<dyn ChatClient>,
        store: Arc<dyn VerificationStore>,
        oracle: Arc<dyn PermissionOracle>,
    ) -> Self {
        Self {
            client,
            store,
            oracle,
            in_flight: DashMap::new(),
        }
    }

    /// Apply the chat's policy to a member who just joined.
    ///
    /// Returns the control to attach to the welcome, or `None` when the
    /// member does not have to verify.
    pub async fn on_join(
        &self,
        chat_id: i64,
        member: &Member,
        bot_username: &str,
        locale: &str,
    ) -> anyhow::Result<Option<KeyboardButton>> {
        let policy = self.store.policy(chat_id).await?;
        if !policy.enabled || member.is_bot {
            return Ok(None);
        }

        let protected = match self.oracle.is_ban_protected(chat_id, member.id).await {
            Ok(protected) => protected,
            Err(e) => {
                warn!("Protection check failed for {} in {}: {}", member.id, chat_id, e);
                false
            }
        };
        if protected {
            return Ok(None);
        }

        match self.store.pending(chat_id, member.id).await? {
            Some(record) => {
                // Rejoin: the record stays as is and no new mute is issued
                let enforceable = self.oracle.bot_can_restrict(chat_id).await.unwrap_or(false);
                if record.clicked || !enforceable {
                    return Ok(None);
                }
            }
            None => {
                let until = match policy.mute_duration {
                    MuteDuration::Forever => None,
                    MuteDuration::For(secs) => {
                        let until = mute_expiry(Utc::now(), secs);
                        if until.is_none() {
                            warn!("Mute of {}s out of range in chat {}, muting forever", secs, chat_id);
                        }
                        until
                    }
                };
                if let Err(e) = self.client.restrict_member(chat_id, member.id, until).await {
                    debug!("Could not mute {} in {}: {}", member.id, chat_id, e);
                }
                self.store.insert_pending(chat_id, member.id).await?;
                info!("User {} is pending verification in chat {}", member.id, chat_id);
            }
        }

        self.schedule_timeout(&policy, member.id).await;
        Ok(Some(control(&policy, member.id, bot_username, chat_id, locale)))
    }

    async fn schedule_timeout(&self, policy: &VerificationPolicy, user_id: u64) {
        if policy.timeout_secs == 0 {
            return;
        }

        let fire_at = i64::try_from(policy.timeout_secs)
            .ok()
            .and_then(|secs| Utc::now().timestamp().checked_add(secs));
        let Some(fire_at) = fire_at else {
            warn!(
                "Verification timeout of {}s out of range in chat {}",
                policy.timeout_secs, policy.chat_id
            );
            return;
        };

        let entry = TimeoutEntry {
            chat_id: policy.chat_id,
            user_id,
            fire_at,
            action: policy.timeout_action,
        };
        if let Err(e) = self.store.schedule_timeout(entry).await {
            warn!("Failed to schedule verification timeout: {}", e);
        }
    }

    /// Handle a press of the control minted for `target`.
    pub async fn on_click(
        &self,
        chat_id: i64,
        clicker: u64,
        target: u64,
    ) -> Result<(), VerificationError> {
        if clicker != target {
            return Err(VerificationError::WrongUser);
        }

        let Some(_guard) = InFlight::enter(&self.in_flight, (chat_id, target)) else {
            return Err(VerificationError::AlreadyVerified);
        };
        self.verify(chat_id, target).await
    }

    async fn verify(&self, chat_id: i64, user_id: u64) -> Result<(), VerificationError> {
        match self.store.try_mark_verified(chat_id, user_id).await {
            Ok(true) => {}
            Ok(false) => return Err(VerificationError::AlreadyVerified),
            Err(e) => return Err(VerificationError::LiftFailed(e.to_string())),
        }

        if let Err(e) = self.client.lift_restriction(chat_id, user_id).await {
            if let Err(revert) = self.store.revert_verified(chat_id, user_id).await {
                warn!("Failed to revert verification of {} in {}: {}", user_id, chat_id, revert);
            }
            return match self.oracle.bot_can_restrict(chat_id).await {
                Ok(true) => Err(VerificationError::LiftFailed(e.to_string())),
                _ => Err(VerificationError::RestrictionUnavailable),
            };
        }

        if let Err(e) = self.store.clear_timeout(chat_id, user_id).await {
            warn!("Failed to clear timeout of {} in {}: {}", user_id, chat_id, e);
        }
        info!("User {} verified in chat {}", user_id, chat_id);
        Ok(())
    }
}

/// Marks a (chat, user) click as in progress until dropped.
struct InFlight<'a> {
    map: &'a DashMap<(i64, u64), ()>,
    key: (i64, u64),
}

impl<'a> InFlight<'a> {
    fn enter(map: &'a DashMap<(i64, u64), ()>, key: (i64, u64)) -> Option<Self> {
        if map.insert(key, ()).is_some() {
            return None;
        }
        Some(Self { map, key })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

/// Absolute end of a timed mute, `None` when it does not fit a timestamp.
fn mute_expiry(now: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(secs).ok()?;
    now.checked_add_signed(TimeDelta::try_seconds(secs)?)
}

fn control(
    policy: &VerificationPolicy,
    user_id: u64,
    bot_username: &str,
    chat_id: i64,
    locale: &str,
) -> KeyboardButton {
    let label = policy
        .button_label
        .clone()
        .unwrap_or_else(|| i18n::get_text(locale, "verification.button"));

    if policy.require_external_verify_link {
        match url::Url::parse(&verify_link(bot_username, chat_id)) {
            Ok(url) => return KeyboardButton::url(label, url),
            Err(e) => warn!("Bad verify link for @{}: {}", bot_username, e),
        }
    }
    KeyboardButton::callback(label, callback_data(user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::greeting::buttons::ButtonTarget;
    use crate::greeting::testing::{FakeChat, FakeOracle, FakeVerificationStore};
    use crate::greeting::error::DeliveryError;

    const CHAT: i64 = -100;
    const BOT: &str = "gatekeeper_bot";

    fn member(id: u64) -> Member {
        Member {
            id,
            first_name: "Ann".to_string(),
            last_name: None,
            username: None,
            is_bot: false,
        }
    }

    fn enabled_policy() -> VerificationPolicy {
        VerificationPolicy {
            enabled: true,
            ..VerificationPolicy::new(CHAT)
        }
    }

    struct Harness {
        chat: Arc<FakeChat>,
        store: Arc<FakeVerificationStore>,
        oracle: Arc<FakeOracle>,
        gate: VerificationGate,
    }

    fn harness(policy: VerificationPolicy) -> Harness {
        let chat = Arc::new(FakeChat::default());
        let store = Arc::new(FakeVerificationStore::with_policy(policy));
        let oracle = Arc::new(FakeOracle::default());
        let gate = VerificationGate::new(chat.clone(), store.clone(), oracle.clone());
        Harness { chat, store, oracle, gate }
    }

    #[test]
    fn test_callback_data_round_trip() {
        assert_eq!(parse_callback(&callback_data(42)), Some(42));
        assert_eq!(parse_callback("verify:abc"), None);
        assert_eq!(parse_callback("other:42"), None);
    }

    #[tokio::test]
    async fn test_disabled_policy_leaves_member_alone() {
        let h = harness(VerificationPolicy::new(CHAT));
        let control = h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();

        assert!(control.is_none());
        assert!(h.chat.restrictions().is_empty());
        assert!(h.store.pending_record(CHAT, 1).is_none());
    }

    #[tokio::test]
    async fn test_forever_mute_on_join() {
        let h = harness(enabled_policy());
        let control = h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();

        let control = control.expect("control attached");
        assert_eq!(control.target, ButtonTarget::Callback("verify:1".to_string()));
        assert_eq!(h.chat.restrictions(), vec![(CHAT, 1, None)]);
        assert_eq!(h.store.pending_record(CHAT, 1).map(|r| r.clicked), Some(false));
        assert!(h.store.timeouts().is_empty());
    }

    #[tokio::test]
    async fn test_timed_mute_and_timeout() {
        let h = harness(VerificationPolicy {
            mute_duration: MuteDuration::For(3600),
            timeout_secs: 300,
            ..enabled_policy()
        });
        let before = Utc::now();
        h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();

        let restrictions = h.chat.restrictions();
        let until = restrictions[0].2.expect("expiry set");
        assert!(until >= before + TimeDelta::seconds(3600));

        let timeouts = h.store.timeouts();
        assert_eq!(timeouts.len(), 1);
        assert!(timeouts[0].fire_at >= before.timestamp() + 300);
    }

    #[tokio::test]
    async fn test_ban_protected_member_is_exempt() {
        let h = harness(enabled_policy());
        h.oracle.protect(7);

        let control = h.gate.on_join(CHAT, &member(7), BOT, "en").await.unwrap();
        assert!(control.is_none());
        assert!(h.store.pending_record(CHAT, 7).is_none());
        assert!(h.chat.restrictions().is_empty());
    }

    #[tokio::test]
    async fn test_failed_mute_still_attaches_control() {
        let h = harness(enabled_policy());
        h.chat.fail_restrict(DeliveryError::Unspecified("not enough rights".to_string()));

        let control = h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();
        assert!(control.is_some());
        assert!(h.store.pending_record(CHAT, 1).is_some());
    }

    #[tokio::test]
    async fn test_external_link_control() {
        let h = harness(VerificationPolicy {
            require_external_verify_link: true,
            button_label: Some("Prove it".to_string()),
            ..enabled_policy()
        });

        let control = h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap().unwrap();
        assert_eq!(control.label, "Prove it");
        assert_eq!(
            control.target,
            ButtonTarget::Url(url::Url::parse(&verify_link(BOT, CHAT)).unwrap())
        );
    }

    #[tokio::test]
    async fn test_rejoin_does_not_remute() {
        let h = harness(enabled_policy());
        h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();
        let control = h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();

        assert!(control.is_some());
        assert_eq!(h.chat.restrictions().len(), 1);

        h.oracle.set_can_restrict(false);
        let control = h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();
        assert!(control.is_none());
    }

    #[tokio::test]
    async fn test_double_click_lifts_once() {
        let h = harness(enabled_policy());
        h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();

        assert_eq!(h.gate.on_click(CHAT, 1, 1).await, Ok(()));
        assert_eq!(
            h.gate.on_click(CHAT, 1, 1).await,
            Err(VerificationError::AlreadyVerified)
        );
        assert_eq!(h.chat.lifts(), vec![(CHAT, 1)]);
        assert_eq!(h.store.pending_record(CHAT, 1).map(|r| r.clicked), Some(true));
    }

    #[tokio::test]
    async fn test_concurrent_clicks_lift_once() {
        let h = harness(enabled_policy());
        h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();

        let (a, b) = tokio::join!(h.gate.on_click(CHAT, 1, 1), h.gate.on_click(CHAT, 1, 1));
        assert!(a.is_ok() ^ b.is_ok());
        assert_eq!(h.chat.lifts().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_user_click_changes_nothing() {
        let h = harness(enabled_policy());
        h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();

        assert_eq!(
            h.gate.on_click(CHAT, 2, 1).await,
            Err(VerificationError::WrongUser)
        );
        assert!(h.chat.lifts().is_empty());
        assert_eq!(h.store.pending_record(CHAT, 1).map(|r| r.clicked), Some(false));
    }

    #[tokio::test]
    async fn test_lift_without_rights_is_reported_and_reverted() {
        let h = harness(enabled_policy());
        h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();
        h.chat.fail_lift(DeliveryError::Unspecified("not enough rights".to_string()));
        h.oracle.set_can_restrict(false);

        assert_eq!(
            h.gate.on_click(CHAT, 1, 1).await,
            Err(VerificationError::RestrictionUnavailable)
        );
        assert_eq!(h.store.pending_record(CHAT, 1).map(|r| r.clicked), Some(false));
    }

    #[tokio::test]
    async fn test_verification_clears_timeout() {
        let h = harness(VerificationPolicy {
            timeout_secs: 60,
            ..enabled_policy()
        });
        h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();
        assert_eq!(h.store.timeouts().len(), 1);

        h.gate.on_click(CHAT, 1, 1).await.unwrap();
        assert!(h.store.timeouts().is_empty());
    }

    #[test]
    fn test_mute_expiry_bounds() {
        let now = Utc::now();
        assert_eq!(mute_expiry(now, 60), Some(now + TimeDelta::seconds(60)));
        assert_eq!(mute_expiry(now, u64::MAX), None);
        assert_eq!(mute_expiry(now, i64::MAX as u64), None);
    }

    #[tokio::test]
    async fn test_out_of_range_durations_do_not_panic() {
        let h = harness(VerificationPolicy {
            mute_duration: MuteDuration::For(u64::MAX),
            timeout_secs: u64::MAX,
            ..enabled_policy()
        });

        let control = h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();
        assert!(control.is_some());
        assert_eq!(h.chat.restrictions(), vec![(CHAT, 1, None)]);
        assert!(h.store.timeouts().is_empty());
    }

    #[tokio::test]
    async fn test_huge_timeout_is_skipped() {
        let h = harness(VerificationPolicy {
            timeout_secs: i64::MAX as u64,
            ..enabled_policy()
        });

        h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();
        assert!(h.store.timeouts().is_empty());
        assert!(h.store.pending_record(CHAT, 1).is_some());
    }

    #[tokio::test]
    async fn test_click_releases_in_flight_marker() {
        let h = harness(enabled_policy());
        h.gate.on_join(CHAT, &member(1), BOT, "en").await.unwrap();
        h.chat.fail_lift(DeliveryError::Unspecified("flood".to_string()));

        assert!(matches!(
            h.gate.on_click(CHAT, 1, 1).await,
            Err(VerificationError::LiftFailed(_))
        ));
        assert!(h.gate.in_flight.is_empty());

        assert_eq!(h.gate.on_click(CHAT, 1, 1).await, Ok(()));
        assert!(h.gate.in_flight.is_empty());
        assert_eq!(h.chat.lifts(), vec![(CHAT, 1)]);
    }
}
