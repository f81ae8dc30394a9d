//! Verification repository.
//!
//! Policies are cached like other settings. Pending records and timeouts
//! are always read from MongoDB: the clicked flag is flipped with a
//! conditional update so concurrent clicks race in the database, not here.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use mongodb::bson::doc;
use mongodb::options::{ReplaceOptions, UpdateOptions};
use mongodb::Collection;
use tracing::{debug, warn};

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::database::models::{PendingVerification, TimeoutEntry, VerificationPolicy};
use crate::database::Database;
use crate::greeting::VerificationStore;

/// Repository for welcome security state.
pub struct VerificationRepository {
    policies: Collection<VerificationPolicy>,
    pending: Collection<PendingVerification>,
    timeouts: Collection<TimeoutEntry>,
    cache: TypedCache<i64, VerificationPolicy>,
}

impl VerificationRepository {
    pub fn new(db: &Database, cache: &CacheRegistry) -> Self {
        let policy_cache = cache.get_or_create(
            "verification_policy",
            CacheConfig::with_capacity(2_000)
                .ttl(Duration::from_secs(300)),
        );

        Self {
            policies: db.collection("welcome_security"),
            pending: db.collection("pending_verifications"),
            timeouts: db.collection("verification_timeouts"),
            cache: policy_cache,
        }
    }
}

fn member_filter(chat_id: i64, user_id: u64) -> mongodb::bson::Document {
    doc! { "chat_id": chat_id, "user_id": user_id as i64 }
}

#[async_trait]
impl VerificationStore for VerificationRepository {
    async fn policy(&self, chat_id: i64) -> Result<VerificationPolicy> {
        if let Some(policy) = self.cache.get(&chat_id) {
            return Ok(policy);
        }

        let policy = self
            .policies
            .find_one(doc! { "chat_id": chat_id })
            .await?
            .unwrap_or_else(|| VerificationPolicy::new(chat_id));

        self.cache.insert(chat_id, policy.clone());
        Ok(policy)
    }

    async fn save_policy(&self, policy: &VerificationPolicy) -> Result<()> {
        let filter = doc! { "chat_id": policy.chat_id };
        let options = ReplaceOptions::builder()
            .upsert(true)
            .build();

        self.policies
            .replace_one(filter, policy)
            .with_options(options)
            .await?;

        self.cache.insert(policy.chat_id, policy.clone());
        debug!("Saved VerificationPolicy for chat {}", policy.chat_id);

        Ok(())
    }

    async fn pending(&self, chat_id: i64, user_id: u64) -> Result<Option<PendingVerification>> {
        Ok(self.pending.find_one(member_filter(chat_id, user_id)).await?)
    }

    async fn insert_pending(&self, chat_id: i64, user_id: u64) -> Result<()> {
        let update = doc! {
            "$setOnInsert": { "chat_id": chat_id, "user_id": user_id as i64, "clicked": false }
        };
        let options = UpdateOptions::builder().upsert(true).build();

        self.pending
            .update_one(member_filter(chat_id, user_id), update)
            .with_options(options)
            .await?;
        Ok(())
    }

    async fn try_mark_verified(&self, chat_id: i64, user_id: u64) -> Result<bool> {
        let mut filter = member_filter(chat_id, user_id);
        filter.insert("clicked", false);

        let previous = self
            .pending
            .find_one_and_update(filter, doc! { "$set": { "clicked": true } })
            .await?;
        Ok(previous.is_some())
    }

    async fn revert_verified(&self, chat_id: i64, user_id: u64) -> Result<()> {
        self.pending
            .update_one(
                member_filter(chat_id, user_id),
                doc! { "$set": { "clicked": false } },
            )
            .await?;
        Ok(())
    }

    async fn schedule_timeout(&self, entry: TimeoutEntry) -> Result<()> {
        let filter = member_filter(entry.chat_id, entry.user_id);
        let options = ReplaceOptions::builder()
            .upsert(true)
            .build();

        self.timeouts
            .replace_one(filter, &entry)
            .with_options(options)
            .await?;
        debug!(
            "Scheduled {:?} for user {} in chat {} at {}",
            entry.action, entry.user_id, entry.chat_id, entry.fire_at
        );
        Ok(())
    }

    async fn clear_timeout(&self, chat_id: i64, user_id: u64) -> Result<()> {
        self.timeouts.delete_one(member_filter(chat_id, user_id)).await?;
        Ok(())
    }

    async fn due_timeouts(&self, now: i64) -> Result<Vec<TimeoutEntry>> {
        let filter = doc! { "fire_at": { "$lte": now } };
        let mut cursor = self.timeouts.find(filter).await?;

        let mut entries = Vec::new();
        while let Some(result) = cursor.next().await {
            match result {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping unreadable timeout entry: {}", e),
            }
        }
        Ok(entries)
    }
}
