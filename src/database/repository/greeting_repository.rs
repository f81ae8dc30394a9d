//! Greeting settings repository with lazy loading.
//!
//! Low TTL (5min) since join/leave events are rare. The allow-list lives
//! here too since only the greeting flows and the owner commands read it.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use mongodb::bson::{doc, to_bson};
use mongodb::options::{ReplaceOptions, UpdateOptions};
use mongodb::Collection;
use tracing::debug;

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::database::models::{CleanWelcome, GreetingSettings, WhitelistedChat};
use crate::database::Database;
use crate::greeting::GreetingStore;

/// Repository for greeting settings and whitelisted chats.
pub struct GreetingRepository {
    collection: Collection<GreetingSettings>,
    whitelist: Collection<WhitelistedChat>,
    cache: TypedCache<i64, GreetingSettings>,
    whitelist_cache: TypedCache<i64, bool>,
}

impl GreetingRepository {
    pub fn new(db: &Database, cache: &CacheRegistry) -> Self {
        let settings_cache = cache.get_or_create(
            "greeting_settings",
            CacheConfig::with_capacity(2_000)
                .ttl(Duration::from_secs(300)), // 5 minutes (lazy load)
        );
        let whitelist_cache = cache.get_or_create(
            "chat_whitelist",
            CacheConfig::with_capacity(5_000)
                .ttl(Duration::from_secs(3600)),
        );

        Self {
            collection: db.collection("greetings"),
            whitelist: db.collection("chat_whitelist"),
            cache: settings_cache,
            whitelist_cache,
        }
    }

    /// Get greeting settings, returning None if not configured.
    pub async fn get(&self, chat_id: i64) -> Result<Option<GreetingSettings>> {
        if let Some(settings) = self.cache.get(&chat_id) {
            return Ok(Some(settings));
        }

        let filter = doc! { "chat_id": chat_id };
        let result = self.collection.find_one(filter).await?;

        if let Some(s) = &result {
            self.cache.insert(chat_id, s.clone());
        }

        Ok(result)
    }

    /// Save greeting settings (upsert).
    pub async fn save(&self, settings: &GreetingSettings) -> Result<()> {
        let filter = doc! { "chat_id": settings.chat_id };
        let options = ReplaceOptions::builder()
            .upsert(true)
            .build();

        self.collection
            .replace_one(filter, settings)
            .with_options(options)
            .await?;

        self.cache.insert(settings.chat_id, settings.clone());
        debug!("Saved GreetingSettings for chat {}", settings.chat_id);

        Ok(())
    }
}

#[async_trait]
impl GreetingStore for GreetingRepository {
    async fn settings(&self, chat_id: i64) -> Result<GreetingSettings> {
        Ok(self
            .get(chat_id)
            .await?
            .unwrap_or_else(|| GreetingSettings::new(chat_id)))
    }

    async fn save_settings(&self, settings: &GreetingSettings) -> Result<()> {
        self.save(settings).await
    }

    async fn set_clean_welcome(&self, chat_id: i64, state: CleanWelcome) -> Result<()> {
        let filter = doc! { "chat_id": chat_id };
        let update = doc! { "$set": { "clean_welcome": to_bson(&state)? } };

        let result = self.collection.update_one(filter, update).await?;
        if result.matched_count == 0 {
            // Never saved before; write the whole document
            let mut settings = GreetingSettings::new(chat_id);
            settings.clean_welcome = state;
            return self.save(&settings).await;
        }

        if let Some(mut cached) = self.cache.get(&chat_id) {
            cached.clean_welcome = state;
            self.cache.insert(chat_id, cached);
        }
        Ok(())
    }

    async fn is_whitelisted(&self, chat_id: i64) -> Result<bool> {
        if let Some(allowed) = self.whitelist_cache.get(&chat_id) {
            return Ok(allowed);
        }

        let allowed = self
            .whitelist
            .find_one(doc! { "chat_id": chat_id })
            .await?
            .is_some();
        self.whitelist_cache.insert(chat_id, allowed);
        Ok(allowed)
    }

    async fn set_whitelisted(&self, chat_id: i64, added_by: u64, allowed: bool) -> Result<bool> {
        let filter = doc! { "chat_id": chat_id };

        let changed = if allowed {
            let entry = WhitelistedChat {
                chat_id,
                added_by,
                added_at: chrono::Utc::now().timestamp(),
            };
            let update = doc! { "$setOnInsert": to_bson(&entry)? };
            let options = UpdateOptions::builder().upsert(true).build();
            let result = self
                .whitelist
                .update_one(filter, update)
                .with_options(options)
                .await?;
            result.upserted_id.is_some()
        } else {
            self.whitelist.delete_one(filter).await?.deleted_count > 0
        };

        self.whitelist_cache.insert(chat_id, allowed);
        debug!("Whitelist for chat {} set to {} (changed: {})", chat_id, allowed, changed);
        Ok(changed)
    }
}
