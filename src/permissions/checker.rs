//! Permission checker with caching.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, ChatMember, ChatMemberKind, UserId};
use tracing::debug;

use crate::cache::{CacheConfig, CacheRegistry, TypedCache};
use crate::greeting::PermissionOracle;

/// Cached admin information.
#[derive(Clone, Debug)]
pub struct AdminInfo {
    pub can_restrict_members: bool,
}

impl AdminInfo {
    /// Create AdminInfo from a ChatMember.
    fn from_chat_member(member: &ChatMember) -> Option<Self> {
        match &member.kind {
            ChatMemberKind::Owner(_) => Some(Self {
                can_restrict_members: true,
            }),
            ChatMemberKind::Administrator(admin) => Some(Self {
                can_restrict_members: admin.can_restrict_members,
            }),
            _ => None,
        }
    }
}

/// Cache key for admin lookups.
type AdminCacheKey = (i64, u64); // (chat_id, user_id)

/// Permission checker with caching support.
///
/// Bot owners (from OWNER_IDS env) pass every admin check.
#[derive(Clone)]
pub struct Permissions {
    bot: Bot,
    bot_id: UserId,
    cache: TypedCache<AdminCacheKey, Option<AdminInfo>>,
    owner_ids: Vec<u64>,
}

impl Permissions {
    pub fn with_owners(
        bot: Bot,
        bot_id: UserId,
        cache_registry: Arc<CacheRegistry>,
        owner_ids: Vec<u64>,
    ) -> Self {
        let cache = cache_registry.get_or_create(
            "admin_permissions",
            CacheConfig::with_capacity(10_000)
                .ttl(Duration::from_secs(300)) // 5 minutes
                .tti(Duration::from_secs(120)), // 2 minutes idle
        );

        Self {
            bot,
            bot_id,
            cache,
            owner_ids,
        }
    }

    #[inline]
    pub fn is_bot_owner(&self, user_id: UserId) -> bool {
        self.owner_ids.contains(&user_id.0)
    }

    /// Get admin info for a user in a chat.
    ///
    /// Returns `None` if the user is not an admin.
    pub async fn get_admin_info(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> anyhow::Result<Option<AdminInfo>> {
        let cache_key = (chat_id.0, user_id.0);

        if let Some(cached) = self.cache.get(&cache_key) {
            debug!("Admin cache hit for user {} in chat {}", user_id, chat_id);
            return Ok(cached);
        }

        debug!("Admin cache miss for user {} in chat {}", user_id, chat_id);

        let member = self.bot.get_chat_member(chat_id, user_id).await?;
        let result = AdminInfo::from_chat_member(&member);

        // Cache the result (including None for non-admins)
        self.cache.insert(cache_key, result.clone());

        Ok(result)
    }

    /// Check if a user is an admin (including owner).
    /// Bot owners always return true.
    pub async fn is_admin(&self, chat_id: ChatId, user_id: UserId) -> anyhow::Result<bool> {
        if self.is_bot_owner(user_id) {
            return Ok(true);
        }
        Ok(self.get_admin_info(chat_id, user_id).await?.is_some())
    }

    /// Whether the bot itself holds the restrict right.
    pub async fn bot_can_restrict(&self, chat_id: ChatId) -> anyhow::Result<bool> {
        Ok(self
            .get_admin_info(chat_id, self.bot_id)
            .await?
            .is_some_and(|a| a.can_restrict_members))
    }
}

#[async_trait]
impl PermissionOracle for Permissions {
    async fn is_admin(&self, chat_id: i64, user_id: u64) -> anyhow::Result<bool> {
        Permissions::is_admin(self, ChatId(chat_id), UserId(user_id)).await
    }

    /// Admins and bot owners are never muted on join.
    async fn is_ban_protected(&self, chat_id: i64, user_id: u64) -> anyhow::Result<bool> {
        Permissions::is_admin(self, ChatId(chat_id), UserId(user_id)).await
    }

    async fn bot_can_restrict(&self, chat_id: i64) -> anyhow::Result<bool> {
        Permissions::bot_can_restrict(self, ChatId(chat_id)).await
    }
}
