//! Configuration module for the gatekeeper bot.
//!
//! Loads configuration from environment variables.

use std::env;

use anyhow::{Context, bail};
use serde::Deserialize;

use crate::i18n;

/// Bot running mode
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Polling,
    Webhook,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook_url: Option<String>,
    pub webhook_port: u16,
    pub webhook_secret: Option<String>,

    /// Bot username (without @) for deep link construction.
    /// Optional - will be fetched via getMe if not set.
    pub bot_username: Option<String>,

    /// Owner user IDs (comma-separated)
    /// Owners get their own greeting and manage the chat whitelist.
    pub owner_ids: Vec<u64>,

    /// Operator chat for "added to group" and whitelist notices
    pub log_chat_id: Option<i64>,

    /// Leave any group that is not whitelisted
    pub whitelist_only: bool,

    pub default_locale: String,

    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let bot_mode = match env::var("BOT_MODE")
            .unwrap_or_else(|_| "polling".to_string())
            .to_lowercase()
            .as_str()
        {
            "webhook" => BotMode::Webhook,
            _ => BotMode::Polling,
        };

        let webhook_url = non_empty("WEBHOOK_URL");

        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            bail!("WEBHOOK_URL must be set when BOT_MODE is webhook");
        }

        let webhook_port = match non_empty("WEBHOOK_PORT") {
            Some(port) => port.parse().context("WEBHOOK_PORT must be a port number")?,
            None => 8443,
        };

        let log_chat_id = non_empty("LOG_CHAT_ID")
            .map(|id| id.parse::<i64>())
            .transpose()
            .context("LOG_CHAT_ID must be a chat id")?;

        let default_locale = non_empty("DEFAULT_LOCALE").unwrap_or_else(|| "en".to_string());
        if !i18n::is_supported(&default_locale) {
            bail!("DEFAULT_LOCALE must be one of {:?}", i18n::SUPPORTED);
        }

        Ok(Self {
            bot_token: env::var("BOT_TOKEN").context("BOT_TOKEN must be set")?,
            bot_mode,
            webhook_url,
            webhook_port,
            webhook_secret: non_empty("WEBHOOK_SECRET"),
            bot_username: non_empty("BOT_USERNAME")
                .map(|s| s.trim_start_matches('@').to_string())
                .filter(|s| !s.is_empty()),
            owner_ids: parse_owner_ids(&env::var("OWNER_IDS").unwrap_or_default()),
            log_chat_id,
            whitelist_only: parse_flag(&env::var("WHITELIST_ONLY").unwrap_or_default()),
            default_locale,
            mongodb_uri: env::var("MONGODB_URI").context("MONGODB_URI must be set")?,
            mongodb_database: non_empty("MONGODB_DATABASE")
                .unwrap_or_else(|| "gatekeeper".to_string()),
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Comma-separated ids; junk entries are skipped.
fn parse_owner_ids(raw: &str) -> Vec<u64> {
    raw.split(',')
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
