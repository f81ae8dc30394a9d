//! Gatekeeper - welcome, goodbye and new-member verification for Telegram
//! groups.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - MongoDB integration
//! - `cache` - LRU-based caching with Moka
//! - `permissions` - Admin checking with caching
//! - `greeting` - Greeting rendering, delivery and the verification gate
//! - `bot` - Core bot functionality (with Throttle for API rate limiting)
//! - `plugins` - Command handlers
//! - `events` - Join/leave service message handlers
//! - `i18n` - Localized texts
//! - `utils` - Utility functions

mod bot;
mod cache;
mod config;
mod database;
mod events;
mod greeting;
mod i18n;
mod permissions;
mod plugins;
mod utils;

use std::sync::Arc;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cache::CacheRegistry;
use config::Config;
use database::Database;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gatekeeper=info,teloxide=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting Gatekeeper bot...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");
    info!("Bot mode: {:?}, locale: {}", config.bot_mode, config.default_locale);

    i18n::init();

    info!("Connecting to MongoDB...");
    let db = Arc::new(Database::connect(&config.mongodb_uri, &config.mongodb_database).await?);
    info!("Database connected");

    let cache = Arc::new(CacheRegistry::new());

    // Throttle respects Telegram's rate limits:
    // - 30 messages per second globally
    // - 1 message per second to the same chat
    // - 20 messages per minute to the same group
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());

    let me = bot.get_me().await?;
    let bot_username = config
        .bot_username
        .clone()
        .unwrap_or_else(|| me.username().to_string());
    info!("Using bot username: @{}", bot_username);

    if config.owner_ids.is_empty() {
        info!("No owner IDs configured (OWNER_IDS is empty)");
    } else {
        info!("Bot owners: {:?}", config.owner_ids);
    }
    if config.whitelist_only {
        info!("Whitelist mode: leaving chats that are not whitelisted");
    }

    let dispatcher =
        bot::build_dispatcher(bot.clone(), db, cache, &config, me.id, bot_username);

    bot::run(&config, bot, dispatcher).await
}
