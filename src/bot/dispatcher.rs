//! Message dispatcher setup.
//!
//! Builds the dispatcher with all command handlers and event handlers.

use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;

use crate::cache::CacheRegistry;
use crate::config::Config;
use crate::database::{Database, GreetingRepository, VerificationRepository};
use crate::events;
use crate::greeting::{Greeter, GreeterConfig, TelegramClient};
use crate::permissions::Permissions;
use crate::plugins;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Join, leave and verification flows.
    pub greeter: Arc<Greeter>,

    /// Greeting settings and chat whitelist.
    pub greetings: Arc<GreetingRepository>,

    /// Verification policies, pending members and timeouts.
    pub verifications: Arc<VerificationRepository>,

    /// Permission checker with admin caching.
    pub permissions: Permissions,

    /// Owner user IDs.
    pub owner_ids: Vec<u64>,

    /// Bot username (without @) for deep link construction.
    pub bot_username: String,

    /// Locale for every reply.
    pub locale: String,
}

impl AppState {
    pub fn new(
        bot: ThrottledBot,
        db: Arc<Database>,
        cache: Arc<CacheRegistry>,
        config: &Config,
        me: UserId,
        bot_username: String,
    ) -> Self {
        // Note: Permissions needs the inner Bot for API calls
        let permissions = Permissions::with_owners(
            bot.inner().clone(),
            me,
            cache.clone(),
            config.owner_ids.clone(),
        );

        let greetings = Arc::new(GreetingRepository::new(&db, &cache));
        let verifications = Arc::new(VerificationRepository::new(&db, &cache));

        let greeter = Arc::new(Greeter::new(
            Arc::new(TelegramClient::new(bot)),
            greetings.clone(),
            verifications.clone(),
            Arc::new(permissions.clone()),
            GreeterConfig {
                bot_id: me.0,
                bot_username: bot_username.clone(),
                owner_ids: config.owner_ids.clone(),
                log_chat: config.log_chat_id,
                locale: config.default_locale.clone(),
                whitelist_only: config.whitelist_only,
            },
        ));

        Self {
            greeter,
            greetings,
            verifications,
            permissions,
            owner_ids: config.owner_ids.clone(),
            bot_username,
            locale: config.default_locale.clone(),
        }
    }

    /// Check if a user is a bot owner.
    pub fn is_owner(&self, user_id: u64) -> bool {
        self.owner_ids.contains(&user_id)
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(
    bot: ThrottledBot,
    db: Arc<Database>,
    cache: Arc<CacheRegistry>,
    config: &Config,
    me: UserId,
    bot_username: String,
) -> Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey> {
    let state = AppState::new(bot.clone(), db, cache, config, me, bot_username);

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    // Commands first, then join/leave service messages
    let message_handler = Update::filter_message()
        .branch(plugins::command_handler())
        .branch(events::message_event_handler());

    dptree::entry()
        .branch(message_handler)
        .branch(plugins::callback_handler())
}
