//! Named in-memory caches built on Moka.
//!
//! Repositories keep per-chat settings here so join events rarely hit
//! MongoDB:
//!
//! ```rust,ignore
//! let cache = registry.get_or_create::<i64, GreetingSettings>(
//!     "greeting_settings",
//!     CacheConfig::with_capacity(2_000).ttl(Duration::from_secs(300)),
//! );
//! cache.insert(chat_id, settings);
//! ```

mod config;
mod registry;
mod typed;

pub use config::CacheConfig;
pub use registry::CacheRegistry;
pub use typed::TypedCache;
