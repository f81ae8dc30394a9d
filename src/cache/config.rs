//! Per-cache sizing and expiry.

use std::time::Duration;

/// Capacity and expiry of one named cache.
///
/// Chat settings change rarely and are re-read after `ttl`; admin lookups
/// also expire after `tti` without use.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub max_capacity: u64,
    pub ttl: Option<Duration>,
    pub tti: Option<Duration>,
}

impl CacheConfig {
    /// `max_capacity` entries, five minute TTL.
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ttl: Some(Duration::from_secs(300)),
            tti: None,
        }
    }

    #[must_use]
    pub fn ttl(self, ttl: Duration) -> Self {
        Self { ttl: Some(ttl), ..self }
    }

    #[must_use]
    pub fn tti(self, tti: Duration) -> Self {
        Self { tti: Some(tti), ..self }
    }
}
