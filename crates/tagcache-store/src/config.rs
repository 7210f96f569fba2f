//! Cache configuration.
//!
//! This module provides configuration for the Redis connection and cache
//! defaults loaded from environment variables.

use std::env;
use std::time::Duration;

/// Cache configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `REDIS_URL`: Redis connection URL (default: `redis://127.0.0.1:6379`)
/// - `CACHE_TTL_SECONDS`: Default TTL for cached items in seconds (default: `300`)
/// - `CACHE_AUTO_RENEW`: Renew entries close to expiry on read (default: `true`)
/// - `CACHE_PREFIX`: Prefix for all Redis keys (default: `tagcache`)
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Redis connection URL.
    pub redis_url: String,

    /// Default time-to-live for cached items in seconds. Zero means the
    /// five minute default.
    pub default_ttl_seconds: u64,

    /// Whether reads renew entries that are about to expire.
    pub auto_renew: bool,

    /// Prefix for all Redis keys to avoid collisions.
    pub key_prefix: String,
}

impl CacheConfig {
    /// Load configuration from environment variables.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            default_ttl_seconds: env::var("CACHE_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_ttl_seconds),
            auto_renew: env::var("CACHE_AUTO_RENEW")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.auto_renew),
            key_prefix: env::var("CACHE_PREFIX").unwrap_or(defaults.key_prefix),
        }
    }

    /// Default TTL as a duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".into(),
            default_ttl_seconds: 300,
            auto_renew: true,
            key_prefix: "tagcache".into(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
