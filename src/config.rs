//! Query cache configuration.

use std::time::Duration;
use tagcache_core::{CacheError, DEFAULT_TTL, RENEW_THRESHOLD, effective_ttl};
use tagcache_store::CacheConfig;

/// Settings for one [`QueryCache`](crate::QueryCache) namespace.
///
/// # Defaults
///
/// - `auto_renew`: `true`
/// - `expiration`: 5 minutes
/// - `renew_threshold`: 1 minute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCacheConfig {
    /// Logical cache domain, usually one entity type.
    pub namespace: String,

    /// Renew entries read with no more than `renew_threshold` left.
    pub auto_renew: bool,

    /// TTL for every entry written.
    pub expiration: Duration,

    /// Remaining lifetime at or below which a read renews.
    pub renew_threshold: Duration,
}

impl QueryCacheConfig {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            auto_renew: true,
            expiration: DEFAULT_TTL,
            renew_threshold: RENEW_THRESHOLD,
        }
    }

    /// Namespace settings seeded from the environment configuration.
    pub fn from_cache_config(namespace: impl Into<String>, config: &CacheConfig) -> Self {
        Self::new(namespace)
            .with_auto_renew(config.auto_renew)
            .with_expiration(config.default_ttl())
    }

    #[must_use]
    pub fn with_auto_renew(mut self, auto_renew: bool) -> Self {
        self.auto_renew = auto_renew;
        self
    }

    /// Sets the entry TTL. Zero means the five minute default.
    #[must_use]
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = effective_ttl(expiration);
        self
    }

    #[must_use]
    pub fn with_renew_threshold(mut self, threshold: Duration) -> Self {
        self.renew_threshold = threshold;
        self
    }

    /// Checks the settings before a cache is built from them.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidArgument` for an empty namespace, a zero
    /// expiration, or a renew threshold that is not below the expiration.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.namespace.trim().is_empty() {
            return Err(CacheError::invalid_argument("namespace must not be empty"));
        }
        if self.expiration.is_zero() {
            return Err(CacheError::invalid_argument("expiration must not be zero"));
        }
        if self.auto_renew && self.renew_threshold >= self.expiration {
            return Err(CacheError::invalid_argument(format!(
                "renew threshold {:?} must be below expiration {:?}",
                self.renew_threshold, self.expiration
            )));
        }
        Ok(())
    }
}
