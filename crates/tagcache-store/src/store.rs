//! Store adapter contract.

use async_trait::async_trait;
use std::time::Duration;
use tagcache_core::CacheError;

/// A string-valued key/value store with expiry and a tag index.
///
/// Implementations own storage lifetime: expiry and eviction happen inside
/// the store, never in the caches layered on top of it.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// A name for tracing.
    ///
    /// # Example
    /// - "memory"
    /// - "redis"
    fn name(&self) -> &'static str;

    /// Returns the stored text and its remaining time to live.
    ///
    /// A missing or expired key must be reported as `CacheError::NotFound`,
    /// never folded into another error.
    async fn get_with_ttl(&self, key: &str) -> Result<(String, Duration), CacheError>;

    /// Stores `value` under `key` for `ttl`, indexing it under every tag.
    ///
    /// Overwrites any existing value. Tags from a previous write of the same
    /// key may remain indexed.
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        tags: &[String],
    ) -> Result<(), CacheError>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Removes every entry carrying at least one of `tags`.
    async fn invalidate_tags(&self, tags: &[String]) -> Result<(), CacheError>;
}
