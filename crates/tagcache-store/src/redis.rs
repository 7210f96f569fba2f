//! Redis store for distributed caching.
//!
//! Values are plain strings written with a millisecond expiry. Each tag is a
//! Redis set holding the keys written under it, so invalidating a tag means
//! deleting the set's members and then the set itself.

use crate::TagStore;
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;
use tagcache_core::CacheError;
use tracing::{debug, error, instrument};

/// Tag index sets outlive any single entry; 30 days.
const TAG_INDEX_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Redis store with connection pooling.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Creates a new Redis store.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `prefix` - Prefix for every key and tag set this store writes
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Store` if connection fails.
    pub async fn new(redis_url: &str, prefix: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url).map_err(CacheError::store)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(CacheError::store)?;

        Ok(Self {
            conn,
            prefix: prefix.to_string(),
        })
    }

    fn entry_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    fn tag_key(&self, tag: &str) -> String {
        format!("{}:tag:{}", self.prefix, tag)
    }
}

#[async_trait]
impl TagStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    #[instrument(skip(self), fields(cache.operation = "GET_PTTL"))]
    async fn get_with_ttl(&self, key: &str) -> Result<(String, Duration), CacheError> {
        let mut conn = self.conn.clone();
        let key = self.entry_key(key);

        let (value, pttl): (Option<String>, i64) = redis::pipe()
            .get(&key)
            .pttl(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!(cache.key = %key, error = %e, "Redis GET error");
                CacheError::store(e)
            })?;

        match value {
            Some(value) => {
                // -1 (no expiry) reads as zero so the entry is renewed and gets one
                let remaining = Duration::from_millis(u64::try_from(pttl).unwrap_or(0));
                debug!(cache.key = %key, cache.ttl_ms = %remaining.as_millis(), "Cache hit");
                Ok((value, remaining))
            }
            None => {
                debug!(cache.key = %key, "Cache miss");
                Err(CacheError::NotFound)
            }
        }
    }

    #[instrument(skip(self, value), fields(cache.operation = "SET_PX"))]
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        tags: &[String],
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let key = self.entry_key(key);
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        let mut pipe = redis::pipe();
        pipe.atomic().pset_ex(&key, value, ttl_ms).ignore();
        for tag in tags {
            let tag_key = self.tag_key(tag);
            pipe.sadd(&tag_key, &key)
                .ignore()
                .expire(&tag_key, TAG_INDEX_TTL_SECS)
                .ignore();
        }

        let _: () = pipe.query_async(&mut conn).await.map_err(|e| {
            error!(cache.key = %key, error = %e, "Redis SET error");
            CacheError::store(e)
        })?;

        debug!(cache.key = %key, cache.ttl_ms = %ttl_ms, cache.tags = tags.len(), "Cache set");

        Ok(())
    }

    #[instrument(skip(self), fields(cache.operation = "DEL"))]
    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let key = self.entry_key(key);

        conn.del::<_, ()>(&key).await.map_err(CacheError::store)?;

        debug!(cache.key = %key, "Cache deleted");

        Ok(())
    }

    /// Invalidates every key indexed under any of `tags`.
    ///
    /// Member keys are gathered from all tag sets first and deleted in one
    /// command together with the sets.
    #[instrument(skip(self), fields(cache.operation = "TAG_DEL"))]
    async fn invalidate_tags(&self, tags: &[String]) -> Result<(), CacheError> {
        if tags.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let tag_keys: Vec<String> = tags.iter().map(|tag| self.tag_key(tag)).collect();

        let mut pipe = redis::pipe();
        for tag_key in &tag_keys {
            pipe.smembers(tag_key);
        }
        let members: Vec<Vec<String>> =
            pipe.query_async(&mut conn).await.map_err(CacheError::store)?;

        let mut doomed: Vec<String> = members.into_iter().flatten().collect();
        doomed.extend(tag_keys);
        doomed.sort_unstable();
        doomed.dedup();

        let deleted: u64 = conn.del(&doomed).await.map_err(CacheError::store)?;

        debug!(cache.tags = ?tags, cache.deleted = %deleted, "Tag invalidation complete");

        Ok(())
    }
}
