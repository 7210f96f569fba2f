//! Single-key cache facade.
//!
//! Stores one typed value per key under a caller-chosen namespace, with
//! stampede protection on [`Cache::remember`].

use crate::coalesce::Coalescer;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tagcache_core::keys::prefixed_key;
use tagcache_core::{CacheError, effective_ttl};
use tagcache_store::TagStore;
use tracing::{debug, instrument, warn};

/// Typed key/value cache bound to a namespace.
///
/// Keys are stored as `{namespace}:{key}` and values as JSON.
pub struct Cache<T> {
    namespace: String,
    store: Option<Arc<dyn TagStore>>,
    coalescer: Coalescer<T>,
}

impl<T> Clone for Cache<T> {
    fn clone(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            store: self.store.clone(),
            coalescer: self.coalescer.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Cache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("namespace", &self.namespace)
            .field("store", &self.store.as_ref().map(|store| store.name()))
            .finish_non_exhaustive()
    }
}

impl<T> Cache<T> {
    pub fn new(namespace: impl Into<String>, store: Arc<dyn TagStore>) -> Self {
        Self {
            namespace: namespace.into(),
            store: Some(store),
            coalescer: Coalescer::new(),
        }
    }

    /// A cache with no store bound; every operation fails with
    /// `CacheError::NotConfigured`.
    pub fn unbound(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            store: None,
            coalescer: Coalescer::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn store(&self) -> Result<&Arc<dyn TagStore>, CacheError> {
        self.store.as_ref().ok_or(CacheError::NotConfigured)
    }

    fn key(&self, key: &str) -> String {
        prefixed_key(&self.namespace, key)
    }
}

impl<T> Cache<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    /// Gets a cached value and its remaining TTL.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NotFound` on a miss and `CacheError::CorruptEntry`
    /// if the stored text is not a `T`.
    #[instrument(skip(self), fields(cache.namespace = %self.namespace))]
    pub async fn get(&self, key: &str) -> Result<(T, Duration), CacheError> {
        let store = self.store()?;
        let key = self.key(key);

        let (text, ttl) = store.get_with_ttl(&key).await?;
        Ok((decode(&key, &text)?, ttl))
    }

    /// Gets a cached value and removes it.
    ///
    /// If the delete fails the error is returned instead of the value.
    #[instrument(skip(self), fields(cache.namespace = %self.namespace))]
    pub async fn pull(&self, key: &str) -> Result<T, CacheError> {
        let store = self.store()?;
        let key = self.key(key);

        let (text, _) = store.get_with_ttl(&key).await?;
        store.delete(&key).await?;

        decode(&key, &text)
    }

    /// Stores `value` for `ttl`. A zero TTL means five minutes; entries never
    /// live forever.
    #[instrument(skip(self, value), fields(cache.namespace = %self.namespace))]
    pub async fn set(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError> {
        let store = self.store()?;
        let key = self.key(key);
        let text = serde_json::to_string(value)?;

        store.set(&key, &text, effective_ttl(ttl), &[]).await
    }

    /// Returns the cached value, or computes it once across concurrent callers
    /// and caches it.
    ///
    /// A corrupt entry is treated as a miss. Store failures other than a miss
    /// are returned without calling `fetch`.
    #[instrument(skip(self, fetch), fields(cache.namespace = %self.namespace))]
    pub async fn remember<F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        match self.get(key).await {
            Ok((value, _)) => return Ok(value),
            Err(CacheError::NotFound) => debug!(cache.key = %key, "Cache miss"),
            Err(CacheError::CorruptEntry(reason)) => {
                warn!(cache.key = %key, %reason, "Corrupt entry, refetching");
            }
            Err(e) => return Err(e),
        }

        let value = self
            .coalescer
            .run(&self.key(key), || async move {
                fetch().await.map_err(CacheError::origin)
            })
            .await?;

        // every caller of the wave writes; the overwrite is idempotent
        self.set(key, &value, ttl).await?;

        Ok(value)
    }

    /// Removes a cached value.
    #[instrument(skip(self), fields(cache.namespace = %self.namespace))]
    pub async fn clear(&self, key: &str) -> Result<(), CacheError> {
        let store = self.store()?;
        store.delete(&self.key(key)).await
    }
}

fn decode<T: DeserializeOwned>(key: &str, text: &str) -> Result<T, CacheError> {
    serde_json::from_str(text)
        .map_err(|e| CacheError::CorruptEntry(format!("{key} does not parse: {e}")))
}
