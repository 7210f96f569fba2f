//! Tagged query cache.
//!
//! Wraps the three read shapes of a repository (page, full list, single
//! entity) plus arbitrary remembered values. Every entry is tagged so it can be
//! invalidated in bulk, and reads renew entries that are about to expire.
//!
//! # Lookup
//!
//! 1. Build the key and tag set for the call.
//! 2. Read the entry and its remaining TTL.
//! 3. On a hit, renew the entry if it is close to expiry, decode, return.
//! 4. On a miss or a corrupt entry, run the origin once per key across all
//!    concurrent callers, store the encoded result with its tags, return it.
//! 5. Any other store failure is returned without running the origin.
//!
//! # Example
//!
//! ```ignore
//! use tagcache::{ClearSpec, QueryCache, QueryCacheConfig};
//!
//! let users = QueryCache::<User>::new(QueryCacheConfig::new("users"), store)?;
//!
//! let (page, total) = users
//!     .paginate(0, 20, &filter, || async { repo.page(0, 20, &filter).await })
//!     .await?;
//! let user = users.first(5, || async { repo.find(5).await }).await?;
//!
//! // after updating user 5
//! users.clear(&ClearSpec::ids([5])).await?;
//! ```

use crate::clear::ClearSpec;
use crate::coalesce::Coalescer;
use crate::config::QueryCacheConfig;
use crate::envelope::Envelope;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tagcache_core::keys::{GLOBAL_TAG, build_key, owner_tag, scoped_tag};
use tagcache_core::{CacheError, Discriminator, Fingerprint, Operation};
use tagcache_store::TagStore;
use tracing::{debug, error, instrument, warn};

/// Cache for one entity type `E`, scoped to a namespace.
///
/// Holds only configuration and its coalescing registry; clones share both
/// and are safe to use from any number of tasks.
pub struct QueryCache<E> {
    config: Arc<QueryCacheConfig>,
    store: Option<Arc<dyn TagStore>>,
    coalescer: Coalescer<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for QueryCache<E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            store: self.store.clone(),
            coalescer: self.coalescer.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for QueryCache<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("config", &self.config)
            .field("store", &self.store.as_ref().map(|store| store.name()))
            .finish_non_exhaustive()
    }
}

impl<E> QueryCache<E> {
    /// Creates a cache for the configured namespace.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidArgument` if the configuration is invalid.
    pub fn new(config: QueryCacheConfig, store: Arc<dyn TagStore>) -> Result<Self, CacheError> {
        Self::build(config, Some(store))
    }

    /// A cache with no store bound; every operation fails with
    /// `CacheError::NotConfigured`.
    pub fn unbound(config: QueryCacheConfig) -> Result<Self, CacheError> {
        Self::build(config, None)
    }

    fn build(
        config: QueryCacheConfig,
        store: Option<Arc<dyn TagStore>>,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            store,
            coalescer: Coalescer::new(),
            _entity: PhantomData,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn config(&self) -> &QueryCacheConfig {
        &self.config
    }

    fn store(&self) -> Result<&Arc<dyn TagStore>, CacheError> {
        self.store.as_ref().ok_or(CacheError::NotConfigured)
    }

    /// Global marker, owner tag, then the namespace-scoped `scoped` tags.
    fn tags<I>(&self, scoped: I) -> Vec<String>
    where
        I: IntoIterator,
        I::Item: std::fmt::Display,
    {
        let namespace = self.namespace();
        let mut tags = vec![GLOBAL_TAG.to_string(), owner_tag(namespace)];
        tags.extend(scoped.into_iter().map(|tag| scoped_tag(namespace, tag)));
        tags
    }

    /// Invalidates the entries selected by `spec`.
    #[instrument(skip(self), fields(cache.namespace = %self.config.namespace))]
    pub async fn clear(&self, spec: &ClearSpec) -> Result<(), CacheError> {
        let store = self.store()?;
        let tags = spec.resolve(self.namespace());

        debug!(cache.tags = ?tags, "Clearing");
        store.invalidate_tags(&tags).await
    }

    /// Invalidates every entry carrying the raw tag `tag`.
    ///
    /// Unlike [`QueryCache::clear`] the tag is used exactly as given, without
    /// namespace scoping. Remembered entries are tagged with their bare key,
    /// so `forget("stats")` also drops a `stats` value remembered by a cache
    /// in another namespace over the same store.
    #[instrument(skip(self), fields(cache.namespace = %self.config.namespace))]
    pub async fn forget(&self, tag: &str) -> Result<(), CacheError> {
        let store = self.store()?;
        store.invalidate_tags(&[tag.to_string()]).await
    }
}

impl<E> QueryCache<E>
where
    E: Serialize + DeserializeOwned + Send + Sync,
{
    /// One page of a filtered query and the total row count.
    #[instrument(skip_all, fields(cache.namespace = %self.config.namespace, start = start, limit = limit))]
    pub async fn paginate<F, Q, Fut>(
        &self,
        start: u64,
        limit: u64,
        filter: &F,
        query: Q,
    ) -> Result<(Vec<E>, u64), CacheError>
    where
        F: Fingerprint + Sync + ?Sized,
        Q: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<(Vec<E>, u64)>> + Send,
    {
        let fingerprint = filter.fingerprint()?;
        let key = build_key(
            self.namespace(),
            Operation::Paginate,
            Discriminator::Page {
                start,
                limit,
                fingerprint: &fingerprint,
            },
        )?;
        let tags = self.tags([Operation::Paginate]);

        self.lookup(
            &key,
            Operation::Paginate,
            tags,
            || async move {
                let (items, total) = query().await?;
                Ok(Envelope::Paginated { items, total })
            },
            Envelope::into_paginated,
        )
        .await
    }

    /// Every row matching a filter.
    #[instrument(skip_all, fields(cache.namespace = %self.config.namespace))]
    pub async fn list<F, Q, Fut>(&self, filter: &F, query: Q) -> Result<Vec<E>, CacheError>
    where
        F: Fingerprint + Sync + ?Sized,
        Q: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Vec<E>>> + Send,
    {
        let fingerprint = filter.fingerprint()?;
        let key = build_key(
            self.namespace(),
            Operation::List,
            Discriminator::Filter(&fingerprint),
        )?;
        let tags = self.tags([Operation::List]);

        self.lookup(
            &key,
            Operation::List,
            tags,
            || async move {
                Ok(Envelope::Listed {
                    items: query().await?,
                })
            },
            Envelope::into_listed,
        )
        .await
    }

    /// A single entity by id. A `None` result is cached too.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidArgument` for an id of zero.
    #[instrument(skip_all, fields(cache.namespace = %self.config.namespace, id = id))]
    pub async fn first<Q, Fut>(&self, id: u64, query: Q) -> Result<Option<E>, CacheError>
    where
        Q: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Option<E>>> + Send,
    {
        let key = build_key(self.namespace(), Operation::First, Discriminator::Id(id))?;
        let tags = self.tags([id]);

        self.lookup(
            &key,
            Operation::First,
            tags,
            || async move {
                Ok(Envelope::Single {
                    item: query().await?,
                })
            },
            Envelope::into_single,
        )
        .await
    }

    /// Any serializable value under a free-form key.
    ///
    /// Besides the namespace tags the entry carries the raw `key` as a tag, so
    /// [`QueryCache::forget`] with the same key drops it.
    #[instrument(skip_all, fields(cache.namespace = %self.config.namespace, key = %key))]
    pub async fn remember<T, Q, Fut>(&self, key: &str, query: Q) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        Q: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        let cache_key = build_key(self.namespace(), Operation::Remember, Discriminator::Key(key))?;
        let remember_key = format!("{}:{key}", Operation::Remember);
        let mut tags = self.tags([key, Operation::Remember.as_str(), remember_key.as_str()]);
        tags.push(key.to_string());

        self.lookup(
            &cache_key,
            Operation::Remember,
            tags,
            || async move {
                let value = query().await?;
                Ok(Envelope::Arbitrary {
                    data: serde_json::to_value(value)?,
                })
            },
            Envelope::into_arbitrary::<T>,
        )
        .await
    }

    /// Reads through the cache; `project` turns the envelope into the
    /// caller's value. A hit that fails to project is treated as corrupt.
    async fn lookup<R, M, Fut, P>(
        &self,
        key: &str,
        operation: Operation,
        tags: Vec<String>,
        miss: M,
        project: P,
    ) -> Result<R, CacheError>
    where
        M: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<Envelope<E>>> + Send,
        P: Fn(Envelope<E>) -> Result<R, CacheError> + Send,
    {
        let store = self.store()?;

        match store.get_with_ttl(key).await {
            Ok((text, remaining)) => match Envelope::decode(&text, operation)
                .and_then(&project)
            {
                Ok(value) => {
                    debug!(cache.key = %key, "Cache hit");
                    if self.config.auto_renew && remaining <= self.config.renew_threshold {
                        self.renew(store, key, &text, &tags).await;
                    }
                    return Ok(value);
                }
                Err(e) => warn!(cache.key = %key, error = %e, "Corrupt entry, refetching"),
            },
            Err(CacheError::NotFound) => debug!(cache.key = %key, "Cache miss"),
            Err(e) => {
                error!(cache.key = %key, error = %e, "Cache read failed");
                return Err(e);
            }
        }

        let expiration = self.config.expiration;
        let text = self
            .coalescer
            .run(key, || async move {
                let envelope = miss().await.map_err(CacheError::origin)?;
                let text = envelope.encode()?;
                store.set(key, &text, expiration, &tags).await?;
                debug!(cache.key = %key, "Cache filled");
                Ok(text)
            })
            .await?;

        project(Envelope::decode(&text, operation)?)
    }

    /// Extends an entry to the full TTL. Failure only costs the renewal.
    async fn renew(&self, store: &Arc<dyn TagStore>, key: &str, text: &str, tags: &[String]) {
        match store.set(key, text, self.config.expiration, tags).await {
            Ok(()) => debug!(cache.key = %key, "Cache renewed"),
            Err(e) => warn!(cache.key = %key, error = %e, "Cache renewal failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::time::Duration;
    use tagcache_store::MemoryStore;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u64,
    }

    fn users_cache() -> (QueryCache<User>, MemoryStore) {
        let store = MemoryStore::new();
        let cache = QueryCache::new(QueryCacheConfig::new("users"), Arc::new(store.clone())).unwrap();
        (cache, store)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = QueryCache::<User>::unbound(QueryCacheConfig::new("")).unwrap_err();
        assert!(matches!(err, CacheError::InvalidArgument(_)));
    }

    #[test]
    fn test_tags_include_global_and_owner() {
        let (cache, _) = users_cache();
        assert_eq!(
            cache.tags([Operation::List]),
            vec!["dbcache", "dbcache:users", "dbcache:users:list"]
        );
    }

    #[tokio::test]
    async fn test_unbound_cache_is_not_configured() {
        let cache = QueryCache::<User>::unbound(QueryCacheConfig::new("users")).unwrap();
        let err = cache
            .first(1, || async { Ok(Some(User { id: 1 })) })
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::NotConfigured));
        assert!(matches!(
            cache.clear(&ClearSpec::all()).await,
            Err(CacheError::NotConfigured)
        ));
        assert!(matches!(
            cache.forget("x").await,
            Err(CacheError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn test_first_stores_single_envelope_with_tags() {
        let (cache, store) = users_cache();
        let user = cache
            .first(5, || async { Ok(Some(User { id: 5 })) })
            .await
            .unwrap();
        assert_eq!(user, Some(User { id: 5 }));

        let (text, ttl) = store.get_with_ttl("users:first:5").await.unwrap();
        assert_eq!(text, r#"{"first":{"item":{"id":5}}}"#);
        assert!(ttl > Duration::from_secs(290));

        store
            .invalidate_tags(&["dbcache:users:5".to_string()])
            .await
            .unwrap();
        assert!(!store.contains("users:first:5"));
    }

    #[tokio::test]
    async fn test_first_zero_id_is_invalid() {
        let (cache, store) = users_cache();
        let err = cache
            .first(0, || async { Ok(Some(User { id: 0 })) })
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidArgument(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_renews_entry_near_expiry() {
        let (cache, store) = users_cache();
        store
            .set(
                "users:first:1",
                r#"{"first":{"item":{"id":1}}}"#,
                Duration::from_secs(30),
                &[],
            )
            .await
            .unwrap();

        let user = cache
            .first(1, || async { Err(anyhow::anyhow!("origin must not run")) })
            .await
            .unwrap();
        assert_eq!(user, Some(User { id: 1 }));
        assert!(store.ttl("users:first:1").unwrap() > Duration::from_secs(290));

        // the renewed entry carries the full tag set
        cache.clear(&ClearSpec::ids([1])).await.unwrap();
        assert!(!store.contains("users:first:1"));
    }

    #[tokio::test]
    async fn test_no_renewal_when_disabled() {
        let store = MemoryStore::new();
        let cache = QueryCache::<User>::new(
            QueryCacheConfig::new("users").with_auto_renew(false),
            Arc::new(store.clone()),
        )
        .unwrap();
        store
            .set(
                "users:first:1",
                r#"{"first":{"item":{"id":1}}}"#,
                Duration::from_secs(30),
                &[],
            )
            .await
            .unwrap();

        cache
            .first(1, || async { Ok(None) })
            .await
            .unwrap();
        assert!(store.ttl("users:first:1").unwrap() <= Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_no_renewal_with_plenty_left() {
        let (cache, store) = users_cache();
        store
            .set(
                "users:first:1",
                r#"{"first":{"item":{"id":1}}}"#,
                Duration::from_secs(120),
                &[],
            )
            .await
            .unwrap();

        cache.first(1, || async { Ok(None) }).await.unwrap();
        assert!(store.ttl("users:first:1").unwrap() <= Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_remember_tags() {
        let (cache, store) = users_cache();
        let count: u32 = cache.remember("stats", || async { Ok(3u32) }).await.unwrap();
        assert_eq!(count, 3);

        for tag in [
            "dbcache:users:stats",
            "dbcache:users:remember",
            "dbcache:users:remember:stats",
            "stats",
        ] {
            cache.remember("stats", || async { Ok(3u32) }).await.unwrap();
            assert!(store.contains("users:remember:stats"));
            store.invalidate_tags(&[tag.to_string()]).await.unwrap();
            assert!(!store.contains("users:remember:stats"), "tag {tag}");
        }
    }
}
