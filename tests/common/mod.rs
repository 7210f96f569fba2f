use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tagcache::{CacheError, MemoryStore, QueryCache, QueryCacheConfig, TagStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserFilter {
    pub school_id: Option<u64>,
    pub active: Option<bool>,
}

pub fn user(id: u64) -> User {
    User {
        id,
        name: format!("user-{id}"),
    }
}

#[allow(dead_code)]
pub fn users(ids: impl IntoIterator<Item = u64>) -> Vec<User> {
    ids.into_iter().map(user).collect()
}

/// Query cache over a fresh in-memory store.
#[allow(dead_code)]
pub fn users_cache() -> (QueryCache<User>, MemoryStore) {
    let store = MemoryStore::new();
    let cache = QueryCache::new(QueryCacheConfig::new("users"), Arc::new(store.clone()))
        .expect("valid config");
    (cache, store)
}

/// Counts origin invocations.
#[derive(Debug, Clone, Default)]
pub struct Origin {
    calls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl Origin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Store whose reads always fail with a transport error.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct UnreachableStore;

#[derive(Debug, thiserror::Error)]
#[error("connection refused")]
pub struct ConnectionRefused;

#[async_trait]
impl TagStore for UnreachableStore {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn get_with_ttl(&self, _key: &str) -> Result<(String, Duration), CacheError> {
        Err(CacheError::store(ConnectionRefused))
    }

    async fn set(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Duration,
        _tags: &[String],
    ) -> Result<(), CacheError> {
        Err(CacheError::store(ConnectionRefused))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::store(ConnectionRefused))
    }

    async fn invalidate_tags(&self, _tags: &[String]) -> Result<(), CacheError> {
        Err(CacheError::store(ConnectionRefused))
    }
}

/// Memory store whose deletes fail; reads and writes work.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct NoDeleteStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl TagStore for NoDeleteStore {
    fn name(&self) -> &'static str {
        "no-delete"
    }

    async fn get_with_ttl(&self, key: &str) -> Result<(String, Duration), CacheError> {
        self.inner.get_with_ttl(key).await
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        tags: &[String],
    ) -> Result<(), CacheError> {
        self.inner.set(key, value, ttl, tags).await
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::store(ConnectionRefused))
    }

    async fn invalidate_tags(&self, tags: &[String]) -> Result<(), CacheError> {
        self.inner.invalidate_tags(tags).await
    }
}

/// Memory store whose writes fail; reads and deletes work.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct NoWriteStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl TagStore for NoWriteStore {
    fn name(&self) -> &'static str {
        "no-write"
    }

    async fn get_with_ttl(&self, key: &str) -> Result<(String, Duration), CacheError> {
        self.inner.get_with_ttl(key).await
    }

    async fn set(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Duration,
        _tags: &[String],
    ) -> Result<(), CacheError> {
        Err(CacheError::store(ConnectionRefused))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.delete(key).await
    }

    async fn invalidate_tags(&self, tags: &[String]) -> Result<(), CacheError> {
        self.inner.invalidate_tags(tags).await
    }
}
