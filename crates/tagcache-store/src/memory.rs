//! In-process store.
//!
//! Keeps entries and the tag index behind one mutex. Each entry remembers the
//! tags it was indexed under, so removing an entry also drops it from those
//! tag sets and empty sets go with it. Expired entries are dropped when read
//! and by sweeps, which run on every tag invalidation and on writes once the
//! map has doubled since the last sweep. Clock reads go through `tokio::time`
//! so tests can pause and advance time.

use crate::TagStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tagcache_core::CacheError;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// Entry count below which writes never trigger a sweep.
const SWEEP_FLOOR: usize = 64;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
    tags: HashSet<String>,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    tags: HashMap<String, HashSet<String>>,
    sweep_at: usize,
}

impl State {
    /// Removes `key` and unlinks it from every tag set it belongs to.
    fn remove_entry(&mut self, key: &str) -> bool {
        let Some(entry) = self.entries.remove(key) else {
            return false;
        };
        for tag in &entry.tags {
            if let Some(keys) = self.tags.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
        true
    }

    fn sweep(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove_entry(key);
        }
        self.sweep_at = (self.entries.len() * 2).max(SWEEP_FLOOR);
        expired.len()
    }

    fn sweep_if_due(&mut self, now: Instant) {
        if self.entries.len() >= self.sweep_at {
            let swept = self.sweep(now);
            if swept > 0 {
                debug!(cache.swept = %swept, "Expired entries swept");
            }
        }
    }
}

/// Tag-aware store living in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remaining lifetime of a live entry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.lock()
            .entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.expires_at - now)
    }

    /// Returns `true` if a live entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.ttl(key).is_some()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .entries
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    #[instrument(skip(self), fields(cache.operation = "GET"))]
    async fn get_with_ttl(&self, key: &str) -> Result<(String, Duration), CacheError> {
        let now = Instant::now();
        let mut state = self.lock();

        let found = state
            .entries
            .get(key)
            .map(|entry| (entry.value.clone(), entry.expires_at));

        match found {
            Some((value, expires_at)) if expires_at > now => Ok((value, expires_at - now)),
            Some(_) => {
                state.remove_entry(key);
                debug!(cache.key = %key, "Expired entry dropped");
                Err(CacheError::NotFound)
            }
            None => Err(CacheError::NotFound),
        }
    }

    /// Tags of an overwritten entry stay indexed alongside the new ones, as
    /// they do in Redis.
    #[instrument(skip(self, value), fields(cache.operation = "SET"))]
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        tags: &[String],
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut state = self.lock();
        state.sweep_if_due(now);

        for tag in tags {
            state
                .tags
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }

        let entry = state.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: String::new(),
            expires_at: now,
            tags: HashSet::new(),
        });
        entry.value = value.to_string();
        entry.expires_at = now + ttl;
        entry.tags.extend(tags.iter().cloned());

        Ok(())
    }

    #[instrument(skip(self), fields(cache.operation = "DEL"))]
    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.lock().remove_entry(key);
        Ok(())
    }

    #[instrument(skip(self), fields(cache.operation = "TAG_DEL"))]
    async fn invalidate_tags(&self, tags: &[String]) -> Result<(), CacheError> {
        let mut state = self.lock();
        state.sweep(Instant::now());
        let mut deleted = 0usize;

        for tag in tags {
            let Some(keys) = state.tags.remove(tag) else {
                continue;
            };
            for key in keys {
                if state.remove_entry(&key) {
                    deleted += 1;
                }
            }
        }

        debug!(cache.tags = ?tags, cache.deleted = %deleted, "Tag invalidation complete");

        Ok(())
    }
}
