//! Per-key request coalescing.
//!
//! The first caller for a key becomes the leader and runs the work; callers
//! arriving while it runs wait for the leader's outcome instead of running the
//! work again. The slot for a key is released when the leader finishes, fails,
//! panics, or is dropped, so the next call always starts a fresh wave.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tagcache_core::CacheError;
use tokio::sync::watch;
use tracing::{debug, warn};

type Outcome<T> = Option<Result<T, CacheError>>;

enum Role<T> {
    Leader(watch::Sender<Outcome<T>>),
    Follower(watch::Receiver<Outcome<T>>),
}

/// Deduplicates concurrent executions that share a key.
///
/// Cloning yields a handle to the same in-flight registry.
pub struct Coalescer<T> {
    inflight: Arc<Mutex<HashMap<String, watch::Receiver<Outcome<T>>>>>,
}

impl<T> Clone for Coalescer<T> {
    fn clone(&self) -> Self {
        Self {
            inflight: Arc::clone(&self.inflight),
        }
    }
}

impl<T> Default for Coalescer<T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> std::fmt::Debug for Coalescer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coalescer")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl<T> Coalescer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with an execution in flight.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, watch::Receiver<Outcome<T>>>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join(&self, key: &str) -> Role<T> {
        let mut inflight = self.lock();
        if let Some(rx) = inflight.get(key) {
            return Role::Follower(rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        inflight.insert(key.to_string(), rx);
        Role::Leader(tx)
    }
}

impl<T> Coalescer<T>
where
    T: Clone + Send + Sync,
{
    /// Runs `work` for `key`, or waits for the execution already in flight.
    ///
    /// Every caller of one wave receives a clone of the same result. Errors
    /// are shared the same way and never retained after the wave ends.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `work`, or `CacheError::Interrupted` to
    /// followers whose leader panicked or was dropped before finishing.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let tx = match self.join(key) {
            Role::Leader(tx) => tx,
            Role::Follower(rx) => {
                debug!(cache.key = %key, "Joining in-flight execution");
                return follow(key, rx).await;
            }
        };

        let _release = Release {
            inflight: &self.inflight,
            key,
        };
        let result = work().await;
        tx.send_replace(Some(result.clone()));
        result
    }
}

async fn follow<T: Clone>(key: &str, mut rx: watch::Receiver<Outcome<T>>) -> Result<T, CacheError> {
    loop {
        if let Some(result) = rx.borrow_and_update().as_ref() {
            return result.clone();
        }
        if rx.changed().await.is_err() {
            break;
        }
    }

    // Sender gone: the leader may still have published right before dropping.
    let outcome = (*rx.borrow()).clone();
    outcome.unwrap_or_else(|| {
        warn!(cache.key = %key, "Leader ended without a result");
        Err(CacheError::Interrupted(key.to_string()))
    })
}

/// Removes the registry slot when the leader's scope ends, however it ends.
struct Release<'a, T> {
    inflight: &'a Mutex<HashMap<String, watch::Receiver<Outcome<T>>>>,
    key: &'a str,
}

impl<T> Drop for Release<'_, T> {
    fn drop(&mut self) {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.key);
    }
}
