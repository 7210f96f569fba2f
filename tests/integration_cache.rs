mod common;

use common::{NoDeleteStore, Origin, UnreachableStore, User, user};
use std::sync::Arc;
use std::time::Duration;
use tagcache::{Cache, CacheError, MemoryStore};
use tokio::task::JoinSet;
use tokio_test::assert_ok;

fn user_cache() -> (Cache<User>, MemoryStore) {
    let store = MemoryStore::new();
    (Cache::new("profile", Arc::new(store.clone())), store)
}

#[tokio::test(start_paused = true)]
async fn test_remember_coalesces_concurrent_misses() {
    let (cache, store) = user_cache();
    let origin = Origin::new();
    let mut tasks = JoinSet::new();

    for _ in 0..8 {
        let cache = cache.clone();
        let origin = origin.clone();
        tasks.spawn(async move {
            cache
                .remember("7", Duration::from_secs(60), move || async move {
                    origin.hit();
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(user(7))
                })
                .await
        });
    }

    for result in tasks.join_all().await {
        assert_eq!(result.unwrap(), user(7));
    }
    assert_eq!(origin.calls(), 1);
    assert!(store.contains("profile:7"));
}

#[tokio::test(start_paused = true)]
async fn test_set_entries_expire() {
    let (cache, _) = user_cache();
    assert_ok!(cache.set("1", &user(1), Duration::from_secs(10)).await);

    tokio::time::advance(Duration::from_secs(11)).await;

    assert!(cache.get("1").await.unwrap_err().is_not_found());
}

#[tokio::test(start_paused = true)]
async fn test_zero_ttl_entry_outlives_four_minutes() {
    let (cache, _) = user_cache();
    assert_ok!(cache.set("1", &user(1), Duration::ZERO).await);

    tokio::time::advance(Duration::from_secs(240)).await;
    let (cached, ttl) = cache.get("1").await.unwrap();
    assert_eq!(cached, user(1));
    assert_eq!(ttl, Duration::from_secs(60));

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(cache.get("1").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_pull_reports_failed_delete() {
    let store = NoDeleteStore::default();
    let inner = store.inner.clone();
    let cache: Cache<User> = Cache::new("profile", Arc::new(store));
    assert_ok!(cache.set("1", &user(1), Duration::from_secs(60)).await);

    let err = cache.pull("1").await.unwrap_err();

    assert!(matches!(err, CacheError::Store(_)));
    assert!(inner.contains("profile:1"));
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let store = MemoryStore::new();
    let profiles: Cache<User> = Cache::new("profile", Arc::new(store.clone()));
    let sessions: Cache<User> = Cache::new("session", Arc::new(store.clone()));

    assert_ok!(profiles.set("1", &user(1), Duration::from_secs(60)).await);

    assert!(sessions.get("1").await.unwrap_err().is_not_found());
    assert_ok!(sessions.clear("1").await);
    assert_eq!(profiles.get("1").await.unwrap().0, user(1));
}

#[tokio::test]
async fn test_store_failure_skips_fetch() {
    let cache: Cache<User> = Cache::new("profile", Arc::new(UnreachableStore));
    let origin = Origin::new();

    let err = cache
        .remember("1", Duration::from_secs(60), || async {
            origin.hit();
            Ok(user(1))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::Store(_)));
    assert_eq!(origin.calls(), 0);
}
