//! # tagcache Store
//!
//! Tag-aware cache store backends.
//!
//! This crate provides:
//! - The [`TagStore`] trait every backend implements
//! - A Redis backend with tag sets for bulk invalidation
//! - An in-process backend for tests and single-node deployments
//! - Store configuration from environment variables
//!
//! # Example
//!
//! ```ignore
//! use tagcache_store::{CacheConfig, RedisStore, TagStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = CacheConfig::from_env();
//!     let store = RedisStore::new(&config.redis_url, &config.key_prefix)
//!         .await
//!         .unwrap();
//!
//!     store
//!         .set("users:first:1", "{}", Duration::from_secs(300), &["dbcache:users".into()])
//!         .await
//!         .unwrap();
//!     store.invalidate_tags(&["dbcache:users".into()]).await.unwrap();
//! }
//! ```

pub mod config;
pub mod memory;
pub mod redis;
pub mod store;

pub use crate::config::CacheConfig;
pub use crate::memory::MemoryStore;
pub use crate::redis::RedisStore;
pub use crate::store::TagStore;
pub use tagcache_core::CacheError;
