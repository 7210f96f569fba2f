//! # tagcache
//!
//! A cache-aside layer for repository read paths: paginated queries, list
//! queries, single-entity lookups and arbitrary keyed computations.
//!
//! ## Overview
//!
//! Any "compute an expensive result" callable becomes a cached, deduplicated
//! and selectively invalidatable operation:
//!
//! - **Stampede protection**: concurrent misses on one key run the origin once
//! - **Tagged invalidation**: flush by entity id, key, custom tag, read shape,
//!   or the whole namespace
//! - **Sliding expiration**: reads renew entries that are about to expire
//! - **Pluggable stores**: Redis or in-process, behind the [`TagStore`] trait
//!
//! ## Architecture
//!
//! ```text
//! crates/
//! ├── tagcache-core/    # Errors, keys, tags, filter fingerprints
//! ├── tagcache-store/   # TagStore trait, Redis and memory backends, env config
//! └── tagcache-cli/     # Administrative commands against Redis
//! src/
//! ├── coalesce.rs       # Per-key request coalescing
//! ├── envelope.rs       # Stored result shapes
//! ├── cache.rs          # Single-key typed cache
//! ├── query.rs          # Tagged query cache
//! ├── clear.rs          # Invalidation requests
//! └── config.rs         # Query cache settings
//! ```
//!
//! ## Tags
//!
//! Every query cache entry carries:
//!
//! | Tag | Purpose |
//! |-----|---------|
//! | `dbcache` | All entries of every namespace |
//! | `dbcache:{namespace}` | All entries of one namespace |
//! | `dbcache:{namespace}:paginate` / `list` / `remember` | One read shape |
//! | `dbcache:{namespace}:{id}` | One entity |
//! | `dbcache:{namespace}:{key}` | One remembered key |
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tagcache::{ClearSpec, QueryCache, QueryCacheConfig, QueryFilter};
//! use tagcache_store::{CacheConfig, RedisStore};
//!
//! let env = CacheConfig::from_env();
//! let store = Arc::new(RedisStore::new(&env.redis_url, &env.key_prefix).await?);
//! let users = QueryCache::<User>::new(QueryCacheConfig::from_cache_config("users", &env), store)?;
//!
//! let filter = QueryFilter::new(UserFilter::default()).with_sorts("-created_at");
//! let (page, total) = users
//!     .paginate(0, 20, &filter, || async { repo.page(&filter, 0, 20).await })
//!     .await?;
//!
//! users.clear(&ClearSpec::ids([page[0].id])).await?;
//! ```
//!
//! ## Modules
//!
//! - [`cache`]: Single-key typed cache
//! - [`clear`]: Invalidation requests
//! - [`coalesce`]: Per-key request coalescing
//! - [`config`]: Query cache settings
//! - [`envelope`]: Stored result shapes
//! - [`query`]: Tagged query cache

pub mod cache;
pub mod clear;
pub mod coalesce;
pub mod config;
pub mod envelope;
pub mod query;

pub use cache::Cache;
pub use clear::ClearSpec;
pub use coalesce::Coalescer;
pub use config::QueryCacheConfig;
pub use envelope::Envelope;
pub use query::QueryCache;

// Re-export workspace crates for convenience
pub use tagcache_core;
pub use tagcache_core::{CacheError, Fingerprint, QueryFilter, SortOrder, Sorter};
pub use tagcache_store;
pub use tagcache_store::{MemoryStore, TagStore};
