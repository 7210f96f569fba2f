//! # tagcache Core
//!
//! Core types, errors, and utilities shared by the tagcache crates.
//!
//! - [`errors`]: The [`CacheError`] taxonomy shared by stores and caches
//! - [`keys`]: Cache key and tag construction
//! - [`filter`]: Filter, sort and preload descriptions and their fingerprints
//! - [`ttl`]: Expiration defaults
//!
//! # Example
//!
//! ```ignore
//! use tagcache_core::filter::{Fingerprint, QueryFilter};
//! use tagcache_core::keys::{build_key, Discriminator, Operation};
//!
//! let filter = QueryFilter::new(UserFilter { active: true }).with_sorts("-created_at");
//! let fingerprint = filter.fingerprint()?;
//! let key = build_key("users", Operation::List, Discriminator::Filter(&fingerprint))?;
//! ```

pub mod errors;
pub mod filter;
pub mod keys;
pub mod ttl;

// Re-export commonly used types at crate root
pub use errors::CacheError;
pub use filter::{Fingerprint, QueryFilter, SortOrder, Sorter};
pub use keys::{Discriminator, Operation};
pub use ttl::{DEFAULT_TTL, RENEW_THRESHOLD, effective_ttl};
