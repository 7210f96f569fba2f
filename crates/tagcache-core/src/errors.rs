//! Error type for cache operations.

use std::sync::Arc;

/// Boxed cause carried by store failures.
pub type StoreCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for cache operations.
///
/// Every variant is cheap to clone so a single outcome can be handed to all
/// callers that waited on the same coalesced execution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("Cache store not configured")]
    NotConfigured,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cache miss")]
    NotFound,

    #[error("Corrupt cache entry: {0}")]
    CorruptEntry(String),

    #[error("Cache store error: {0}")]
    Store(#[source] StoreCause),

    #[error("Origin query failed: {0:#}")]
    Origin(Arc<anyhow::Error>),

    #[error("Serialization error: {0}")]
    Serialization(#[source] Arc<serde_json::Error>),

    #[error("Coalesced execution for {0} ended without a result")]
    Interrupted(String),
}

impl CacheError {
    /// Wraps a store backend failure.
    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store(Arc::new(err))
    }

    /// Wraps a failure returned by an origin callable.
    pub fn origin(err: anyhow::Error) -> Self {
        Self::Origin(Arc::new(err))
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Returns `true` for a plain cache miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// The origin's own error, for downcasting at the call site.
    pub fn origin_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Origin(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(Arc::new(err))
    }
}
