//! Cache key and tag generation.
//!
//! Keys have the form `{namespace}:{operation}:{discriminator}`. Tags are an
//! invalidation index only; they are scoped under the global [`GLOBAL_TAG`]
//! marker so one namespace can never flush another.

use crate::CacheError;
use std::fmt;

/// Marker tag carried by every entry a query cache writes.
pub const GLOBAL_TAG: &str = "dbcache";

/// Read shape an entry was produced by.
///
/// The operation is encoded in the key and decides how a stored entry is
/// decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Paginate,
    List,
    First,
    Remember,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paginate => "paginate",
            Self::List => "list",
            Self::First => "first",
            Self::Remember => "remember",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last component of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discriminator<'a> {
    /// Entity id; zero is rejected.
    Id(u64),
    /// Caller-chosen free-form key; empty is rejected.
    Key(&'a str),
    /// Fingerprint of a query filter.
    Filter(&'a str),
    /// Page window plus filter fingerprint.
    Page {
        start: u64,
        limit: u64,
        fingerprint: &'a str,
    },
}

impl fmt::Display for Discriminator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Key(key) => f.write_str(key),
            Self::Filter(fingerprint) => f.write_str(fingerprint),
            Self::Page {
                start,
                limit,
                fingerprint,
            } => write!(f, "{start},{limit}:{fingerprint}"),
        }
    }
}

/// Builds `{namespace}:{operation}:{discriminator}`.
///
/// # Errors
///
/// Returns `CacheError::InvalidArgument` for an id of zero or an empty key.
pub fn build_key(
    namespace: &str,
    operation: Operation,
    discriminator: Discriminator<'_>,
) -> Result<String, CacheError> {
    match discriminator {
        Discriminator::Id(0) => return Err(CacheError::invalid_argument("id must not be zero")),
        Discriminator::Key("") => {
            return Err(CacheError::invalid_argument("key must not be empty"));
        }
        _ => {}
    }

    Ok(format!("{namespace}:{operation}:{discriminator}"))
}

/// Key used by the single-key facade: `{namespace}:{key}`.
pub fn prefixed_key(namespace: &str, key: &str) -> String {
    format!("{namespace}:{key}")
}

/// Tag owning every entry of a namespace: `dbcache:{namespace}`.
pub fn owner_tag(namespace: &str) -> String {
    format!("{GLOBAL_TAG}:{namespace}")
}

/// Namespace-scoped tag: `dbcache:{namespace}:{tag}`.
pub fn scoped_tag(namespace: &str, tag: impl fmt::Display) -> String {
    format!("{GLOBAL_TAG}:{namespace}:{tag}")
}
