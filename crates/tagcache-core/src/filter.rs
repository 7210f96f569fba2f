//! Query filters and their fingerprints.
//!
//! A list or page query is identified by everything that changes its result:
//! the filter value, the sort order and the relations preloaded with it. This
//! module turns that triple into a canonical string and digests it into a
//! fixed-length key component.
//!
//! # Sort syntax
//!
//! Sorters are parsed from a comma separated list where each field carries an
//! optional prefix:
//!
//! - `+` or no prefix: ascending
//! - `-`: descending
//! - `*`: custom ordering keyword interpreted by the query itself
//!
//! # Example
//!
//! ```ignore
//! use tagcache_core::filter::{Fingerprint, QueryFilter};
//!
//! let filter = QueryFilter::new(UserFilter { school_id: Some(3) })
//!     .with_sorts("-created_at,+last_name")
//!     .with_preloads(["roles"]);
//!
//! // 32 lowercase hex chars
//! let fingerprint = filter.fingerprint()?;
//! ```

use crate::CacheError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Digest length in bytes (128 bits).
const FINGERPRINT_BYTES: usize = 16;

/// A query description that can be reduced to a stable key component.
pub trait Fingerprint {
    /// Canonical text form. Two semantically equal queries must produce
    /// the same text, independent of map iteration order.
    fn canonical(&self) -> Result<String, CacheError>;

    /// 128-bit digest of [`Fingerprint::canonical`] as lowercase hex.
    fn fingerprint(&self) -> Result<String, CacheError> {
        Ok(digest(&self.canonical()?))
    }
}

/// Digests canonical text to 32 lowercase hex characters.
pub fn digest(canonical: &str) -> String {
    let hash = Sha256::digest(canonical.as_bytes());
    hex::encode(&hash[..FINGERPRINT_BYTES])
}

/// Sort direction for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
    Custom,
}

/// A field and the direction it is sorted by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sorter {
    pub field: String,
    pub order: SortOrder,
}

impl Sorter {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Parses `"+name,-created_at,*rank"` into sorters.
///
/// Blank segments are skipped; a bare prefix with no field is ignored.
pub fn parse_sorts(sorts: &str) -> Vec<Sorter> {
    sorts
        .split(',')
        .map(str::trim)
        .filter_map(|segment| {
            let (order, field) = match segment.as_bytes().first()? {
                b'+' => (SortOrder::Asc, &segment[1..]),
                b'-' => (SortOrder::Desc, &segment[1..]),
                b'*' => (SortOrder::Custom, &segment[1..]),
                _ => (SortOrder::Asc, segment),
            };
            let field = field.trim();
            (!field.is_empty()).then(|| Sorter {
                field: field.to_string(),
                order,
            })
        })
        .collect()
}

/// Filter value plus sort and preload options for a list or page query.
///
/// The filter type should serialize deterministically: use structs or
/// `BTreeMap`s, not `HashMap`s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter<F> {
    filter: F,
    sorters: Vec<Sorter>,
    preloads: Vec<String>,
}

impl<F> QueryFilter<F> {
    pub fn new(filter: F) -> Self {
        Self {
            filter,
            sorters: Vec::new(),
            preloads: Vec::new(),
        }
    }

    /// Replaces the sort order with the parsed `sorts` expression.
    #[must_use]
    pub fn with_sorts(mut self, sorts: &str) -> Self {
        self.sorters = parse_sorts(sorts);
        self
    }

    #[must_use]
    pub fn with_sorters(mut self, sorters: Vec<Sorter>) -> Self {
        self.sorters = sorters;
        self
    }

    #[must_use]
    pub fn with_preloads<I, S>(mut self, preloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preloads = preloads.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    pub fn sorters(&self) -> &[Sorter] {
        &self.sorters
    }

    pub fn preloads(&self) -> &[String] {
        &self.preloads
    }
}

/// Field order here is the canonical order.
#[derive(Serialize)]
struct Canonical<'a, F> {
    filter: &'a F,
    sorters: &'a [Sorter],
    preloads: &'a [String],
}

impl<F: Serialize> Fingerprint for QueryFilter<F> {
    fn canonical(&self) -> Result<String, CacheError> {
        let canonical = Canonical {
            filter: &self.filter,
            sorters: &self.sorters,
            preloads: &self.preloads,
        };
        Ok(serde_json::to_string(&canonical)?)
    }
}

impl Fingerprint for str {
    fn canonical(&self) -> Result<String, CacheError> {
        Ok(self.to_string())
    }
}

impl Fingerprint for String {
    fn canonical(&self) -> Result<String, CacheError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, Default, Serialize)]
    struct UserFilter {
        school_id: Option<u64>,
        name: Option<String>,
    }

    #[test]
    fn test_parse_sorts_prefixes() {
        let sorters = parse_sorts("+name,-created_at,*rank,email");
        assert_eq!(
            sorters,
            vec![
                Sorter::asc("name"),
                Sorter::desc("created_at"),
                Sorter {
                    field: "rank".into(),
                    order: SortOrder::Custom
                },
                Sorter::asc("email"),
            ]
        );
    }

    #[test]
    fn test_parse_sorts_skips_blank_segments() {
        let sorters = parse_sorts(" , -id ,,+, ");
        assert_eq!(sorters, vec![Sorter::desc("id")]);
    }

    #[test]
    fn test_fingerprint_is_fixed_length_hex() {
        let filter = QueryFilter::new(UserFilter::default());
        let fingerprint = filter.fingerprint().unwrap();
        assert_eq!(fingerprint.len(), 32);
        assert!(
            fingerprint
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn test_fingerprint_consistency() {
        let a = QueryFilter::new(UserFilter {
            school_id: Some(1),
            name: None,
        })
        .with_sorts("-id");
        let b = a.clone();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
    }

    #[test]
    fn test_fingerprint_distinguishes_sort_and_preload() {
        let base = QueryFilter::new(UserFilter::default());
        let sorted = base.clone().with_sorts("-id");
        let preloaded = base.clone().with_preloads(["roles"]);

        let fingerprints = [
            base.fingerprint().unwrap(),
            sorted.fingerprint().unwrap(),
            preloaded.fingerprint().unwrap(),
        ];
        assert_ne!(fingerprints[0], fingerprints[1]);
        assert_ne!(fingerprints[0], fingerprints[2]);
        assert_ne!(fingerprints[1], fingerprints[2]);
    }

    #[test]
    fn test_btreemap_filter_is_order_independent() {
        let mut first = BTreeMap::new();
        first.insert("b", 2);
        first.insert("a", 1);
        let mut second = BTreeMap::new();
        second.insert("a", 1);
        second.insert("b", 2);

        assert_eq!(
            QueryFilter::new(first).fingerprint().unwrap(),
            QueryFilter::new(second).fingerprint().unwrap()
        );
    }

    #[test]
    fn test_str_fingerprint() {
        assert_eq!("status=active".fingerprint().unwrap(), digest("status=active"));
    }
}
