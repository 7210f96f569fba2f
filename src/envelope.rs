//! Stored result shapes.
//!
//! Every query cache entry is one of four shapes, serialized as JSON text with
//! the shape name as the single top-level field:
//!
//! ```json
//! {"paginate": {"items": [...], "total": 120}}
//! {"list": {"items": [...]}}
//! {"first": {"item": {...}}}
//! {"remember": {"data": ...}}
//! ```
//!
//! Decoding is driven by the [`Operation`] encoded in the cache key, never by
//! looking at which field happens to be present.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tagcache_core::{CacheError, Operation};

/// One cached query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Envelope<E> {
    #[serde(rename = "paginate")]
    Paginated { items: Vec<E>, total: u64 },

    #[serde(rename = "list")]
    Listed { items: Vec<E> },

    #[serde(rename = "first")]
    Single { item: Option<E> },

    #[serde(rename = "remember")]
    Arbitrary { data: serde_json::Value },
}

#[derive(Deserialize)]
struct PageBody<E> {
    items: Vec<E>,
    total: u64,
}

#[derive(Deserialize)]
struct ListBody<E> {
    items: Vec<E>,
}

#[derive(Deserialize)]
struct FirstBody<E> {
    item: Option<E>,
}

#[derive(Deserialize)]
struct RememberBody {
    data: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct PaginateDoc<E> {
    paginate: PageBody<E>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ListDoc<E> {
    list: ListBody<E>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FirstDoc<E> {
    first: FirstBody<E>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RememberDoc {
    remember: RememberBody,
}

impl<E> Envelope<E> {
    /// Operation whose entries carry this shape.
    pub fn operation(&self) -> Operation {
        match self {
            Self::Paginated { .. } => Operation::Paginate,
            Self::Listed { .. } => Operation::List,
            Self::Single { .. } => Operation::First,
            Self::Arbitrary { .. } => Operation::Remember,
        }
    }

    pub fn into_paginated(self) -> Result<(Vec<E>, u64), CacheError> {
        match self {
            Self::Paginated { items, total } => Ok((items, total)),
            other => Err(mismatch(Operation::Paginate, other.operation())),
        }
    }

    pub fn into_listed(self) -> Result<Vec<E>, CacheError> {
        match self {
            Self::Listed { items } => Ok(items),
            other => Err(mismatch(Operation::List, other.operation())),
        }
    }

    pub fn into_single(self) -> Result<Option<E>, CacheError> {
        match self {
            Self::Single { item } => Ok(item),
            other => Err(mismatch(Operation::First, other.operation())),
        }
    }

    pub fn into_arbitrary<T: DeserializeOwned>(self) -> Result<T, CacheError> {
        match self {
            Self::Arbitrary { data } => serde_json::from_value(data).map_err(|e| {
                CacheError::CorruptEntry(format!("remember entry does not fit the requested type: {e}"))
            }),
            other => Err(mismatch(Operation::Remember, other.operation())),
        }
    }
}

impl<E: Serialize> Envelope<E> {
    /// Serializes the envelope to the text stored in the cache.
    pub fn encode(&self) -> Result<String, CacheError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<E: DeserializeOwned> Envelope<E> {
    /// Parses `text` as the shape produced by `operation`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::CorruptEntry` if the text is not that shape.
    pub fn decode(text: &str, operation: Operation) -> Result<Self, CacheError> {
        let corrupt = |e: serde_json::Error| {
            CacheError::CorruptEntry(format!("{operation} entry does not parse: {e}"))
        };

        let envelope = match operation {
            Operation::Paginate => {
                let doc: PaginateDoc<E> = serde_json::from_str(text).map_err(corrupt)?;
                Self::Paginated {
                    items: doc.paginate.items,
                    total: doc.paginate.total,
                }
            }
            Operation::List => {
                let doc: ListDoc<E> = serde_json::from_str(text).map_err(corrupt)?;
                Self::Listed {
                    items: doc.list.items,
                }
            }
            Operation::First => {
                let doc: FirstDoc<E> = serde_json::from_str(text).map_err(corrupt)?;
                Self::Single {
                    item: doc.first.item,
                }
            }
            Operation::Remember => {
                let doc: RememberDoc = serde_json::from_str(text).map_err(corrupt)?;
                Self::Arbitrary {
                    data: doc.remember.data,
                }
            }
        };

        Ok(envelope)
    }
}

fn mismatch(expected: Operation, found: Operation) -> CacheError {
    CacheError::CorruptEntry(format!("expected {expected} entry, found {found}"))
}
