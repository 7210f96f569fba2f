//! Invalidation requests for a query cache namespace.

use tagcache_core::Operation;
use tagcache_core::keys::{owner_tag, scoped_tag};

/// What a [`QueryCache::clear`](crate::QueryCache::clear) call invalidates.
///
/// `all` dominates every other field. A request that names nothing flushes the
/// whole namespace too.
///
/// # Example
///
/// ```ignore
/// // user 5 changed: drop its entry and every aggregate view
/// cache.clear(&ClearSpec::ids([5])).await?;
///
/// // only the cached report
/// cache.clear(&ClearSpec::keys(["report:2024"])).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearSpec {
    pub ids: Vec<u64>,
    pub keys: Vec<String>,
    pub tags: Vec<String>,
    pub paginate: bool,
    pub list: bool,
    pub remember: bool,
    pub all: bool,
}

impl ClearSpec {
    /// Flushes the whole namespace.
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    /// Entities by id, plus the paginate, list and remember entries that may
    /// contain them.
    pub fn ids(ids: impl IntoIterator<Item = u64>) -> Self {
        Self::default().with_ids(ids)
    }

    /// Entries whose free-form key is in `keys`.
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_keys(keys)
    }

    /// Entries carrying any of the raw `tags`.
    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_tags(tags)
    }

    #[must_use]
    pub fn with_ids(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.ids.extend(ids);
        self.paginate = true;
        self.list = true;
        self.remember = true;
        self
    }

    #[must_use]
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys.extend(keys.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_paginate(mut self) -> Self {
        self.paginate = true;
        self
    }

    #[must_use]
    pub fn with_list(mut self) -> Self {
        self.list = true;
        self
    }

    #[must_use]
    pub fn with_remember(mut self) -> Self {
        self.remember = true;
        self
    }

    /// Returns `true` if no target is named.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
            && self.keys.is_empty()
            && self.tags.is_empty()
            && !self.paginate
            && !self.list
            && !self.remember
    }

    /// Returns `true` if this request flushes the whole namespace.
    pub fn flushes_namespace(&self) -> bool {
        self.all || self.is_empty()
    }

    /// Tags to invalidate for `namespace`; entries carrying any of them go.
    pub fn resolve(&self, namespace: &str) -> Vec<String> {
        if self.flushes_namespace() {
            return vec![owner_tag(namespace)];
        }

        let mut tags = Vec::with_capacity(self.ids.len() + self.keys.len() + self.tags.len() + 3);
        tags.extend(self.ids.iter().map(|id| scoped_tag(namespace, id)));
        tags.extend(self.keys.iter().map(|key| scoped_tag(namespace, key)));
        tags.extend(self.tags.iter().cloned());

        let shapes = [
            (self.paginate, Operation::Paginate),
            (self.list, Operation::List),
            (self.remember, Operation::Remember),
        ];
        for (flagged, operation) in shapes {
            if flagged {
                tags.push(scoped_tag(namespace, operation));
            }
        }

        tags.sort_unstable();
        tags.dedup();
        tags
    }
}
