// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The storage contracts every cache backend implements.
//!
//! A [`Region`] is a named area of the cache. Backends implement [`DirectAccessRegion`] for the
//! timestamps and query-results regions, and [`DomainDataRegion`] for entity, collection and
//! natural-id data. The higher layers add invalidation semantics on top; regions themselves do
//! no wrapping, locking or soft-locking.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{CacheKey, DomainDataRegionConfig, QueryKey, Result, Timestamp, Value};

/// A table or other logical data set whose modification invalidates cached query results.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QuerySpace(Arc<str>);

impl QuerySpace {
    /// Creates a query space.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the space's name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QuerySpace {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for QuerySpace {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl fmt::Debug for QuerySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for QuerySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named area of the cache.
pub trait Region: Send + Sync + fmt::Debug {
    /// Returns the region's name, as passed to the factory (not prefix-qualified).
    fn name(&self) -> &str;

    /// Evicts every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn clear(&self) -> Result<()>;

    /// Releases the region's backend resources.
    ///
    /// Regions without resources to release keep the default no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn destroy(&self) -> Result<()> {
        Ok(())
    }
}

/// A region whose values are stored and returned as-is.
///
/// All operations are required except [`len`][Self::len] and [`is_empty`][Self::is_empty],
/// which report `None` for backends that do not track size.
pub trait DirectAccessRegion<K, V>: Region {
    /// Gets the value stored for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails. A missing entry is `Ok(None)`.
    fn get_from_cache(&self, key: &K) -> Result<Option<V>>;

    /// Stores `value` for `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn put_into_cache(&self, key: &K, value: V) -> Result<()>;

    /// Evicts the entry stored for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn remove_from_cache(&self, key: &K) -> Result<()>;

    /// Returns the number of entries, if the backend tracks it.
    fn len(&self) -> Option<u64> {
        None
    }

    /// Returns `true` if the region holds no entries, if the backend tracks size.
    fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }
}

/// The region backing a timestamps cache.
pub type TimestampsRegion = dyn DirectAccessRegion<QuerySpace, Timestamp>;

/// The region backing a query results cache.
pub type QueryResultsRegion = dyn DirectAccessRegion<QueryKey, CachedQueryResults>;

/// A result list stored in a query results region, stamped with the caching timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedQueryResults {
    /// The session's caching timestamp at the time of the put.
    pub timestamp: Timestamp,
    /// The cached rows.
    pub results: Vec<Value>,
}

impl CachedQueryResults {
    /// Creates a stamped result list.
    #[must_use]
    pub fn new(timestamp: Timestamp, results: Vec<Value>) -> Self {
        Self { timestamp, results }
    }
}

/// A region holding entity, collection or natural-id data for one or more roles.
pub trait DomainDataRegion: Region {
    /// Returns the configuration the region was built from.
    fn config(&self) -> &DomainDataRegionConfig;

    /// Gets the data stored for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails. A missing entry is `Ok(None)`.
    fn get(&self, key: &CacheKey) -> Result<Option<Value>>;

    /// Stores `value` for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn put(&self, key: &CacheKey, value: Value) -> Result<()>;

    /// Returns `true` if data is stored for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn contains(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Evicts the data stored for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn evict(&self, key: &CacheKey) -> Result<()>;

    /// Evicts all data in the region.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn evict_all(&self) -> Result<()> {
        self.clear()
    }
}
