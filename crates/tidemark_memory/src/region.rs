// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Regions backed by moka.

use std::{fmt, hash::Hash, time::Duration};

use moka::sync::Cache;
use tidemark_region::{CacheKey, DirectAccessRegion, DomainDataRegion, DomainDataRegionConfig, Region, Result, Value};

/// Capacity and expiration bounds applied to a moka cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Bounds {
    pub(crate) max_capacity: Option<u64>,
    pub(crate) initial_capacity: Option<usize>,
    pub(crate) time_to_live: Option<Duration>,
    pub(crate) time_to_idle: Option<Duration>,
}

impl Bounds {
    /// No capacity limit and no expiration.
    pub(crate) const UNBOUNDED: Self = Self {
        max_capacity: None,
        initial_capacity: None,
        time_to_live: None,
        time_to_idle: None,
    };

    fn build<K, V>(&self, qualified_name: &str) -> Cache<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let mut builder = Cache::builder().name(qualified_name);

        if let Some(capacity) = self.max_capacity {
            builder = builder.max_capacity(capacity);
        }

        if let Some(capacity) = self.initial_capacity {
            builder = builder.initial_capacity(capacity);
        }

        if let Some(ttl) = self.time_to_live {
            builder = builder.time_to_live(ttl);
        }

        if let Some(tti) = self.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        builder.build()
    }
}

/// A direct-access region held in process memory.
///
/// Used for both timestamps and query results. Reads and writes never fail.
///
/// # Examples
///
/// ```
/// use tidemark_memory::MemoryRegion;
/// use tidemark_region::{DirectAccessRegion, QuerySpace, Timestamp};
///
/// let region = MemoryRegion::<QuerySpace, Timestamp>::unbounded("timestamps");
/// region.put_into_cache(&QuerySpace::from("person"), Timestamp::new(10))?;
/// assert_eq!(region.get_from_cache(&QuerySpace::from("person"))?, Some(Timestamp::new(10)));
/// # Ok::<(), tidemark_region::Error>(())
/// ```
#[derive(Clone)]
pub struct MemoryRegion<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    name: String,
    inner: Cache<K, V>,
}

impl<K, V> MemoryRegion<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a region with no capacity limit and no expiration.
    #[must_use]
    pub fn unbounded(name: &str) -> Self {
        Self::with_bounds(name, name, Bounds::UNBOUNDED)
    }

    pub(crate) fn with_bounds(name: &str, qualified_name: &str, bounds: Bounds) -> Self {
        Self {
            name: name.to_owned(),
            inner: bounds.build(qualified_name),
        }
    }

    /// Returns the name of the underlying moka cache, which carries the region prefix.
    #[must_use]
    pub fn qualified_name(&self) -> Option<&str> {
        self.inner.name()
    }
}

impl<K, V> fmt::Debug for MemoryRegion<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("name", &self.name)
            .field("entry_count", &self.inner.entry_count())
            .finish_non_exhaustive()
    }
}

impl<K, V> Region for MemoryRegion<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn clear(&self) -> Result<()> {
        self.inner.invalidate_all();
        Ok(())
    }

    fn destroy(&self) -> Result<()> {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks();
        tracing::debug!(region = %self.name, "memory region destroyed");
        Ok(())
    }
}

impl<K, V> DirectAccessRegion<K, V> for MemoryRegion<K, V>
where
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get_from_cache(&self, key: &K) -> Result<Option<V>> {
        Ok(self.inner.get(key))
    }

    fn put_into_cache(&self, key: &K, value: V) -> Result<()> {
        self.inner.insert(key.clone(), value);
        Ok(())
    }

    fn remove_from_cache(&self, key: &K) -> Result<()> {
        self.inner.invalidate(key);
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        self.inner.run_pending_tasks();
        Some(self.inner.entry_count())
    }
}

/// A domain-data region held in process memory.
///
/// All roles listed in the region's configuration share one moka cache; [`CacheKey`] keeps
/// their entries apart.
#[derive(Clone, Debug)]
pub struct MemoryDomainDataRegion {
    config: DomainDataRegionConfig,
    inner: MemoryRegion<CacheKey, Value>,
}

impl MemoryDomainDataRegion {
    pub(crate) fn new(config: DomainDataRegionConfig, qualified_name: &str, bounds: Bounds) -> Self {
        let inner = MemoryRegion::with_bounds(&config.region_name, qualified_name, bounds);
        Self { config, inner }
    }

    /// Returns the number of entries across all roles.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.len().unwrap_or_default()
    }
}

impl Region for MemoryDomainDataRegion {
    fn name(&self) -> &str {
        &self.config.region_name
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }

    fn destroy(&self) -> Result<()> {
        self.inner.destroy()
    }
}

impl DomainDataRegion for MemoryDomainDataRegion {
    fn config(&self) -> &DomainDataRegionConfig {
        &self.config
    }

    fn get(&self, key: &CacheKey) -> Result<Option<Value>> {
        self.inner.get_from_cache(key)
    }

    fn put(&self, key: &CacheKey, value: Value) -> Result<()> {
        self.inner.put_into_cache(key, value)
    }

    fn contains(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.inner.inner.contains_key(key))
    }

    fn evict(&self, key: &CacheKey) -> Result<()> {
        self.inner.remove_from_cache(key)
    }
}
