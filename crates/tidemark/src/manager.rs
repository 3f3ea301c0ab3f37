// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The cache manager owning every region of one cache.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::RwLock;
use tidemark_region::{
    CacheSettings, CacheTransactionSynchronization, DomainDataRegion, DomainDataRegionConfig, RegionFactory, Result,
};

use crate::{
    builder::CacheManagerBuilder,
    query_results::QueryResultsCache,
    telemetry::{CacheActivity, CacheOperation, CacheTelemetry},
    timestamps::{DisabledTimestampsCache, EnabledTimestampsCache, TimestampsCache, activity_of},
};

/// Owns the region factory and every region built from it.
///
/// The manager starts the factory when it is built and stops it on [`close`][Self::close].
/// With query caching on it holds an [`EnabledTimestampsCache`] and a default
/// [`QueryResultsCache`]; named query results caches are created on first use. Domain-data
/// regions are built up front by [`prime`][Self::prime].
///
/// # Examples
///
/// ```
/// use tidemark::{AccessType, CacheManager, CacheSettings, DomainDataRegionConfig};
///
/// let manager = CacheManager::builder()
///     .settings(CacheSettings::new().with_query_cache(true))
///     .build()?;
///
/// manager.prime([DomainDataRegionConfig::new("people").with_entity("Person", AccessType::ReadWrite)])?;
/// let reports = manager.query_results_cache(Some("reports"))?.expect("query cache is enabled");
/// assert_eq!(reports.region_name(), "reports");
///
/// assert!(manager.region_names().contains("people"));
/// manager.close()?;
/// # Ok::<(), tidemark::Error>(())
/// ```
pub struct CacheManager {
    factory: Arc<dyn RegionFactory>,
    settings: CacheSettings,
    telemetry: CacheTelemetry,
    minimal_puts: bool,
    timestamps: Arc<dyn TimestampsCache>,
    default_query_results: Option<Arc<QueryResultsCache>>,
    named_query_results: RwLock<BTreeMap<String, Arc<QueryResultsCache>>>,
    domain_data: RwLock<BTreeMap<String, Arc<dyn DomainDataRegion>>>,
    closed: AtomicBool,
}

impl CacheManager {
    /// Creates a builder for a cache manager.
    #[must_use]
    pub fn builder() -> CacheManagerBuilder {
        CacheManagerBuilder::new()
    }

    pub(crate) fn start(factory: Arc<dyn RegionFactory>, settings: CacheSettings, telemetry: CacheTelemetry) -> Result<Self> {
        let caching_enabled = settings.use_second_level_cache || settings.use_query_cache;
        if caching_enabled {
            factory.start(&settings)?;
        }

        let minimal_puts = settings.minimal_puts_or(factory.is_minimal_puts_enabled_by_default());

        let query_caches = if settings.use_query_cache {
            Self::build_query_caches(&factory, &settings, minimal_puts, telemetry).inspect_err(|_| factory.stop())?
        } else {
            (Arc::new(DisabledTimestampsCache) as Arc<dyn TimestampsCache>, None)
        };
        let (timestamps, default_query_results) = query_caches;

        tracing::info!(
            second_level_cache = settings.use_second_level_cache,
            query_cache = settings.use_query_cache,
            minimal_puts,
            "cache manager started"
        );

        Ok(Self {
            factory,
            settings,
            telemetry,
            minimal_puts,
            timestamps,
            default_query_results,
            named_query_results: RwLock::new(BTreeMap::new()),
            domain_data: RwLock::new(BTreeMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    fn build_query_caches(
        factory: &Arc<dyn RegionFactory>,
        settings: &CacheSettings,
        minimal_puts: bool,
        telemetry: CacheTelemetry,
    ) -> Result<(Arc<dyn TimestampsCache>, Option<Arc<QueryResultsCache>>)> {
        let timestamps_region = factory.build_timestamps_region(&settings.timestamps_region)?;
        let timestamps: Arc<dyn TimestampsCache> = Arc::new(EnabledTimestampsCache::new(
            timestamps_region,
            Arc::clone(factory),
            telemetry,
        ));

        let results_region = factory.build_query_results_region(&settings.query_results_region)?;
        let default_query_results = Arc::new(QueryResultsCache::new(
            results_region,
            Arc::clone(&timestamps),
            minimal_puts,
            telemetry,
        ));

        Ok((timestamps, Some(default_query_results)))
    }

    /// Returns the settings the manager was built with.
    #[must_use]
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Returns the region factory.
    #[must_use]
    pub fn region_factory(&self) -> &Arc<dyn RegionFactory> {
        &self.factory
    }

    /// Returns the telemetry sink shared by the manager's caches.
    #[must_use]
    pub fn telemetry(&self) -> CacheTelemetry {
        self.telemetry
    }

    /// Returns `true` if query results are cached.
    #[must_use]
    pub fn is_query_cache_enabled(&self) -> bool {
        self.settings.use_query_cache
    }

    /// Returns `true` if entity, collection and natural-id data is cached.
    #[must_use]
    pub fn is_second_level_cache_enabled(&self) -> bool {
        self.settings.use_second_level_cache
    }

    /// Returns `true` if query results caches skip puts that would not change stored results.
    #[must_use]
    pub fn is_minimal_puts_enabled(&self) -> bool {
        self.minimal_puts
    }

    /// Returns `true` once [`close`][Self::close] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Builds the domain-data regions described by `configs`.
    ///
    /// Configs without roles and regions that already exist are skipped. With the second-level
    /// cache disabled nothing is built.
    ///
    /// # Errors
    ///
    /// Returns an error if the factory fails to build a region. Regions built before the
    /// failure stay registered.
    pub fn prime(&self, configs: impl IntoIterator<Item = DomainDataRegionConfig>) -> Result<()> {
        if !self.settings.use_second_level_cache {
            tracing::debug!("second-level cache is disabled, skipping region priming");
            return Ok(());
        }

        for config in configs {
            if config.is_empty() {
                tracing::debug!(region = %config.region_name, "skipping domain-data region without roles");
                continue;
            }

            let mut regions = self.domain_data.write();
            if regions.contains_key(&config.region_name) {
                tracing::warn!(region = %config.region_name, "domain-data region already primed");
                continue;
            }

            let region = self.factory.build_domain_data_region(&config)?;
            regions.insert(config.region_name, region);
        }
        Ok(())
    }

    /// Returns the timestamps cache. Disabled when query caching is off.
    #[must_use]
    pub fn timestamps_cache(&self) -> &Arc<dyn TimestampsCache> {
        &self.timestamps
    }

    /// Returns the default query results cache, if query caching is on.
    #[must_use]
    pub fn default_query_results_cache(&self) -> Option<Arc<QueryResultsCache>> {
        self.default_query_results.clone()
    }

    /// Returns the query results cache for `region_name`, creating its region on first use.
    ///
    /// `None` or the default region's name selects the default cache. Returns `Ok(None)` when
    /// query caching is off.
    ///
    /// # Errors
    ///
    /// Returns an error if the factory fails to build the region, e.g. after [`close`][Self::close].
    pub fn query_results_cache(&self, region_name: Option<&str>) -> Result<Option<Arc<QueryResultsCache>>> {
        let Some(default) = &self.default_query_results else {
            return Ok(None);
        };

        let name = match region_name {
            Some(name) if name != self.settings.query_results_region => name,
            _ => return Ok(Some(Arc::clone(default))),
        };

        if let Some(cache) = self.named_query_results.read().get(name) {
            return Ok(Some(Arc::clone(cache)));
        }

        let mut named = self.named_query_results.write();
        if let Some(cache) = named.get(name) {
            return Ok(Some(Arc::clone(cache)));
        }

        let region = self.factory.build_query_results_region(name)?;
        let cache = Arc::new(QueryResultsCache::new(
            region,
            Arc::clone(&self.timestamps),
            self.minimal_puts,
            self.telemetry,
        ));
        named.insert(name.to_owned(), Arc::clone(&cache));
        Ok(Some(cache))
    }

    /// Returns the query results cache for `region_name` only if it already exists.
    #[must_use]
    pub fn query_results_cache_strictly(&self, region_name: &str) -> Option<Arc<QueryResultsCache>> {
        if region_name == self.settings.query_results_region {
            return self.default_query_results.clone();
        }
        self.named_query_results.read().get(region_name).cloned()
    }

    /// Returns the domain-data region named `region_name`, if primed.
    #[must_use]
    pub fn domain_data_region(&self, region_name: &str) -> Option<Arc<dyn DomainDataRegion>> {
        self.domain_data.read().get(region_name).cloned()
    }

    /// Returns the unqualified names of every region the manager holds.
    #[must_use]
    pub fn region_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        if let Some(region) = self.timestamps.region() {
            names.insert(region.name().to_owned());
        }
        if let Some(cache) = &self.default_query_results {
            names.insert(cache.region_name().to_owned());
        }
        names.extend(self.named_query_results.read().keys().cloned());
        names.extend(self.domain_data.read().keys().cloned());
        names
    }

    /// Evicts every cached query result, in the default and all named regions.
    ///
    /// # Errors
    ///
    /// Returns the first backend failure; every region is still attempted.
    pub fn evict_query_regions(&self) -> Result<()> {
        let mut outcome = self.evict_default_query_region();
        for cache in self.named_query_results.read().values() {
            keep_first_error(&mut outcome, cache.clear());
        }
        outcome
    }

    /// Evicts every result in the default query results region.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn evict_default_query_region(&self) -> Result<()> {
        self.default_query_results.as_ref().map_or(Ok(()), |cache| cache.clear())
    }

    /// Evicts every result in the query results region named `region_name`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn evict_query_region(&self, region_name: &str) -> Result<()> {
        match self.query_results_cache_strictly(region_name) {
            Some(cache) => cache.clear(),
            None => {
                tracing::debug!(region = region_name, "no query results region to evict");
                Ok(())
            }
        }
    }

    /// Evicts all data in the domain-data region named `region_name`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn evict_domain_data_region(&self, region_name: &str) -> Result<()> {
        match self.domain_data_region(region_name) {
            Some(region) => {
                let outcome = region.evict_all();
                self.telemetry
                    .record(region.name(), CacheOperation::Clear, activity_of(&outcome));
                outcome
            }
            None => {
                tracing::debug!(region = region_name, "no domain-data region to evict");
                Ok(())
            }
        }
    }

    /// Evicts everything: domain data, query results and timestamps.
    ///
    /// # Errors
    ///
    /// Returns the first backend failure; every region is still attempted.
    pub fn evict_all_regions(&self) -> Result<()> {
        let names: Vec<String> = self.domain_data.read().keys().cloned().collect();
        let mut outcome = Ok(());
        for name in names {
            keep_first_error(&mut outcome, self.evict_domain_data_region(&name));
        }
        keep_first_error(&mut outcome, self.evict_query_regions());
        keep_first_error(&mut outcome, self.timestamps.clear());
        outcome
    }

    /// Creates the transaction synchronization for a new session.
    #[must_use]
    pub fn create_transaction_context(&self) -> Box<dyn CacheTransactionSynchronization> {
        self.factory.create_transaction_context()
    }

    /// Destroys every region and stops the factory.
    ///
    /// Closing a closed manager does nothing.
    ///
    /// # Errors
    ///
    /// Returns the first failure to destroy a region; every region is still destroyed and the
    /// factory is stopped regardless.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("cache manager already closed");
            return Ok(());
        }

        let mut outcome = Ok(());
        for (name, region) in std::mem::take(&mut *self.domain_data.write()) {
            let destroyed = region.destroy();
            self.telemetry
                .record(&name, CacheOperation::Destroy, activity_of(&destroyed));
            keep_first_error(&mut outcome, destroyed);
        }
        for cache in std::mem::take(&mut *self.named_query_results.write()).into_values() {
            keep_first_error(&mut outcome, cache.destroy());
        }
        if let Some(cache) = &self.default_query_results {
            keep_first_error(&mut outcome, cache.destroy());
        }
        keep_first_error(&mut outcome, self.timestamps.destroy());

        if self.factory.is_started() {
            self.factory.stop();
        }

        if let Err(error) = &outcome {
            self.telemetry.record("cache-manager", CacheOperation::Destroy, CacheActivity::Error);
            tracing::warn!(%error, "cache manager closed with errors");
        } else {
            tracing::info!("cache manager closed");
        }
        outcome
    }
}

fn keep_first_error(outcome: &mut Result<()>, next: Result<()>) {
    if let Err(error) = next {
        if outcome.is_ok() {
            *outcome = Err(error);
        } else {
            tracing::warn!(%error, "additional cache failure");
        }
    }
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("factory", &self.factory)
            .field("settings", &self.settings)
            .field("regions", &self.region_names())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
