// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder wiring a region factory, settings and telemetry into a started [`CacheManager`].

use std::sync::Arc;

use tidemark_region::{CacheSettings, DomainDataRegionConfig, RegionFactory, Result};

use crate::{manager::CacheManager, telemetry::CacheTelemetry};

/// Builder for a [`CacheManager`].
///
/// Without an explicit [`region_factory`][Self::region_factory] the in-memory factory is used
/// when the `memory` feature is enabled.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use tidemark::{CacheManager, CacheSettings, CacheTelemetry, MemoryRegionFactory};
///
/// let manager = CacheManager::builder()
///     .region_factory(Arc::new(MemoryRegionFactory::builder().max_capacity(1_000).build()))
///     .settings(CacheSettings::new().with_query_cache(true).with_region_prefix("app"))
///     .telemetry(CacheTelemetry::disabled())
///     .build()?;
///
/// assert!(manager.is_query_cache_enabled());
/// # Ok::<(), tidemark::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct CacheManagerBuilder {
    factory: Option<Arc<dyn RegionFactory>>,
    settings: CacheSettings,
    telemetry: CacheTelemetry,
    regions: Vec<DomainDataRegionConfig>,
}

impl CacheManagerBuilder {
    /// Creates a builder with default settings and telemetry enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the region factory backing every region.
    #[must_use]
    pub fn region_factory(mut self, factory: Arc<dyn RegionFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets the cache settings. Defaults to [`CacheSettings::default`].
    #[must_use]
    pub fn settings(mut self, settings: CacheSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the telemetry sink.
    #[must_use]
    pub fn telemetry(mut self, telemetry: CacheTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Adds a domain-data region to build once the manager has started.
    #[must_use]
    pub fn domain_data_region(mut self, config: DomainDataRegionConfig) -> Self {
        self.regions.push(config);
        self
    }

    /// Starts the factory and builds the configured regions.
    ///
    /// # Errors
    ///
    /// Returns an error if no factory is available, if the factory fails to start, or if a
    /// region cannot be built. A manager that fails while priming is closed before returning.
    pub fn build(self) -> Result<CacheManager> {
        let factory = match self.factory {
            Some(factory) => factory,
            None => default_factory()?,
        };

        let manager = CacheManager::start(factory, self.settings, self.telemetry)?;
        if let Err(error) = manager.prime(self.regions) {
            if let Err(close_error) = manager.close() {
                tracing::warn!(error = %close_error, "failed to close cache manager after priming error");
            }
            return Err(error);
        }
        Ok(manager)
    }
}

#[cfg(feature = "memory")]
fn default_factory() -> Result<Arc<dyn RegionFactory>> {
    Ok(Arc::new(tidemark_memory::MemoryRegionFactory::new()))
}

#[cfg(not(feature = "memory"))]
fn default_factory() -> Result<Arc<dyn RegionFactory>> {
    Err(tidemark_region::Error::configuration(
        "no region factory configured and the `memory` feature is disabled",
    ))
}
