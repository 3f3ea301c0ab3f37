// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The in-memory region factory.

use std::sync::Arc;

use tidemark_region::{
    AccessType, CacheSettings, CacheTransactionSynchronization, DomainDataRegion, DomainDataRegionConfig,
    FactoryLifecycle, QueryResultsRegion, RegionFactory, Result, Timestamp, TimestampSource, TimestampsRegion,
};

use crate::{
    builder::MemoryRegionFactoryBuilder,
    region::{Bounds, MemoryDomainDataRegion, MemoryRegion},
};

/// A region factory keeping every region in process memory.
///
/// # Examples
///
/// ```
/// use tidemark_memory::MemoryRegionFactory;
/// use tidemark_region::{CacheSettings, RegionFactory};
///
/// let factory = MemoryRegionFactory::new();
/// factory.start(&CacheSettings::new().with_region_prefix("app"))?;
///
/// let results = factory.build_query_results_region("people")?;
/// assert_eq!(results.name(), "people");
/// assert_eq!(factory.qualify("people"), "app.people");
///
/// factory.stop();
/// # Ok::<(), tidemark_region::Error>(())
/// ```
#[derive(Debug)]
pub struct MemoryRegionFactory {
    lifecycle: FactoryLifecycle,
    bounds: Bounds,
    minimal_puts_by_default: bool,
    default_access_type: AccessType,
    timestamper: Arc<dyn TimestampSource>,
}

impl MemoryRegionFactory {
    /// Creates a factory for unbounded regions driven by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring the factory.
    #[must_use]
    pub fn builder() -> MemoryRegionFactoryBuilder {
        MemoryRegionFactoryBuilder::new()
    }

    pub(crate) fn from_parts(
        bounds: Bounds,
        minimal_puts_by_default: bool,
        default_access_type: AccessType,
        timestamper: Arc<dyn TimestampSource>,
    ) -> Self {
        Self {
            lifecycle: FactoryLifecycle::new("memory"),
            bounds,
            minimal_puts_by_default,
            default_access_type,
            timestamper,
        }
    }
}

impl Default for MemoryRegionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionFactory for MemoryRegionFactory {
    fn start(&self, settings: &CacheSettings) -> Result<()> {
        self.lifecycle.start(settings, |settings| {
            tracing::info!(
                prefix = settings.region_prefix.as_deref().unwrap_or_default(),
                max_capacity = self.bounds.max_capacity,
                "starting in-memory region factory"
            );
            Ok(())
        })
    }

    fn stop(&self) {
        self.lifecycle.stop(|| tracing::info!("stopping in-memory region factory"));
    }

    fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    fn is_minimal_puts_enabled_by_default(&self) -> bool {
        self.minimal_puts_by_default
    }

    fn default_access_type(&self) -> AccessType {
        self.default_access_type
    }

    fn qualify(&self, region_name: &str) -> String {
        self.lifecycle.qualify(region_name)
    }

    fn next_timestamp(&self) -> Timestamp {
        self.timestamper.next()
    }

    fn timeout(&self) -> u64 {
        self.timestamper.timeout()
    }

    fn create_transaction_context(&self) -> Box<dyn CacheTransactionSynchronization> {
        FactoryLifecycle::standard_transaction_context(Arc::clone(&self.timestamper))
    }

    fn build_domain_data_region(&self, config: &DomainDataRegionConfig) -> Result<Arc<dyn DomainDataRegion>> {
        self.lifecycle.verify_started()?;
        let qualified = self.qualify(&config.region_name);
        tracing::debug!(region = %qualified, roles = config.roles().count(), "building domain-data region");
        Ok(Arc::new(MemoryDomainDataRegion::new(config.clone(), &qualified, self.bounds)))
    }

    fn build_query_results_region(&self, region_name: &str) -> Result<Arc<QueryResultsRegion>> {
        self.lifecycle.verify_started()?;
        let qualified = self.qualify(region_name);
        tracing::debug!(region = %qualified, "building query results region");
        Ok(Arc::new(MemoryRegion::with_bounds(region_name, &qualified, self.bounds)))
    }

    fn build_timestamps_region(&self, region_name: &str) -> Result<Arc<TimestampsRegion>> {
        self.lifecycle.verify_started()?;
        let qualified = self.qualify(region_name);
        tracing::debug!(region = %qualified, "building timestamps region");
        Ok(Arc::new(MemoryRegion::with_bounds(region_name, &qualified, Bounds::UNBOUNDED)))
    }
}
