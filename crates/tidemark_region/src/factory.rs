// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The contract between the cache manager and a cache backend.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

use parking_lot::RwLock;

use crate::{
    AccessType, CacheSettings, CacheTransactionSynchronization, DomainDataRegion, DomainDataRegionConfig, Error,
    QueryResultsRegion, Result, StandardCacheTransactionSynchronization, Timestamp, TimestampSource, TimestampsRegion,
};

/// Builds regions, hands out timestamps and owns the backend's lifecycle.
///
/// The cache manager calls [`start`][Self::start] once before building any region and
/// [`stop`][Self::stop] once at shutdown. Implementations usually delegate the lifecycle
/// bookkeeping to a [`FactoryLifecycle`].
pub trait RegionFactory: Send + Sync + fmt::Debug {
    /// Starts the backend.
    ///
    /// Starting an already started factory logs a warning and does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be started.
    fn start(&self, settings: &CacheSettings) -> Result<()>;

    /// Stops the backend. Stopping a stopped factory logs a warning and does nothing.
    fn stop(&self);

    /// Returns `true` between a successful start and the following stop.
    fn is_started(&self) -> bool;

    /// Returns whether minimal puts are on when the settings do not say.
    fn is_minimal_puts_enabled_by_default(&self) -> bool {
        false
    }

    /// Returns the access type used for roles that do not name one.
    fn default_access_type(&self) -> AccessType {
        AccessType::ReadWrite
    }

    /// Applies the configured region prefix to `region_name`.
    fn qualify(&self, region_name: &str) -> String;

    /// Returns the next timestamp. Never lower than any value returned before.
    fn next_timestamp(&self) -> Timestamp;

    /// Returns how far ahead of [`next_timestamp`][Self::next_timestamp] a pre-invalidation
    /// reaches, in timestamp ticks.
    fn timeout(&self) -> u64;

    /// Creates the transaction synchronization for a new session.
    fn create_transaction_context(&self) -> Box<dyn CacheTransactionSynchronization>;

    /// Builds a region for entity, collection and natural-id data.
    ///
    /// # Errors
    ///
    /// Returns an error if the factory is not started or the backend fails.
    fn build_domain_data_region(&self, config: &DomainDataRegionConfig) -> Result<Arc<dyn DomainDataRegion>>;

    /// Builds a region for cached query results.
    ///
    /// # Errors
    ///
    /// Returns an error if the factory is not started or the backend fails.
    fn build_query_results_region(&self, region_name: &str) -> Result<Arc<QueryResultsRegion>>;

    /// Builds the region recording per-space invalidation timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error if the factory is not started or the backend fails.
    fn build_timestamps_region(&self, region_name: &str) -> Result<Arc<TimestampsRegion>>;
}

const STOPPED: u8 = 0;
// A start or stop is in progress.
const BUSY: u8 = 1;
const STARTED: u8 = 2;

/// Start and stop bookkeeping shared by region factories.
///
/// Tracks whether the factory is started, keeps the settings it was started with and
/// applies the region prefix. The factory only counts as started once `prepare` has
/// succeeded; while it runs, [`verify_started`][Self::verify_started] still fails.
///
/// # Examples
///
/// ```
/// use tidemark_region::{CacheSettings, FactoryLifecycle};
///
/// let lifecycle = FactoryLifecycle::new("example");
/// assert!(lifecycle.verify_started().is_err());
///
/// lifecycle.start(&CacheSettings::new().with_region_prefix("app"), |_| Ok(())).unwrap();
/// assert_eq!(lifecycle.qualify("people"), "app.people");
///
/// lifecycle.stop(|| {});
/// assert!(!lifecycle.is_started());
/// ```
#[derive(Debug)]
pub struct FactoryLifecycle {
    factory: &'static str,
    state: AtomicU8,
    settings: RwLock<Option<CacheSettings>>,
}

impl FactoryLifecycle {
    /// Creates the bookkeeping for a factory named `factory`, used in diagnostics.
    #[must_use]
    pub fn new(factory: &'static str) -> Self {
        Self {
            factory,
            state: AtomicU8::new(STOPPED),
            settings: RwLock::new(None),
        }
    }

    /// Marks the factory started and runs `prepare`.
    ///
    /// The settings are visible to [`qualify`][Self::qualify] while `prepare` runs. If the
    /// factory is already started or starting, logs a warning and does not run `prepare`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::start_failed`] wrapping the failure of `prepare`; the factory stays stopped.
    pub fn start(&self, settings: &CacheSettings, prepare: impl FnOnce(&CacheSettings) -> Result<()>) -> Result<()> {
        if self
            .state
            .compare_exchange(STOPPED, BUSY, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(factory = self.factory, "attempted to restart an already started region factory");
            return Ok(());
        }

        *self.settings.write() = Some(settings.clone());
        if let Err(error) = prepare(settings) {
            *self.settings.write() = None;
            self.state.store(STOPPED, Ordering::Release);
            return Err(Error::start_failed(error));
        }

        self.state.store(STARTED, Ordering::Release);
        tracing::debug!(factory = self.factory, "region factory started");
        Ok(())
    }

    /// Marks the factory stopped and runs `release`.
    ///
    /// Regions can no longer be built once `release` runs. If the factory is already stopped, logs a warning and does not run `release`.
    pub fn stop(&self, release: impl FnOnce()) {
        if self
            .state
            .compare_exchange(STARTED, BUSY, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(factory = self.factory, "attempted to stop an already stopped region factory");
            return;
        }

        release();
        *self.settings.write() = None;
        self.state.store(STOPPED, Ordering::Release);
        tracing::debug!(factory = self.factory, "region factory stopped");
    }

    /// Returns `true` if the factory is started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state.load(Ordering::Acquire) == STARTED
    }

    /// Returns an error unless the factory is started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::not_started`] if the factory is stopped.
    pub fn verify_started(&self) -> Result<()> {
        if self.is_started() {
            Ok(())
        } else {
            Err(Error::not_started())
        }
    }

    /// Returns the settings the factory was started with.
    #[must_use]
    pub fn settings(&self) -> Option<CacheSettings> {
        self.settings.read().clone()
    }

    /// Prefixes `region_name` with the configured region prefix, as `prefix.name`.
    #[must_use]
    pub fn qualify(&self, region_name: &str) -> String {
        match self.settings.read().as_ref().and_then(|s| s.region_prefix.as_deref()) {
            Some(prefix) => format!("{prefix}.{region_name}"),
            None => region_name.to_owned(),
        }
    }

    /// Creates the standard transaction synchronization over `source`.
    #[must_use]
    pub fn standard_transaction_context(
        source: Arc<dyn TimestampSource>,
    ) -> Box<dyn CacheTransactionSynchronization> {
        Box::new(StandardCacheTransactionSynchronization::new(source))
    }
}
