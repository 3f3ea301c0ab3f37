// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test doubles for regions, region factories and clocks.
//!
//! [`MockRegion`] is an in-memory direct-access region that records every operation and
//! supports failure injection. [`MockRegionFactory`] builds mock regions and keeps handles to
//! them so tests can inspect what the caches wrote. [`ManualTimestamper`] is a clock the test
//! advances explicitly.

use std::{
    collections::HashMap,
    fmt,
    hash::Hash,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;

use crate::{
    CacheKey, CacheSettings, CacheTransactionSynchronization, CachedQueryResults, DirectAccessRegion, DomainDataRegion,
    DomainDataRegionConfig, Error, FactoryLifecycle, QueryKey, QueryResultsRegion, QuerySpace, Region, RegionFactory,
    Result, Timestamp, TimestampSource, TimestampsRegion, Value, timestamp::DEFAULT_TIMEOUT,
};

/// A recorded region operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionOp<K, V> {
    /// A read of the given key.
    Get(K),
    /// A write of the given key and value.
    Put {
        /// The key written.
        key: K,
        /// The value written.
        value: V,
    },
    /// An eviction of the given key.
    Remove(K),
    /// A clear of the whole region.
    Clear,
    /// Destruction of the region.
    Destroy,
}

type FailPredicate<K, V> = Box<dyn Fn(&RegionOp<K, V>) -> bool + Send + Sync>;

/// An in-memory direct-access region for tests.
///
/// Clones share storage, recorded operations and the failure predicate.
///
/// # Examples
///
/// ```
/// use tidemark_region::{DirectAccessRegion, testing::{MockRegion, RegionOp}};
///
/// let region = MockRegion::<String, i64>::new("numbers");
/// region.put_into_cache(&"one".to_owned(), 1).unwrap();
/// assert_eq!(region.get_from_cache(&"one".to_owned()).unwrap(), Some(1));
///
/// region.fail_when(|op| matches!(op, RegionOp::Get(_)));
/// assert!(region.get_from_cache(&"one".to_owned()).is_err());
/// ```
pub struct MockRegion<K, V> {
    name: Arc<str>,
    data: Arc<Mutex<HashMap<K, V>>>,
    operations: Arc<Mutex<Vec<RegionOp<K, V>>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<K, V>>>>,
}

impl<K, V> MockRegion<K, V> {
    /// Creates an empty mock region.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            data: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Makes every operation matching `predicate` fail with a backend error.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&RegionOp<K, V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Removes the failure predicate.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Forgets all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    fn check(&self, op: RegionOp<K, V>) -> Result<()> {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        self.operations.lock().push(op);
        if fail {
            Err(Error::backend(&*self.name, "mock region failure"))
        } else {
            Ok(())
        }
    }
}

impl<K: Clone, V: Clone> MockRegion<K, V> {
    /// Returns the operations recorded so far.
    #[must_use]
    pub fn operations(&self) -> Vec<RegionOp<K, V>> {
        self.operations.lock().clone()
    }
}

impl<K: Eq + Hash, V: Clone> MockRegion<K, V> {
    /// Reads an entry without recording an operation.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<V> {
        self.data.lock().get(key).cloned()
    }
}

impl<K, V> Clone for MockRegion<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for MockRegion<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockRegion")
            .field("name", &self.name)
            .field("data", &self.data)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl<K, V> Region for MockRegion<K, V>
where
    K: fmt::Debug + Send + Sync,
    V: fmt::Debug + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn clear(&self) -> Result<()> {
        self.check(RegionOp::Clear)?;
        self.data.lock().clear();
        Ok(())
    }

    fn destroy(&self) -> Result<()> {
        self.check(RegionOp::Destroy)?;
        self.data.lock().clear();
        Ok(())
    }
}

impl<K, V> DirectAccessRegion<K, V> for MockRegion<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync,
    V: Clone + fmt::Debug + Send + Sync,
{
    fn get_from_cache(&self, key: &K) -> Result<Option<V>> {
        self.check(RegionOp::Get(key.clone()))?;
        Ok(self.data.lock().get(key).cloned())
    }

    fn put_into_cache(&self, key: &K, value: V) -> Result<()> {
        self.check(RegionOp::Put {
            key: key.clone(),
            value: value.clone(),
        })?;
        self.data.lock().insert(key.clone(), value);
        Ok(())
    }

    fn remove_from_cache(&self, key: &K) -> Result<()> {
        self.check(RegionOp::Remove(key.clone()))?;
        self.data.lock().remove(key);
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        u64::try_from(self.data.lock().len()).ok()
    }
}

/// A mock domain-data region over a [`MockRegion`] keyed by [`CacheKey`].
#[derive(Clone, Debug)]
pub struct MockDomainDataRegion {
    config: DomainDataRegionConfig,
    inner: MockRegion<CacheKey, Value>,
}

impl MockDomainDataRegion {
    /// Creates an empty region for `config`.
    #[must_use]
    pub fn new(config: DomainDataRegionConfig) -> Self {
        let inner = MockRegion::new(&config.region_name);
        Self { config, inner }
    }

    /// Returns the underlying mock, for failure injection and inspection.
    #[must_use]
    pub fn inner(&self) -> &MockRegion<CacheKey, Value> {
        &self.inner
    }
}

impl Region for MockDomainDataRegion {
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

impl DomainDataRegion for MockDomainDataRegion {
    fn config(&self) -> &DomainDataRegionConfig {
        &self.config
    }

    fn get(&self, key: &CacheKey) -> Result<Option<Value>> {
        self.inner.get_from_cache(key)
    }

    fn put(&self, key: &CacheKey, value: Value) -> Result<()> {
        self.inner.put_into_cache(key, value)
    }

    fn evict(&self, key: &CacheKey) -> Result<()> {
        self.inner.remove_from_cache(key)
    }
}

/// A clock advanced by hand.
///
/// [`next`][TimestampSource::next] returns the current value and then moves one tick forward.
///
/// # Examples
///
/// ```
/// use tidemark_region::{Timestamp, TimestampSource, testing::ManualTimestamper};
///
/// let clock = ManualTimestamper::starting_at(100);
/// assert_eq!(clock.next(), Timestamp::new(100));
/// assert_eq!(clock.next(), Timestamp::new(101));
///
/// clock.advance_to(500);
/// assert_eq!(clock.next(), Timestamp::new(500));
/// ```
#[derive(Debug)]
pub struct ManualTimestamper {
    current: AtomicU64,
    timeout: AtomicU64,
}

impl ManualTimestamper {
    /// Creates a clock whose first timestamp is `start`, with the default timeout.
    #[must_use]
    pub fn starting_at(start: u64) -> Self {
        Self {
            current: AtomicU64::new(start),
            timeout: AtomicU64::new(DEFAULT_TIMEOUT),
        }
    }

    /// Sets the timeout reported by the clock.
    #[must_use]
    pub fn with_timeout(self, timeout: u64) -> Self {
        self.timeout.store(timeout, Ordering::Relaxed);
        self
    }

    /// Moves the clock forward so the next timestamp is at least `value`. Never moves it back.
    pub fn advance_to(&self, value: u64) {
        self.current.fetch_max(value, Ordering::AcqRel);
    }

    /// Returns the value the next call to `next` will return, without consuming it.
    #[must_use]
    pub fn peek(&self) -> Timestamp {
        Timestamp::new(self.current.load(Ordering::Acquire))
    }
}

impl Default for ManualTimestamper {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl TimestampSource for ManualTimestamper {
    fn next(&self) -> Timestamp {
        Timestamp::new(self.current.fetch_add(1, Ordering::AcqRel))
    }

    fn timeout(&self) -> u64 {
        self.timeout.load(Ordering::Relaxed)
    }
}

/// A region factory building [`MockRegion`]s, driven by a [`ManualTimestamper`].
///
/// Regions built by the factory stay reachable through [`timestamps_region`][Self::timestamps_region],
/// [`query_results_region`][Self::query_results_region] and
/// [`domain_data_region`][Self::domain_data_region], keyed by their unqualified name.
#[derive(Debug)]
pub struct MockRegionFactory {
    lifecycle: FactoryLifecycle,
    clock: Arc<ManualTimestamper>,
    minimal_puts_by_default: bool,
    fail_start: AtomicBool,
    timestamps: Mutex<HashMap<String, MockRegion<QuerySpace, Timestamp>>>,
    query_results: Mutex<HashMap<String, MockRegion<QueryKey, CachedQueryResults>>>,
    domain_data: Mutex<HashMap<String, MockDomainDataRegion>>,
}

impl MockRegionFactory {
    /// Creates a factory over `clock`.
    #[must_use]
    pub fn new(clock: Arc<ManualTimestamper>) -> Self {
        Self {
            lifecycle: FactoryLifecycle::new("mock"),
            clock,
            minimal_puts_by_default: false,
            fail_start: AtomicBool::new(false),
            timestamps: Mutex::new(HashMap::new()),
            query_results: Mutex::new(HashMap::new()),
            domain_data: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the factory's minimal-puts default.
    #[must_use]
    pub fn with_minimal_puts_by_default(mut self, enabled: bool) -> Self {
        self.minimal_puts_by_default = enabled;
        self
    }

    /// Makes the next [`start`][RegionFactory::start] fail.
    pub fn fail_next_start(&self) {
        self.fail_start.store(true, Ordering::Release);
    }

    /// Returns the clock driving the factory.
    #[must_use]
    pub fn clock(&self) -> &Arc<ManualTimestamper> {
        &self.clock
    }

    /// Returns the timestamps region built under `name`.
    #[must_use]
    pub fn timestamps_region(&self, name: &str) -> Option<MockRegion<QuerySpace, Timestamp>> {
        self.timestamps.lock().get(name).cloned()
    }

    /// Returns the query results region built under `name`.
    #[must_use]
    pub fn query_results_region(&self, name: &str) -> Option<MockRegion<QueryKey, CachedQueryResults>> {
        self.query_results.lock().get(name).cloned()
    }

    /// Returns the domain-data region built under `name`.
    #[must_use]
    pub fn domain_data_region(&self, name: &str) -> Option<MockDomainDataRegion> {
        self.domain_data.lock().get(name).cloned()
    }
}

impl RegionFactory for MockRegionFactory {
    fn start(&self, settings: &CacheSettings) -> Result<()> {
        self.lifecycle.start(settings, |_| {
            if self.fail_start.swap(false, Ordering::AcqRel) {
                Err(Error::from_message("mock factory refused to start"))
            } else {
                Ok(())
            }
        })
    }

    fn stop(&self) {
        self.lifecycle.stop(|| {});
    }

    fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    fn is_minimal_puts_enabled_by_default(&self) -> bool {
        self.minimal_puts_by_default
    }

    fn qualify(&self, region_name: &str) -> String {
        self.lifecycle.qualify(region_name)
    }

    fn next_timestamp(&self) -> Timestamp {
        self.clock.next()
    }

    fn timeout(&self) -> u64 {
        self.clock.timeout()
    }

    fn create_transaction_context(&self) -> Box<dyn CacheTransactionSynchronization> {
        FactoryLifecycle::standard_transaction_context(Arc::clone(&self.clock) as Arc<dyn TimestampSource>)
    }

    fn build_domain_data_region(&self, config: &DomainDataRegionConfig) -> Result<Arc<dyn DomainDataRegion>> {
        self.lifecycle.verify_started()?;
        let region = MockDomainDataRegion::new(config.clone());
        self.domain_data
            .lock()
            .insert(config.region_name.clone(), region.clone());
        Ok(Arc::new(region))
    }

    fn build_query_results_region(&self, region_name: &str) -> Result<Arc<QueryResultsRegion>> {
        self.lifecycle.verify_started()?;
        let region = MockRegion::new(region_name);
        self.query_results
            .lock()
            .insert(region_name.to_owned(), region.clone());
        Ok(Arc::new(region))
    }

    fn build_timestamps_region(&self, region_name: &str) -> Result<Arc<TimestampsRegion>> {
        self.lifecycle.verify_started()?;
        let region = MockRegion::new(region_name);
        self.timestamps.lock().insert(region_name.to_owned(), region.clone());
        Ok(Arc::new(region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_region_records_failed_operations_too() {
        let region = MockRegion::<u32, u32>::new("r");
        region.fail_when(|op| matches!(op, RegionOp::Put { key: 2, .. }));

        region.put_into_cache(&1, 10).unwrap();
        let error = region.put_into_cache(&2, 20).unwrap_err();
        assert!(error.is_recoverable());

        assert_eq!(
            region.operations(),
            vec![RegionOp::Put { key: 1, value: 10 }, RegionOp::Put { key: 2, value: 20 }]
        );
        assert_eq!(region.entry_count(), 1);
        assert_eq!(DirectAccessRegion::len(&region), Some(1));
    }

    #[test]
    fn clear_failures_restores_normal_operation() {
        let region = MockRegion::<u32, u32>::new("r");
        region.fail_when(|_| true);
        assert!(region.clear().is_err());
        region.clear_failures();
        assert!(region.clear().is_ok());
        region.clear_operations();
        assert!(region.operations().is_empty());
    }

    #[test]
    fn manual_timestamper_never_moves_back() {
        let clock = ManualTimestamper::starting_at(10).with_timeout(5);
        clock.advance_to(3);
        assert_eq!(clock.next(), Timestamp::new(10));
        assert_eq!(clock.peek(), Timestamp::new(11));
        assert_eq!(clock.timeout(), 5);
    }

    #[test]
    fn factory_refuses_to_build_before_start() {
        let factory = MockRegionFactory::new(Arc::new(ManualTimestamper::default()));
        assert!(factory.build_timestamps_region("ts").is_err());

        factory.start(&CacheSettings::new()).unwrap();
        assert!(factory.build_timestamps_region("ts").is_ok());
        assert!(factory.timestamps_region("ts").is_some());
    }

    #[test]
    fn factory_start_failure_is_reported_once() {
        let factory = MockRegionFactory::new(Arc::new(ManualTimestamper::default()));
        factory.fail_next_start();
        assert!(factory.start(&CacheSettings::new()).is_err());
        assert!(!factory.is_started());
        assert!(factory.start(&CacheSettings::new()).is_ok());
    }
}
