// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Region, region factory and key contracts for the tidemark second-level cache.
//!
//! This crate defines what a cache backend must provide and the value types that flow through
//! it. The `tidemark` crate builds the timestamps cache, the query results cache and the cache
//! manager on top of these contracts; `tidemark_memory` is a ready-made backend.
//!
//! # Overview
//!
//! - [`RegionFactory`] starts and stops a backend, builds regions and hands out [`Timestamp`]s.
//! - [`DirectAccessRegion`] stores values as-is. The timestamps cache uses a
//!   [`TimestampsRegion`] and the query results cache a [`QueryResultsRegion`].
//! - [`DomainDataRegion`] stores entity, collection and natural-id data under [`CacheKey`]s.
//! - [`QueryKey`] identifies a cached query result.
//! - [`CacheTransactionSynchronization`] supplies the timestamp a session stamps cached results
//!   with, and [`SessionContext`] is everything else the caches need to know about a session.
//!
//! # Implementing a Backend
//!
//! Implement [`RegionFactory`] and let a [`FactoryLifecycle`] track the started state:
//!
//! ```
//! use std::sync::Arc;
//! use tidemark_region::{
//!     CacheSettings, CacheTransactionSynchronization, DomainDataRegion, DomainDataRegionConfig,
//!     FactoryLifecycle, QueryResultsRegion, RegionFactory, Result, SystemTimestamper, Timestamp,
//!     TimestampSource, TimestampsRegion, testing::MockRegion,
//! };
//!
//! #[derive(Debug)]
//! struct ScratchFactory {
//!     lifecycle: FactoryLifecycle,
//!     clock: Arc<SystemTimestamper>,
//! }
//!
//! impl RegionFactory for ScratchFactory {
//!     fn start(&self, settings: &CacheSettings) -> Result<()> {
//!         self.lifecycle.start(settings, |_| Ok(()))
//!     }
//!
//!     fn stop(&self) {
//!         self.lifecycle.stop(|| {});
//!     }
//!
//!     fn is_started(&self) -> bool {
//!         self.lifecycle.is_started()
//!     }
//!
//!     fn qualify(&self, region_name: &str) -> String {
//!         self.lifecycle.qualify(region_name)
//!     }
//!
//!     fn next_timestamp(&self) -> Timestamp {
//!         self.clock.next()
//!     }
//!
//!     fn timeout(&self) -> u64 {
//!         self.clock.timeout()
//!     }
//!
//!     fn create_transaction_context(&self) -> Box<dyn CacheTransactionSynchronization> {
//!         FactoryLifecycle::standard_transaction_context(self.clock.clone())
//!     }
//!
//!     fn build_domain_data_region(&self, config: &DomainDataRegionConfig) -> Result<Arc<dyn DomainDataRegion>> {
//!         self.lifecycle.verify_started()?;
//!         Ok(Arc::new(tidemark_region::testing::MockDomainDataRegion::new(config.clone())))
//!     }
//!
//!     fn build_query_results_region(&self, region_name: &str) -> Result<Arc<QueryResultsRegion>> {
//!         self.lifecycle.verify_started()?;
//!         Ok(Arc::new(MockRegion::new(region_name)))
//!     }
//!
//!     fn build_timestamps_region(&self, region_name: &str) -> Result<Arc<TimestampsRegion>> {
//!         self.lifecycle.verify_started()?;
//!         Ok(Arc::new(MockRegion::new(region_name)))
//!     }
//! }
//! ```
//!
//! # Features
//!
//! - `test-util`: exposes the [`testing`] module with mock regions, a mock region factory and a
//!   manually driven clock.

mod cache_key;
mod error;
mod factory;
mod parameters;
mod query_key;
mod region;
mod session;
mod settings;
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;
pub mod timestamp;
mod transaction;
mod types;
mod value;

#[doc(inline)]
pub use cache_key::{CacheKey, CacheKeyKind, CacheKeysFactory, DefaultCacheKeysFactory};
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use factory::{FactoryLifecycle, RegionFactory};
#[doc(inline)]
pub use parameters::{BindingsMemento, ParameterName, QueryParameterBindings, TypedValue};
#[doc(inline)]
pub use query_key::{Limit, QueryKey};
#[doc(inline)]
pub use region::{
    CachedQueryResults, DirectAccessRegion, DomainDataRegion, QueryResultsRegion, QuerySpace, Region,
    TimestampsRegion,
};
#[doc(inline)]
pub use session::{CacheEventListener, CacheSession, NoopCacheEventListener, SessionContext};
#[doc(inline)]
pub use settings::{
    AccessType, CONFIG_PREFIX, CacheSettings, DEFAULT_QUERY_RESULTS_REGION_NAME, DEFAULT_UPDATE_TIMESTAMPS_REGION_NAME,
    DomainDataRegionConfig, RoleCachingConfig,
};
#[doc(inline)]
pub use timestamp::{SystemTimestamper, Timestamp, TimestampSource};
#[doc(inline)]
pub use transaction::{CacheTransactionSynchronization, StandardCacheTransactionSynchronization};
#[doc(inline)]
pub use types::{BasicType, CompositeType, IdentifierType};
#[doc(inline)]
pub use value::{Value, hash_bytes, hash_str, mix};
