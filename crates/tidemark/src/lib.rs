// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Second-level cache invalidation for object-relational mappers.
//!
//! This crate provides the caching core that sits between an ORM session and a cache backend:
//! - A timestamps cache recording when each query space (table) was last modified
//! - A query results cache whose entries are validated against those timestamps on every read
//! - A cache manager that starts a [`RegionFactory`], owns every region and evicts or closes them
//! - Structured cache events through `tracing`
//!
//! Backends implement [`RegionFactory`] from `tidemark_region`. The in-memory backend from
//! `tidemark_memory` is used by default when the `memory` feature is enabled.
//!
//! # Examples
//!
//! ## Caching a query result
//!
//! ```
//! use tidemark::{
//!     CacheManager, CacheSession, CacheSettings, Limit, QueryKey, QueryParameterBindings, QuerySpace, TypedValue,
//!     Value,
//! };
//!
//! let manager = CacheManager::builder()
//!     .settings(CacheSettings::new().with_query_cache(true))
//!     .build()?;
//! let cache = manager.default_query_results_cache().expect("query cache is enabled");
//! let session = CacheSession::new(manager.create_transaction_context());
//!
//! let bindings = QueryParameterBindings::new().bind_positional(1, TypedValue::new("string", "Lovelace"));
//! let key = QueryKey::from_query("select p from Person p where p.name = ?1", Limit::NONE, &bindings, &session);
//! let spaces = [QuerySpace::from("person")];
//!
//! cache.put(&key, vec![Value::from(1_i64)], &session)?;
//! assert_eq!(cache.get(&key, &spaces, &session)?, Some(vec![Value::from(1_i64)]));
//! # Ok::<(), tidemark::Error>(())
//! ```
//!
//! ## Invalidating around a write transaction
//!
//! ```
//! use tidemark::{CacheManager, CacheSession, CacheSettings, QuerySpace};
//!
//! let manager = CacheManager::builder()
//!     .settings(CacheSettings::new().with_query_cache(true))
//!     .build()?;
//! let timestamps = manager.timestamps_cache();
//! let mut writer = CacheSession::new(manager.create_transaction_context());
//! let spaces = [QuerySpace::from("person")];
//!
//! writer.join_transaction();
//! timestamps.pre_invalidate(&spaces, &writer)?;
//! // ... execute the DML and commit ...
//! timestamps.invalidate(&spaces, &writer)?;
//! writer.complete_transaction(true);
//! # Ok::<(), tidemark::Error>(())
//! ```
//!
//! # Telemetry
//!
//! Every cache operation emits a `cache.event` through `tracing` with the region name,
//! operation and activity (`cache.hit`, `cache.miss`, `cache.stale`, ...). Hits, misses and
//! puts are logged at `DEBUG`, staleness and invalidation at `INFO`, backend failures at
//! `ERROR`. Pass [`CacheTelemetry::disabled`] to the builder to silence them.

mod builder;
mod manager;
mod query_results;
mod telemetry;
mod timestamps;

#[doc(inline)]
pub use builder::CacheManagerBuilder;
#[doc(inline)]
pub use manager::CacheManager;
#[doc(inline)]
pub use query_results::QueryResultsCache;
#[doc(inline)]
pub use telemetry::CacheTelemetry;
#[cfg(feature = "memory")]
#[doc(inline)]
pub use tidemark_memory::{MemoryRegionFactory, MemoryRegionFactoryBuilder};
#[doc(inline)]
pub use tidemark_region::{
    AccessType, CacheEventListener, CacheKey, CacheKeyKind, CacheSession, CacheSettings, CacheTransactionSynchronization,
    CachedQueryResults, DEFAULT_QUERY_RESULTS_REGION_NAME, DEFAULT_UPDATE_TIMESTAMPS_REGION_NAME, DirectAccessRegion,
    DomainDataRegion, DomainDataRegionConfig, Error, Limit, QueryKey, QueryParameterBindings, QueryResultsRegion,
    QuerySpace, Region, RegionFactory, Result, SessionContext, Timestamp, TimestampSource, TimestampsRegion, TypedValue,
    Value,
};
#[doc(inline)]
pub use timestamps::{DisabledTimestampsCache, EnabledTimestampsCache, TimestampsCache};
