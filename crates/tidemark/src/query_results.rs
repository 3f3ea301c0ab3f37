// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cached query results, validated against the timestamps cache on every read.

use std::sync::Arc;

use tidemark_region::{
    CachedQueryResults, QueryKey, QueryResultsRegion, QuerySpace, Result, SessionContext, Timestamp, Value,
};

use crate::{
    telemetry::{CacheActivity, CacheOperation, CacheTelemetry},
    timestamps::{TimestampsCache, activity_of},
};

/// A query results cache bound to one region.
///
/// Results are stored together with the caching timestamp of the session that put them.
/// [`get`][Self::get] hands a stored list back only if none of the query's spaces has been
/// invalidated at or after that timestamp. Stale entries stay in the region until they are
/// overwritten, evicted by the backend or cleared.
///
/// # Examples
///
/// ```
/// use tidemark::{
///     CacheManager, CacheSession, CacheSettings, Limit, QueryKey, QueryParameterBindings, QuerySpace, Value,
/// };
///
/// let manager = CacheManager::builder()
///     .settings(CacheSettings::new().with_query_cache(true))
///     .build()?;
/// let cache = manager.default_query_results_cache().expect("query cache is enabled");
/// let session = CacheSession::new(manager.create_transaction_context());
///
/// let key = QueryKey::from_query("select name from person", Limit::NONE, &QueryParameterBindings::new(), &session);
/// let spaces = [QuerySpace::from("person")];
///
/// assert!(cache.put(&key, vec![Value::from("Ada")], &session)?);
/// assert_eq!(cache.get(&key, &spaces, &session)?, Some(vec![Value::from("Ada")]));
///
/// manager.timestamps_cache().invalidate(&spaces, &session)?;
/// assert_eq!(cache.get(&key, &spaces, &session)?, None);
/// # Ok::<(), tidemark::Error>(())
/// ```
#[derive(Debug)]
pub struct QueryResultsCache {
    region: Arc<QueryResultsRegion>,
    timestamps: Arc<dyn TimestampsCache>,
    minimal_puts: bool,
    telemetry: CacheTelemetry,
}

impl QueryResultsCache {
    /// Creates a query results cache over `region`, validated by `timestamps`.
    #[must_use]
    pub fn new(
        region: Arc<QueryResultsRegion>,
        timestamps: Arc<dyn TimestampsCache>,
        minimal_puts: bool,
        telemetry: CacheTelemetry,
    ) -> Self {
        Self {
            region,
            timestamps,
            minimal_puts,
            telemetry,
        }
    }

    /// Returns the backing region.
    #[must_use]
    pub fn region(&self) -> &Arc<QueryResultsRegion> {
        &self.region
    }

    /// Returns the name of the backing region.
    #[must_use]
    pub fn region_name(&self) -> &str {
        self.region.name()
    }

    /// Returns `true` if puts that would not change the stored results are skipped.
    #[must_use]
    pub fn is_minimal_puts(&self) -> bool {
        self.minimal_puts
    }

    /// Stores `results` for `key`, stamped with the session's caching timestamp.
    ///
    /// Returns whether the region was written. With minimal puts on, nothing is written when
    /// the region already holds equal results for `key` stamped no earlier than this session.
    /// That check is a cache read and is reported to the session's listener as one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn put(&self, key: &QueryKey, results: Vec<Value>, session: &dyn SessionContext) -> Result<bool> {
        let timestamp = session.cache_transaction_synchronization().caching_timestamp();
        let listener = session.cache_event_listener();

        if self.minimal_puts {
            listener.cache_get_start();
            let held = self.holds(key, &results, timestamp);
            listener.cache_get_end(matches!(held, Ok(true)));

            match held {
                Ok(true) => {
                    self.telemetry
                        .record(self.region_name(), CacheOperation::Put, CacheActivity::Skipped);
                    return Ok(false);
                }
                Ok(false) => {}
                Err(error) => {
                    self.telemetry
                        .record(self.region_name(), CacheOperation::Put, CacheActivity::Error);
                    return Err(error);
                }
            }
        }

        listener.cache_put_start();
        let outcome = self
            .region
            .put_into_cache(key, CachedQueryResults::new(timestamp, results));
        listener.cache_put_end();

        let activity = if outcome.is_ok() {
            CacheActivity::Inserted
        } else {
            CacheActivity::Error
        };
        self.telemetry.record(self.region_name(), CacheOperation::Put, activity);
        outcome.map(|()| true)
    }

    /// Returns the results cached for `key`, if present and still valid for `spaces`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn get(&self, key: &QueryKey, spaces: &[QuerySpace], session: &dyn SessionContext) -> Result<Option<Vec<Value>>> {
        let listener = session.cache_event_listener();

        listener.cache_get_start();
        let outcome = self.lookup(key, spaces, session);
        listener.cache_get_end(matches!(outcome, Ok(Some(_))));

        outcome
    }

    fn lookup(&self, key: &QueryKey, spaces: &[QuerySpace], session: &dyn SessionContext) -> Result<Option<Vec<Value>>> {
        let cached = match self.region.get_from_cache(key) {
            Ok(Some(cached)) => cached,
            Ok(None) => {
                self.telemetry
                    .record(self.region_name(), CacheOperation::Get, CacheActivity::Miss);
                return Ok(None);
            }
            Err(error) => {
                self.telemetry
                    .record(self.region_name(), CacheOperation::Get, CacheActivity::Error);
                return Err(error);
            }
        };

        if self.timestamps.is_up_to_date(spaces, cached.timestamp, session)? {
            self.telemetry
                .record(self.region_name(), CacheOperation::Get, CacheActivity::Hit);
            Ok(Some(cached.results))
        } else {
            self.telemetry
                .record(self.region_name(), CacheOperation::Get, CacheActivity::Stale);
            Ok(None)
        }
    }

    // Equal results stamped before `timestamp` do not count as held.
    fn holds(&self, key: &QueryKey, results: &[Value], timestamp: Timestamp) -> Result<bool> {
        let held = match self.region.get_from_cache(key) {
            Ok(cached) => cached.is_some_and(|cached| cached.timestamp >= timestamp && cached.results == results),
            Err(error) => {
                self.telemetry
                    .record(self.region_name(), CacheOperation::Get, CacheActivity::Error);
                return Err(error);
            }
        };

        let activity = if held { CacheActivity::Hit } else { CacheActivity::Miss };
        self.telemetry.record(self.region_name(), CacheOperation::Get, activity);
        Ok(held)
    }

    /// Evicts every cached result in the region.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn clear(&self) -> Result<()> {
        let outcome = self.region.clear();
        self.telemetry
            .record(self.region_name(), CacheOperation::Clear, activity_of(&outcome));
        outcome
    }

    /// Releases the backing region.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn destroy(&self) -> Result<()> {
        let outcome = self.region.destroy();
        self.telemetry
            .record(self.region_name(), CacheOperation::Destroy, activity_of(&outcome));
        outcome
    }
}
