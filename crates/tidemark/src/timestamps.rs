// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-space invalidation timestamps.

use std::{fmt, sync::Arc};

use tidemark_region::{QuerySpace, RegionFactory, Result, SessionContext, Timestamp, TimestampsRegion};

use crate::telemetry::{CacheActivity, CacheOperation, CacheTelemetry};

/// Tracks when each query space was last modified.
///
/// A write transaction calls [`pre_invalidate`][Self::pre_invalidate] for the spaces it touches
/// before its DML runs and [`invalidate`][Self::invalidate] once it has committed. The query
/// results cache asks [`is_up_to_date`][Self::is_up_to_date] before returning a cached result.
pub trait TimestampsCache: Send + Sync + fmt::Debug {
    /// Returns the backing region, if any.
    fn region(&self) -> Option<&Arc<TimestampsRegion>>;

    /// Marks `spaces` as being modified by an in-flight transaction.
    ///
    /// Records `next_timestamp() + timeout()` so that results cached while the transaction runs
    /// are treated as stale until it completes or the timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn pre_invalidate(&self, spaces: &[QuerySpace], session: &dyn SessionContext) -> Result<()>;

    /// Marks `spaces` as modified by a transaction that has just committed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn invalidate(&self, spaces: &[QuerySpace], session: &dyn SessionContext) -> Result<()>;

    /// Returns `true` if a result cached at `timestamp` is still valid for `spaces`.
    ///
    /// A result is stale as soon as any space has a recorded timestamp at or after `timestamp`.
    /// Spaces with no recorded timestamp have not been modified since the cache started.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn is_up_to_date(&self, spaces: &[QuerySpace], timestamp: Timestamp, session: &dyn SessionContext) -> Result<bool>;

    /// Forgets every recorded timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn clear(&self) -> Result<()>;

    /// Releases the backing region.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn destroy(&self) -> Result<()> {
        Ok(())
    }
}

/// The timestamps cache used when query caching is enabled.
#[derive(Debug)]
pub struct EnabledTimestampsCache {
    region: Arc<TimestampsRegion>,
    factory: Arc<dyn RegionFactory>,
    telemetry: CacheTelemetry,
}

impl EnabledTimestampsCache {
    /// Creates a timestamps cache writing to `region`, with timestamps from `factory`.
    #[must_use]
    pub fn new(region: Arc<TimestampsRegion>, factory: Arc<dyn RegionFactory>, telemetry: CacheTelemetry) -> Self {
        Self {
            region,
            factory,
            telemetry,
        }
    }

    fn write_all(
        &self,
        spaces: &[QuerySpace],
        timestamp: Timestamp,
        operation: CacheOperation,
        session: &dyn SessionContext,
    ) -> Result<()> {
        let listener = session.cache_event_listener();
        for space in spaces {
            listener.cache_put_start();
            let outcome = self.region.put_into_cache(space, timestamp);
            listener.cache_put_end();

            let activity = if outcome.is_ok() {
                CacheActivity::Invalidated
            } else {
                CacheActivity::Error
            };
            self.telemetry
                .record_space(self.region.name(), operation, activity, space, timestamp);
            outcome?;
        }
        Ok(())
    }
}

impl TimestampsCache for EnabledTimestampsCache {
    fn region(&self) -> Option<&Arc<TimestampsRegion>> {
        Some(&self.region)
    }

    fn pre_invalidate(&self, spaces: &[QuerySpace], session: &dyn SessionContext) -> Result<()> {
        let timestamp = self.factory.next_timestamp().saturating_add(self.factory.timeout());
        self.write_all(spaces, timestamp, CacheOperation::PreInvalidate, session)
    }

    fn invalidate(&self, spaces: &[QuerySpace], session: &dyn SessionContext) -> Result<()> {
        let timestamp = self.factory.next_timestamp();
        self.write_all(spaces, timestamp, CacheOperation::Invalidate, session)
    }

    fn is_up_to_date(&self, spaces: &[QuerySpace], timestamp: Timestamp, session: &dyn SessionContext) -> Result<bool> {
        let listener = session.cache_event_listener();
        for space in spaces {
            listener.cache_get_start();
            let last_update = self.region.get_from_cache(space);
            listener.cache_get_end(matches!(last_update, Ok(Some(_))));

            match last_update {
                Ok(Some(last_update)) if last_update >= timestamp => {
                    self.telemetry
                        .record_space(self.region.name(), CacheOperation::Get, CacheActivity::Stale, space, last_update);
                    return Ok(false);
                }
                Ok(_) => {}
                Err(error) => {
                    self.telemetry
                        .record_space(self.region.name(), CacheOperation::Get, CacheActivity::Error, space, timestamp);
                    return Err(error);
                }
            }
        }
        Ok(true)
    }

    fn clear(&self) -> Result<()> {
        let outcome = self.region.clear();
        self.telemetry
            .record(self.region.name(), CacheOperation::Clear, activity_of(&outcome));
        outcome
    }

    fn destroy(&self) -> Result<()> {
        let outcome = self.region.destroy();
        self.telemetry
            .record(self.region.name(), CacheOperation::Destroy, activity_of(&outcome));
        outcome
    }
}

/// The timestamps cache used when query caching is disabled.
///
/// Records nothing and reports every result as up to date.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledTimestampsCache;

impl TimestampsCache for DisabledTimestampsCache {
    fn region(&self) -> Option<&Arc<TimestampsRegion>> {
        None
    }

    fn pre_invalidate(&self, _spaces: &[QuerySpace], _session: &dyn SessionContext) -> Result<()> {
        Ok(())
    }

    fn invalidate(&self, _spaces: &[QuerySpace], _session: &dyn SessionContext) -> Result<()> {
        Ok(())
    }

    fn is_up_to_date(&self, _spaces: &[QuerySpace], _timestamp: Timestamp, _session: &dyn SessionContext) -> Result<bool> {
        Ok(true)
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn activity_of<T>(outcome: &Result<T>) -> CacheActivity {
    if outcome.is_ok() {
        CacheActivity::Ok
    } else {
        CacheActivity::Error
    }
}

#[cfg(test)]
mod tests {
    use tidemark_region::{
        CacheSession, CacheSettings,
        testing::{ManualTimestamper, MockRegion, MockRegionFactory, RegionOp},
    };

    use super::*;

    const TIMEOUT: u64 = 1_000;

    struct Fixture {
        factory: Arc<MockRegionFactory>,
        region: MockRegion<QuerySpace, Timestamp>,
        cache: EnabledTimestampsCache,
        session: CacheSession,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualTimestamper::starting_at(100).with_timeout(TIMEOUT));
        let factory = Arc::new(MockRegionFactory::new(clock));
        factory.start(&CacheSettings::new().with_query_cache(true)).unwrap();
        let region = factory.build_timestamps_region("ts").unwrap();
        let mock = factory.timestamps_region("ts").unwrap();
        let session = CacheSession::new(factory.create_transaction_context());
        let cache = EnabledTimestampsCache::new(region, Arc::clone(&factory) as Arc<dyn RegionFactory>, CacheTelemetry::disabled());
        Fixture {
            factory,
            region: mock,
            cache,
            session,
        }
    }

    fn spaces(names: &[&str]) -> Vec<QuerySpace> {
        names.iter().map(|name| QuerySpace::from(*name)).collect()
    }

    #[test]
    fn unrecorded_spaces_are_fresh() {
        let f = fixture();
        assert!(f.cache.is_up_to_date(&spaces(&["person"]), Timestamp::new(1), &f.session).unwrap());
        assert!(f.cache.is_up_to_date(&[], Timestamp::new(1), &f.session).unwrap());
    }

    #[test]
    fn pre_invalidate_writes_next_plus_timeout() {
        let f = fixture();
        f.factory.clock().advance_to(500);
        f.cache.pre_invalidate(&spaces(&["person", "orders"]), &f.session).unwrap();

        let expected = Timestamp::new(500 + TIMEOUT);
        assert_eq!(f.region.peek(&QuerySpace::from("person")), Some(expected));
        assert_eq!(f.region.peek(&QuerySpace::from("orders")), Some(expected));
    }

    #[test]
    fn invalidate_writes_next() {
        let f = fixture();
        f.factory.clock().advance_to(700);
        f.cache.invalidate(&spaces(&["person"]), &f.session).unwrap();
        assert_eq!(f.region.peek(&QuerySpace::from("person")), Some(Timestamp::new(700)));
    }

    #[test]
    fn recorded_timestamp_at_or_after_result_is_stale() {
        let f = fixture();
        f.factory.clock().advance_to(700);
        f.cache.invalidate(&spaces(&["person"]), &f.session).unwrap();

        let person = spaces(&["person"]);
        assert!(!f.cache.is_up_to_date(&person, Timestamp::new(700), &f.session).unwrap());
        assert!(!f.cache.is_up_to_date(&person, Timestamp::new(650), &f.session).unwrap());
        assert!(f.cache.is_up_to_date(&person, Timestamp::new(701), &f.session).unwrap());
    }

    #[test]
    fn any_stale_space_makes_the_result_stale() {
        let f = fixture();
        f.cache.invalidate(&spaces(&["orders"]), &f.session).unwrap();
        let later = f.factory.clock().peek();
        f.cache.invalidate(&spaces(&["person"]), &f.session).unwrap();

        assert!(!f.cache.is_up_to_date(&spaces(&["orders", "person"]), later, &f.session).unwrap());
    }

    #[test]
    fn clear_forgets_everything() {
        let f = fixture();
        f.cache.invalidate(&spaces(&["person"]), &f.session).unwrap();
        f.cache.clear().unwrap();
        assert!(f.cache.is_up_to_date(&spaces(&["person"]), Timestamp::new(1), &f.session).unwrap());
    }

    #[test]
    fn backend_failure_surfaces() {
        let f = fixture();
        f.region.fail_when(|op| matches!(op, RegionOp::Get(_)));
        let error = f
            .cache
            .is_up_to_date(&spaces(&["person"]), Timestamp::new(1), &f.session)
            .unwrap_err();
        assert!(error.is_recoverable());

        f.region.fail_when(|op| matches!(op, RegionOp::Put { .. }));
        assert!(f.cache.invalidate(&spaces(&["person"]), &f.session).is_err());
    }

    #[test]
    fn disabled_cache_is_always_up_to_date() {
        let f = fixture();
        let disabled = DisabledTimestampsCache;
        disabled.pre_invalidate(&spaces(&["person"]), &f.session).unwrap();
        disabled.invalidate(&spaces(&["person"]), &f.session).unwrap();
        assert!(disabled.is_up_to_date(&spaces(&["person"]), Timestamp::ZERO, &f.session).unwrap());
        assert!(disabled.region().is_none());
        disabled.clear().unwrap();
        disabled.destroy().unwrap();
    }
}
