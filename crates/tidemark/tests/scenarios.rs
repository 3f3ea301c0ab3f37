// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! End-to-end invalidation behavior over mock regions and a hand-driven clock.

use std::sync::Arc;

use tidemark::{
    CacheManager, CacheSession, CacheSettings, CacheTelemetry, DEFAULT_UPDATE_TIMESTAMPS_REGION_NAME, Limit, QueryKey,
    QueryParameterBindings, QuerySpace, RegionFactory, Timestamp, TimestampsCache, TypedValue, Value,
};
use tidemark_region::testing::{ManualTimestamper, MockRegionFactory};

const TIMEOUT: u64 = 1_000;

struct Harness {
    factory: Arc<MockRegionFactory>,
    manager: CacheManager,
}

impl Harness {
    fn new() -> Self {
        let clock = Arc::new(ManualTimestamper::starting_at(1).with_timeout(TIMEOUT));
        let factory = Arc::new(MockRegionFactory::new(clock));
        let manager = CacheManager::builder()
            .region_factory(Arc::clone(&factory) as Arc<dyn RegionFactory>)
            .settings(CacheSettings::new().with_query_cache(true))
            .telemetry(CacheTelemetry::disabled())
            .build()
            .unwrap();
        Self { factory, manager }
    }

    fn session_at(&self, time: u64) -> CacheSession {
        self.factory.clock().advance_to(time);
        CacheSession::new(self.manager.create_transaction_context())
    }

    fn timestamps(&self) -> &Arc<dyn TimestampsCache> {
        self.manager.timestamps_cache()
    }

    fn recorded(&self, space: &str) -> Option<Timestamp> {
        self.factory
            .timestamps_region(DEFAULT_UPDATE_TIMESTAMPS_REGION_NAME)
            .unwrap()
            .peek(&QuerySpace::from(space))
    }
}

fn person() -> [QuerySpace; 1] {
    [QuerySpace::from("PERSON")]
}

fn key(session: &CacheSession, limit: Limit) -> QueryKey {
    let bindings = QueryParameterBindings::new().bind_positional(1, TypedValue::new("long", 42_i64));
    QueryKey::from_query("select p from Person p where p.age > ?1", limit, &bindings, session)
}

fn ab() -> Vec<Value> {
    vec![Value::from("a"), Value::from("b")]
}

#[test]
fn invalidation_stales_results_at_or_before_its_timestamp() {
    let h = Harness::new();
    let writer = h.session_at(1);

    h.factory.clock().advance_to(100);
    h.timestamps().invalidate(&person(), &writer).unwrap();
    assert_eq!(h.recorded("PERSON"), Some(Timestamp::new(100)));

    assert!(!h.timestamps().is_up_to_date(&person(), Timestamp::new(100), &writer).unwrap());
    assert!(h.timestamps().is_up_to_date(&person(), Timestamp::new(101), &writer).unwrap());
}

#[test]
fn never_invalidated_space_is_fresh() {
    let h = Harness::new();
    let session = h.session_at(1);
    let ghost = [QuerySpace::from("GHOST")];

    assert!(h.timestamps().is_up_to_date(&ghost, Timestamp::new(1), &session).unwrap());
    assert!(h.timestamps().is_up_to_date(&ghost, Timestamp::ZERO, &session).unwrap());
    assert!(h.timestamps().is_up_to_date(&ghost, Timestamp::new(u64::MAX), &session).unwrap());
}

#[test]
fn put_then_get_without_spaces_round_trips() {
    let h = Harness::new();
    let cache = h.manager.default_query_results_cache().unwrap();
    let session = h.session_at(50);
    let key = key(&session, Limit::NONE);

    assert!(cache.put(&key, ab(), &session).unwrap());
    assert_eq!(cache.get(&key, &[], &session).unwrap(), Some(ab()));
}

#[test]
fn invalidation_after_put_hides_the_result() {
    let h = Harness::new();
    let cache = h.manager.default_query_results_cache().unwrap();
    let reader = h.session_at(50);
    let key = key(&reader, Limit::NONE);
    cache.put(&key, ab(), &reader).unwrap();

    let writer = h.session_at(60);
    h.timestamps().invalidate(&person(), &writer).unwrap();

    assert_eq!(cache.get(&key, &person(), &reader).unwrap(), None);
}

#[test]
fn keys_differing_only_in_row_window_are_unequal_with_equal_hashes() {
    let h = Harness::new();
    let session = h.session_at(1);

    let first_page = key(&session, Limit::new(0, 10));
    let second_page = key(&session, Limit::new(10, 10));

    assert_ne!(first_page, second_page);
    assert_eq!(first_page.hash_code(), second_page.hash_code());
}

#[test]
fn keys_differing_in_enabled_filters_are_unequal() {
    let h = Harness::new();
    let plain = h.session_at(1);
    let filtered = CacheSession::new(h.manager.create_transaction_context()).enable_filter("active");

    assert_ne!(key(&plain, Limit::NONE), key(&filtered, Limit::NONE));
}

#[test]
fn later_invalidation_keeps_earlier_results_stale() {
    let h = Harness::new();
    let writer = h.session_at(1);

    h.factory.clock().advance_to(40);
    h.timestamps().invalidate(&person(), &writer).unwrap();
    h.factory.clock().advance_to(100);
    h.timestamps().invalidate(&person(), &writer).unwrap();

    for t in [1, 39, 40, 41, 99, 100] {
        assert!(
            !h.timestamps().is_up_to_date(&person(), Timestamp::new(t), &writer).unwrap(),
            "result cached at {t} should be stale"
        );
    }
    assert!(h.timestamps().is_up_to_date(&person(), Timestamp::new(101), &writer).unwrap());
}

#[test]
fn pre_invalidation_window_stales_concurrent_readers_until_commit() {
    let h = Harness::new();
    let cache = h.manager.default_query_results_cache().unwrap();

    let mut writer = h.session_at(10);
    writer.join_transaction();
    h.factory.clock().advance_to(20);
    h.timestamps().pre_invalidate(&person(), &writer).unwrap();
    assert_eq!(h.recorded("PERSON"), Some(Timestamp::new(20 + TIMEOUT)));

    // A reader caching during the window cannot see its own result.
    let reader = h.session_at(30);
    let key = key(&reader, Limit::NONE);
    cache.put(&key, ab(), &reader).unwrap();
    assert_eq!(cache.get(&key, &person(), &reader).unwrap(), None);

    h.factory.clock().advance_to(40);
    h.timestamps().invalidate(&person(), &writer).unwrap();
    writer.complete_transaction(true);
    assert_eq!(h.recorded("PERSON"), Some(Timestamp::new(40)));

    let late_reader = h.session_at(50);
    cache.put(&key, ab(), &late_reader).unwrap();
    assert_eq!(cache.get(&key, &person(), &late_reader).unwrap(), Some(ab()));
}

#[test]
fn evicting_everything_resets_results_and_timestamps() {
    let h = Harness::new();
    let cache = h.manager.default_query_results_cache().unwrap();
    let reports = h.manager.query_results_cache(Some("reports")).unwrap().unwrap();
    let session = h.session_at(5);
    let key = key(&session, Limit::NONE);

    cache.put(&key, ab(), &session).unwrap();
    reports.put(&key, ab(), &session).unwrap();
    h.timestamps().invalidate(&person(), &session).unwrap();

    h.manager.evict_all_regions().unwrap();

    assert_eq!(cache.get(&key, &[], &session).unwrap(), None);
    assert_eq!(reports.get(&key, &[], &session).unwrap(), None);
    assert!(h.timestamps().is_up_to_date(&person(), Timestamp::new(1), &session).unwrap());
}

#[test]
fn minimal_puts_skip_identical_results() {
    let clock = Arc::new(ManualTimestamper::starting_at(1));
    let factory = Arc::new(MockRegionFactory::new(clock));
    let manager = CacheManager::builder()
        .region_factory(Arc::clone(&factory) as Arc<dyn RegionFactory>)
        .settings(CacheSettings::new().with_query_cache(true).with_minimal_puts(true))
        .build()
        .unwrap();
    let cache = manager.default_query_results_cache().unwrap();
    let session = CacheSession::new(manager.create_transaction_context());
    let key = key(&session, Limit::NONE);

    assert!(cache.put(&key, ab(), &session).unwrap());
    assert!(!cache.put(&key, ab(), &session).unwrap());
    assert!(cache.put(&key, vec![Value::from("c")], &session).unwrap());
}
