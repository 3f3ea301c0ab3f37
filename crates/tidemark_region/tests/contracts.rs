// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the public region contracts.

use std::{collections::HashMap, sync::Arc};

use tidemark_region::{
    AccessType, BasicType, CacheKey, CacheSession, CacheSettings, CachedQueryResults, DomainDataRegionConfig, Limit,
    QueryKey, QueryParameterBindings, QuerySpace, RegionFactory, SessionContext,
    Timestamp, TypedValue, Value,
    testing::{ManualTimestamper, MockRegionFactory, RegionOp},
};

fn started_factory() -> MockRegionFactory {
    let factory = MockRegionFactory::new(Arc::new(ManualTimestamper::starting_at(1_000)));
    factory.start(&CacheSettings::new().with_query_cache(true)).unwrap();
    factory
}

#[test]
fn query_key_captures_session_state_at_call_time() {
    let factory = started_factory();
    let mut session = CacheSession::new(factory.create_transaction_context())
        .with_tenant("acme")
        .enable_filter("active_only");
    let bindings = QueryParameterBindings::new().bind_named("name", TypedValue::new("string", "Ada"));

    let filtered = QueryKey::from_query("select * from person where name = :name", Limit::NONE, &bindings, &session);
    session.disable_filter("active_only");
    let unfiltered = QueryKey::from_query("select * from person where name = :name", Limit::NONE, &bindings, &session);

    assert_ne!(filtered, unfiltered);
    assert_eq!(filtered.tenant_id(), Some("acme"));
    assert!(filtered.enabled_filters().contains("active_only"));
    assert!(unfiltered.enabled_filters().is_empty());
}

#[test]
fn session_caching_timestamp_comes_from_the_factory_clock() {
    let factory = started_factory();
    let mut session = CacheSession::new(factory.create_transaction_context());
    assert_eq!(session.cache_transaction_synchronization().caching_timestamp(), Timestamp::new(1_000));

    factory.clock().advance_to(5_000);
    session.join_transaction();
    assert_eq!(session.cache_transaction_synchronization().caching_timestamp(), Timestamp::new(5_000));
}

#[test]
fn query_results_region_stores_stamped_results() {
    let factory = started_factory();
    let region = factory.build_query_results_region("people").unwrap();
    let key = QueryKey::new("select 1", QueryParameterBindings::new().query_key_memento(), Limit::NONE, [], None);
    let results = CachedQueryResults::new(Timestamp::new(7), vec![Value::from(1)]);

    region.put_into_cache(&key, results.clone()).unwrap();
    assert_eq!(region.get_from_cache(&key).unwrap(), Some(results));

    let ops = factory.query_results_region("people").unwrap().operations();
    assert!(matches!(ops.as_slice(), [RegionOp::Put { .. }, RegionOp::Get(_)]));
}

#[test]
fn timestamps_region_evicts_and_clears() {
    let factory = started_factory();
    let region = factory.build_timestamps_region("ts").unwrap();
    let person = QuerySpace::from("person");
    let orders = QuerySpace::from("orders");

    region.put_into_cache(&person, Timestamp::new(1)).unwrap();
    region.put_into_cache(&orders, Timestamp::new(2)).unwrap();
    region.remove_from_cache(&person).unwrap();
    assert_eq!(region.get_from_cache(&person).unwrap(), None);
    assert_eq!(region.len(), Some(1));

    region.clear().unwrap();
    assert_eq!(region.is_empty(), Some(true));
}

#[test]
fn domain_data_regions_share_storage_between_roles() {
    let factory = started_factory();
    let config = DomainDataRegionConfig::new("people")
        .with_entity("Person", AccessType::ReadWrite)
        .with_collection("Person.addresses", AccessType::NonstrictReadWrite);
    let region = factory.build_domain_data_region(&config).unwrap();

    let person = CacheKey::entity(Value::from(1), Arc::new(BasicType::LONG), "Person", None);
    let addresses = CacheKey::collection(Value::from(1), Arc::new(BasicType::LONG), "Person.addresses", None);
    region.put(&person, Value::from("Ada")).unwrap();

    assert!(region.contains(&person).unwrap());
    assert!(!region.contains(&addresses).unwrap());
    assert_eq!(region.config().roles().count(), 2);

    region.evict(&person).unwrap();
    assert_eq!(region.get(&person).unwrap(), None);
}

#[test]
fn building_before_start_fails() {
    let factory = MockRegionFactory::new(Arc::new(ManualTimestamper::default()));
    let error = factory.build_query_results_region("people").unwrap_err();
    assert!(!error.is_recoverable());
}

#[test]
fn qualification_follows_the_started_settings() {
    let factory = MockRegionFactory::new(Arc::new(ManualTimestamper::default()));
    factory.start(&CacheSettings::new().with_region_prefix("app")).unwrap();
    assert_eq!(factory.qualify("people"), "app.people");
}

#[test]
fn settings_deserialize_from_json() {
    let settings: CacheSettings = serde_json::from_str(
        r#"{
            "use_query_cache": true,
            "region_prefix": "app",
            "minimal_puts": true,
            "properties": { "vendor.option": "x" }
        }"#,
    )
    .unwrap();

    assert!(settings.use_second_level_cache);
    assert!(settings.use_query_cache);
    assert_eq!(settings.region_prefix.as_deref(), Some("app"));
    assert!(settings.minimal_puts_or(false));
    assert_eq!(settings.properties.get("vendor.option").map(String::as_str), Some("x"));
    assert_eq!(settings.query_results_region, tidemark_region::DEFAULT_QUERY_RESULTS_REGION_NAME);
}

#[test]
fn cache_keys_hash_consistently_into_maps() {
    let mut map = HashMap::new();
    for id in 0..100_i64 {
        map.insert(CacheKey::entity(Value::from(id), Arc::new(BasicType::LONG), "Person", None), id);
    }
    let lookup = CacheKey::entity(Value::from(42_i64), Arc::new(BasicType::LONG), "Person", None);
    assert_eq!(map.get(&lookup), Some(&42));
}
