// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Query Cache Example
//!
//! Walks through one reader and one writer sharing the in-memory backend:
//! the reader caches a query result, the writer invalidates the `person` space
//! around its transaction, and the reader's next lookup misses.
//!
//! Cache events are printed by a `tracing-subscriber` formatter at `DEBUG`.

use std::{sync::Arc, time::Duration};

use tidemark::{
    AccessType, CacheManager, CacheSession, CacheSettings, DomainDataRegionConfig, Limit, MemoryRegionFactory, QueryKey,
    QueryParameterBindings, QuerySpace, TypedValue, Value,
};
use tracing_subscriber::fmt;

fn main() -> Result<(), tidemark::Error> {
    fmt().with_max_level(tracing::Level::DEBUG).with_target(false).init();

    let factory = MemoryRegionFactory::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(600))
        .build();

    let manager = CacheManager::builder()
        .region_factory(Arc::new(factory))
        .settings(CacheSettings::new().with_query_cache(true).with_region_prefix("demo"))
        .domain_data_region(DomainDataRegionConfig::new("people").with_entity("Person", AccessType::ReadWrite))
        .build()?;

    let Some(results) = manager.default_query_results_cache() else {
        return Err(tidemark::Error::configuration("query cache is disabled"));
    };
    let timestamps = manager.timestamps_cache();
    let person = [QuerySpace::from("person")];

    let reader = CacheSession::new(manager.create_transaction_context());
    let bindings = QueryParameterBindings::new().bind_named("name", TypedValue::new("string", "Ada"));
    let key = QueryKey::from_query(
        "select p.id from Person p where p.name = :name",
        Limit::max_rows(10),
        &bindings,
        &reader,
    );

    results.put(&key, vec![Value::from(1_i64), Value::from(7_i64)], &reader)?;
    println!("cached: {:?}", results.get(&key, &person, &reader)?);

    let mut writer = CacheSession::new(manager.create_transaction_context());
    writer.join_transaction();
    timestamps.pre_invalidate(&person, &writer)?;
    println!("during write: {:?}", results.get(&key, &person, &reader)?);
    timestamps.invalidate(&person, &writer)?;
    writer.complete_transaction(true);

    println!("after commit: {:?}", results.get(&key, &person, &reader)?);

    let reader = CacheSession::new(manager.create_transaction_context());
    results.put(&key, vec![Value::from(1_i64)], &reader)?;
    println!("re-cached: {:?}", results.get(&key, &person, &reader)?);

    println!("regions: {:?}", manager.region_names());
    manager.close()
}
