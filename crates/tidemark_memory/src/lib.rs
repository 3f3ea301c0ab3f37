// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-memory backend for the tidemark second-level cache, backed by moka.
//!
//! [`MemoryRegionFactory`] builds [`MemoryRegion`]s for timestamps and query results and
//! [`MemoryDomainDataRegion`]s for entity, collection and natural-id data. Configure capacity
//! and expiration through [`MemoryRegionFactoryBuilder`] without exposing moka types.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//! use tidemark_memory::MemoryRegionFactory;
//! use tidemark_region::{CacheSettings, QuerySpace, RegionFactory, Timestamp};
//!
//! let factory = MemoryRegionFactory::builder()
//!     .max_capacity(1000)
//!     .time_to_live(Duration::from_secs(300))
//!     .build();
//! factory.start(&CacheSettings::new())?;
//!
//! let timestamps = factory.build_timestamps_region("default-update-timestamps-region")?;
//! timestamps.put_into_cache(&QuerySpace::from("person"), Timestamp::new(1))?;
//! assert_eq!(timestamps.get_from_cache(&QuerySpace::from("person"))?, Some(Timestamp::new(1)));
//! # Ok::<(), tidemark_region::Error>(())
//! ```
//!
//! The timestamps region is never bounded by capacity or expiration, whatever the builder says.

mod builder;
mod factory;
mod region;

#[doc(inline)]
pub use builder::MemoryRegionFactoryBuilder;
#[doc(inline)]
pub use factory::MemoryRegionFactory;
#[doc(inline)]
pub use region::{MemoryDomainDataRegion, MemoryRegion};
