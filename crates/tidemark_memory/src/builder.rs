// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring the in-memory region factory.

use std::{sync::Arc, time::Duration};

use tick::Clock;
use tidemark_region::{AccessType, SystemTimestamper, TimestampSource};

use crate::{factory::MemoryRegionFactory, region::Bounds};

/// Builder for a [`MemoryRegionFactory`].
///
/// Capacity and expiration bounds apply to query-results and domain-data regions. The
/// timestamps region ignores them: an evicted timestamp would make stale results look fresh.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tidemark_memory::MemoryRegionFactory;
///
/// let factory = MemoryRegionFactory::builder()
///     .max_capacity(10_000)
///     .time_to_live(Duration::from_secs(300))
///     .minimal_puts_by_default(true)
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct MemoryRegionFactoryBuilder {
    bounds: Bounds,
    minimal_puts_by_default: bool,
    default_access_type: Option<AccessType>,
    clock: Option<Clock>,
    timestamper: Option<Arc<dyn TimestampSource>>,
}

impl MemoryRegionFactoryBuilder {
    /// Creates a builder for unbounded regions driven by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of entries per region.
    #[must_use]
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.bounds.max_capacity = Some(capacity);
        self
    }

    /// Sets the pre-allocation hint per region.
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.bounds.initial_capacity = Some(capacity);
        self
    }

    /// Sets how long an entry lives after it was written.
    #[must_use]
    pub fn time_to_live(mut self, duration: Duration) -> Self {
        self.bounds.time_to_live = Some(duration);
        self
    }

    /// Sets how long an entry lives after it was last read or written.
    #[must_use]
    pub fn time_to_idle(mut self, duration: Duration) -> Self {
        self.bounds.time_to_idle = Some(duration);
        self
    }

    /// Sets whether minimal puts are on when the cache settings do not say.
    #[must_use]
    pub fn minimal_puts_by_default(mut self, enabled: bool) -> Self {
        self.minimal_puts_by_default = enabled;
        self
    }

    /// Sets the access type used for roles that do not name one.
    #[must_use]
    pub fn default_access_type(mut self, access_type: AccessType) -> Self {
        self.default_access_type = Some(access_type);
        self
    }

    /// Sets the clock the default [`SystemTimestamper`] reads. Defaults to the system clock.
    ///
    /// Ignored when a [`timestamper`][Self::timestamper] is set.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replaces the timestamp source, e.g. to seed it with a persisted floor or to drive it by hand.
    #[must_use]
    pub fn timestamper(mut self, timestamper: Arc<dyn TimestampSource>) -> Self {
        self.timestamper = Some(timestamper);
        self
    }

    /// Builds the factory. It must still be started before it builds regions.
    #[must_use]
    pub fn build(self) -> MemoryRegionFactory {
        let timestamper = match (self.timestamper, self.clock) {
            (Some(timestamper), _) => timestamper,
            (None, Some(clock)) => Arc::new(SystemTimestamper::new(clock)),
            (None, None) => Arc::new(SystemTimestamper::system()),
        };

        MemoryRegionFactory::from_parts(
            self.bounds,
            self.minimal_puts_by_default,
            self.default_access_type.unwrap_or(AccessType::ReadWrite),
            timestamper,
        )
    }
}
