// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Logical timestamps used to order cache writes against invalidations.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use tick::{Clock, runtime::InactiveClock};

/// Number of low bits reserved for the per-millisecond counter.
const BIN_DIGITS: u32 = 12;

/// Timestamp ticks per wall-clock millisecond.
pub const TICKS_PER_MILLISECOND: u64 = 1 << BIN_DIGITS;

/// Default pre-invalidation window: 60 seconds expressed in ticks.
pub const DEFAULT_TIMEOUT: u64 = 60_000 * TICKS_PER_MILLISECOND;

/// An opaque, monotonically non-decreasing logical clock value.
///
/// Only ordering matters; a `Timestamp` is not wall-clock time and carries no unit.
///
/// # Examples
///
/// ```
/// use tidemark_region::Timestamp;
///
/// let a = Timestamp::new(100);
/// let b = a.saturating_add(1);
/// assert!(b > a);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The smallest timestamp.
    pub const ZERO: Self = Self(0);

    /// Wraps a raw clock value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw clock value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Adds `ticks`, saturating at the largest representable timestamp.
    #[must_use]
    pub const fn saturating_add(self, ticks: u64) -> Self {
        Self(self.0.saturating_add(ticks))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A source of logical timestamps.
///
/// Region factories delegate their clock to a `TimestampSource`; the per-session
/// [`StandardCacheTransactionSynchronization`][crate::StandardCacheTransactionSynchronization]
/// holds on to the same source so it can refresh its caching timestamp.
pub trait TimestampSource: Send + Sync + fmt::Debug {
    /// Returns the next timestamp. Never lower than any value previously returned.
    fn next(&self) -> Timestamp;

    /// Returns the width of the pre-invalidation window in ticks.
    fn timeout(&self) -> u64 {
        DEFAULT_TIMEOUT
    }
}

/// Wall-clock based timestamp source.
///
/// Values are the clock's system time in milliseconds shifted left by 12 bits; the low bits
/// count calls within the same millisecond, giving 4096 distinct values per millisecond. Bursts
/// of more calls than that borrow from the following milliseconds, so the sequence runs slightly
/// ahead of the wall clock instead of repeating a value.
///
/// Seeding with [`with_floor`][Self::with_floor] keeps values monotonic across restarts when the
/// last issued value was persisted by the backend.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, SystemTime};
///
/// use tick::Clock;
/// use tidemark_region::{SystemTimestamper, Timestamp, TimestampSource};
///
/// let clock = Clock::new_frozen_at(SystemTime::UNIX_EPOCH + Duration::from_millis(2));
/// let timestamper = SystemTimestamper::new(clock);
///
/// assert_eq!(timestamper.next(), Timestamp::new(2 << 12));
/// assert_eq!(timestamper.next(), Timestamp::new((2 << 12) + 1));
/// ```
#[derive(Debug)]
pub struct SystemTimestamper {
    clock: Clock,
    last: AtomicU64,
}

impl SystemTimestamper {
    /// Creates a timestamper reading `clock`, with no floor.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self::with_floor(clock, Timestamp::ZERO)
    }

    /// Creates a timestamper reading `clock` that never returns a value lower than or equal
    /// to `floor`.
    #[must_use]
    pub fn with_floor(clock: Clock, floor: Timestamp) -> Self {
        Self {
            clock,
            last: AtomicU64::new(floor.as_u64()),
        }
    }

    /// Creates a timestamper reading the system clock.
    ///
    /// Only [`Clock::system_time`] is used, so the clock's timer driver is not needed.
    #[must_use]
    pub fn system() -> Self {
        let (clock, _driver) = InactiveClock::default().activate();
        Self::new(clock)
    }

    /// Converts a wall-clock duration into timestamp ticks.
    #[must_use]
    pub fn ticks(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .saturating_mul(TICKS_PER_MILLISECOND)
    }

    fn base(&self) -> u64 {
        // A clock set before the epoch degrades to counting from zero.
        let since_epoch = self
            .clock
            .system_time()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self::ticks(since_epoch)
    }
}

impl Default for SystemTimestamper {
    fn default() -> Self {
        Self::system()
    }
}

impl TimestampSource for SystemTimestamper {
    fn next(&self) -> Timestamp {
        let base = self.base();
        let mut current = self.last.load(Ordering::Acquire);
        loop {
            let update = base.max(current.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(current, update, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Timestamp(update),
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread, time::SystemTime};

    use tick::ClockControl;

    use super::*;

    fn at_millis(millis: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(millis)
    }

    #[test]
    fn base_is_milliseconds_shifted_by_twelve_bits() {
        let timestamper = SystemTimestamper::new(Clock::new_frozen_at(at_millis(1_000)));
        assert_eq!(timestamper.next(), Timestamp::new(1_000 << 12));
        assert_eq!(timestamper.next(), Timestamp::new((1_000 << 12) + 1));
    }

    #[test]
    fn advancing_clock_resets_to_the_new_millisecond() {
        let control = ClockControl::new_at(at_millis(5));
        let timestamper = SystemTimestamper::new(control.to_clock());
        for _ in 0..3 {
            timestamper.next();
        }

        control.advance_millis(1);
        assert_eq!(timestamper.next(), Timestamp::new(6 << 12));
    }

    #[test]
    fn bursts_borrow_from_following_milliseconds() {
        let timestamper = SystemTimestamper::new(Clock::new_frozen_at(at_millis(10)));
        let mut last = Timestamp::ZERO;
        for _ in 0..=TICKS_PER_MILLISECOND {
            last = timestamper.next();
        }
        assert_eq!(last, Timestamp::new(11 << 12));
    }

    #[test]
    fn floor_ahead_of_the_clock_wins() {
        let floor = Timestamp::new(50 << 12);
        let timestamper = SystemTimestamper::with_floor(Clock::new_frozen_at(at_millis(10)), floor);
        assert_eq!(timestamper.next(), floor.saturating_add(1));
    }

    #[test]
    fn clock_ahead_of_the_floor_wins() {
        let clock = Clock::new_frozen_at(at_millis(90));
        let timestamper = SystemTimestamper::with_floor(clock, Timestamp::new(50 << 12));
        assert_eq!(timestamper.next(), Timestamp::new(90 << 12));
    }

    #[test]
    fn system_timestamps_strictly_increase() {
        let timestamper = SystemTimestamper::system();
        let mut previous = timestamper.next();
        for _ in 0..10_000 {
            let next = timestamper.next();
            assert!(next > previous, "{next} should be greater than {previous}");
            previous = next;
        }
    }

    #[test]
    fn timestamps_are_unique_across_threads() {
        let timestamper = Arc::new(SystemTimestamper::new(Clock::new_frozen_at(at_millis(1))));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let timestamper = Arc::clone(&timestamper);
                thread::spawn(move || (0..1_000).map(|_| timestamper.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for ts in handle.join().expect("thread panicked") {
                assert!(seen.insert(ts), "duplicate timestamp {ts}");
            }
        }
    }

    #[test]
    fn default_timeout_is_sixty_seconds() {
        assert_eq!(DEFAULT_TIMEOUT, SystemTimestamper::ticks(Duration::from_secs(60)));
        assert_eq!(SystemTimestamper::default().timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn saturating_add_saturates() {
        assert_eq!(Timestamp::new(u64::MAX).saturating_add(5), Timestamp::new(u64::MAX));
    }
}
