// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured cache events emitted through `tracing`.
//!
//! Every cache operation reports what it did as one event carrying the region name, the
//! operation and the resulting activity. Timestamps-cache operations also carry the query space
//! and timestamp involved.

use tidemark_region::{QuerySpace, Timestamp};

pub(crate) mod attributes;
#[cfg(test)]
pub(crate) mod testing;

/// Sink for cache events.
///
/// Construct one and pass it to the cache manager builder via
/// [`telemetry`][crate::CacheManagerBuilder::telemetry]. Events are emitted as `tracing` events
/// named `cache.event`; subscribe with any `tracing` subscriber to collect them.
///
/// # Examples
///
/// ```
/// use tidemark::CacheTelemetry;
///
/// let enabled = CacheTelemetry::new(true);
/// assert!(enabled.is_enabled());
/// assert!(!CacheTelemetry::disabled().is_enabled());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheTelemetry {
    logging_enabled: bool,
}

impl CacheTelemetry {
    /// Creates a telemetry sink.
    #[must_use]
    pub const fn new(logging_enabled: bool) -> Self {
        Self { logging_enabled }
    }

    /// Creates a sink that emits nothing.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(false)
    }

    /// Returns `true` if events are emitted.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        self.logging_enabled
    }

    #[inline]
    pub(crate) fn record(self, region: &str, operation: CacheOperation, activity: CacheActivity) {
        if self.logging_enabled {
            Self::emit(region, operation, activity, None);
        }
    }

    #[inline]
    pub(crate) fn record_space(
        self,
        region: &str,
        operation: CacheOperation,
        activity: CacheActivity,
        space: &QuerySpace,
        timestamp: Timestamp,
    ) {
        if self.logging_enabled {
            Self::emit(region, operation, activity, Some((space, timestamp)));
        }
    }

    fn emit(region: &str, operation: CacheOperation, activity: CacheActivity, space: Option<(&QuerySpace, Timestamp)>) {
        let op = operation.as_str();
        let act = activity.as_str();
        let space_name = space.map(|(space, _)| space.as_str());
        let timestamp = space.map(|(_, timestamp)| timestamp.as_u64());

        // Tracing levels must be constant, so a macro selects the level.
        // Field names must match the constants in attributes.rs.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = region,
                    cache.operation = op,
                    cache.activity = act,
                    cache.space = space_name,
                    cache.timestamp = timestamp,
                    "cache.event"
                )
            };
        }

        match activity.severity() {
            Severity::Error => emit_event!(error),
            Severity::Info => emit_event!(info),
            Severity::Debug => emit_event!(debug),
        }
    }
}

impl Default for CacheTelemetry {
    fn default() -> Self {
        Self::new(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Get,
    Put,
    PreInvalidate,
    Invalidate,
    Clear,
    Destroy,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::Put => "cache.put",
            Self::PreInvalidate => "cache.pre_invalidate",
            Self::Invalidate => "cache.invalidate",
            Self::Clear => "cache.clear",
            Self::Destroy => "cache.destroy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Stale,
    Inserted,
    Skipped,
    Invalidated,
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Severity {
    Debug,
    Info,
    Error,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Stale => "cache.stale",
            Self::Inserted => "cache.inserted",
            Self::Skipped => "cache.skipped",
            Self::Invalidated => "cache.invalidated",
            Self::Ok => "cache.ok",
            Self::Error => "cache.error",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::Hit | Self::Miss | Self::Inserted | Self::Skipped | Self::Ok => Severity::Debug,
            Self::Stale | Self::Invalidated => Severity::Info,
            Self::Error => Severity::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::LogCapture, *};

    #[test]
    fn operation_names() {
        assert_eq!(CacheOperation::Get.as_str(), "cache.get");
        assert_eq!(CacheOperation::Put.as_str(), "cache.put");
        assert_eq!(CacheOperation::PreInvalidate.as_str(), "cache.pre_invalidate");
        assert_eq!(CacheOperation::Invalidate.as_str(), "cache.invalidate");
        assert_eq!(CacheOperation::Clear.as_str(), "cache.clear");
        assert_eq!(CacheOperation::Destroy.as_str(), "cache.destroy");
    }

    #[test]
    fn activity_severity() {
        assert_eq!(CacheActivity::Hit.severity(), Severity::Debug);
        assert_eq!(CacheActivity::Skipped.severity(), Severity::Debug);
        assert_eq!(CacheActivity::Stale.severity(), Severity::Info);
        assert_eq!(CacheActivity::Invalidated.severity(), Severity::Info);
        assert_eq!(CacheActivity::Error.severity(), Severity::Error);
    }

    #[test]
    fn emit_contains_all_fields_and_values() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        CacheTelemetry::new(true).record_space(
            "default-update-timestamps-region",
            CacheOperation::Invalidate,
            CacheActivity::Invalidated,
            &QuerySpace::from("person"),
            Timestamp::new(4096),
        );

        capture.assert_contains(attributes::CACHE_NAME);
        capture.assert_contains(attributes::CACHE_OPERATION_NAME);
        capture.assert_contains(attributes::CACHE_ACTIVITY_NAME);
        capture.assert_contains(attributes::CACHE_SPACE_NAME);
        capture.assert_contains(attributes::CACHE_TIMESTAMP_NAME);
        capture.assert_contains(attributes::CACHE_EVENT_NAME);

        capture.assert_contains("default-update-timestamps-region");
        capture.assert_contains("cache.invalidated");
        capture.assert_contains("person");
        capture.assert_contains("4096");
    }

    #[test]
    fn emit_at_matching_levels() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        CacheTelemetry::default().record("r", CacheOperation::Get, CacheActivity::Error);
        capture.assert_contains("ERROR");

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        CacheTelemetry::default().record("r", CacheOperation::Get, CacheActivity::Stale);
        capture.assert_contains("INFO");

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        CacheTelemetry::default().record("r", CacheOperation::Get, CacheActivity::Hit);
        capture.assert_contains("DEBUG");
    }

    #[test]
    fn disabled_telemetry_emits_nothing() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        CacheTelemetry::disabled().record("r", CacheOperation::Put, CacheActivity::Inserted);

        assert!(capture.output().is_empty());
    }
}
