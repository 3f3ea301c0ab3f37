// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! What the cache needs to know about the session it serves.

use std::{collections::BTreeSet, fmt, sync::Arc};

use crate::CacheTransactionSynchronization;

/// Observes the session's interaction with the second-level cache.
///
/// Every hook defaults to a no-op. Listeners are typically used by the owning runtime to collect
/// per-session statistics.
pub trait CacheEventListener: Send + Sync + fmt::Debug {
    /// Called before a cache read.
    fn cache_get_start(&self) {}

    /// Called after a cache read, with whether it produced a usable value.
    fn cache_get_end(&self, _hit: bool) {}

    /// Called before a cache write.
    fn cache_put_start(&self) {}

    /// Called after a cache write.
    fn cache_put_end(&self) {}
}

/// A listener that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCacheEventListener;

impl CacheEventListener for NoopCacheEventListener {}

/// The session-side view the caches read from.
pub trait SessionContext: fmt::Debug {
    /// Returns the session's transaction synchronization.
    fn cache_transaction_synchronization(&self) -> &dyn CacheTransactionSynchronization;

    /// Returns the names of the filters enabled on the session.
    fn enabled_filter_names(&self) -> &BTreeSet<String>;

    /// Returns the session's tenant, if multi-tenancy is in use.
    fn tenant_identifier(&self) -> Option<&str>;

    /// Returns the listener to notify around cache reads and writes.
    fn cache_event_listener(&self) -> &dyn CacheEventListener {
        &NoopCacheEventListener
    }
}

/// A ready-made [`SessionContext`] for runtimes without their own session type.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tidemark_region::{CacheSession, SessionContext, StandardCacheTransactionSynchronization, SystemTimestamper};
///
/// let sync = StandardCacheTransactionSynchronization::new(Arc::new(SystemTimestamper::system()));
/// let session = CacheSession::new(Box::new(sync))
///     .with_tenant("acme")
///     .enable_filter("active");
///
/// assert_eq!(session.tenant_identifier(), Some("acme"));
/// assert!(session.enabled_filter_names().contains("active"));
/// ```
#[derive(Debug)]
pub struct CacheSession {
    synchronization: Box<dyn CacheTransactionSynchronization>,
    enabled_filters: BTreeSet<String>,
    tenant_id: Option<String>,
    listener: Arc<dyn CacheEventListener>,
}

impl CacheSession {
    /// Creates a session around a transaction synchronization.
    #[must_use]
    pub fn new(synchronization: Box<dyn CacheTransactionSynchronization>) -> Self {
        Self {
            synchronization,
            enabled_filters: BTreeSet::new(),
            tenant_id: None,
            listener: Arc::new(NoopCacheEventListener),
        }
    }

    /// Sets the tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Enables a filter.
    #[must_use]
    pub fn enable_filter(mut self, name: impl Into<String>) -> Self {
        self.enabled_filters.insert(name.into());
        self
    }

    /// Disables a filter. Disabling a filter that is not enabled does nothing.
    pub fn disable_filter(&mut self, name: &str) {
        self.enabled_filters.remove(name);
    }

    /// Sets the event listener.
    #[must_use]
    pub fn with_event_listener(mut self, listener: Arc<dyn CacheEventListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Marks the start of a new transaction.
    pub fn join_transaction(&mut self) {
        self.synchronization.transaction_joined();
    }

    /// Marks the end of the current transaction.
    pub fn complete_transaction(&mut self, successful: bool) {
        self.synchronization.transaction_completing();
        self.synchronization.transaction_completed(successful);
    }
}

impl SessionContext for CacheSession {
    fn cache_transaction_synchronization(&self) -> &dyn CacheTransactionSynchronization {
        self.synchronization.as_ref()
    }

    fn enabled_filter_names(&self) -> &BTreeSet<String> {
        &self.enabled_filters
    }

    fn tenant_identifier(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    fn cache_event_listener(&self) -> &dyn CacheEventListener {
        self.listener.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::{StandardCacheTransactionSynchronization, Timestamp, TimestampSource};

    #[derive(Debug, Default)]
    struct Counter(AtomicU64);

    impl TimestampSource for Counter {
        fn next(&self) -> Timestamp {
            Timestamp::new(self.0.fetch_add(1, Ordering::Relaxed))
        }
    }

    fn session() -> CacheSession {
        CacheSession::new(Box::new(StandardCacheTransactionSynchronization::new(Arc::new(
            Counter::default(),
        ))))
    }

    #[test]
    fn filters_can_be_toggled() {
        let mut session = session().enable_filter("a").enable_filter("b");
        session.disable_filter("a");
        session.disable_filter("missing");
        assert_eq!(session.enabled_filter_names().iter().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn joining_refreshes_the_caching_timestamp() {
        let mut session = session();
        let before = session.cache_transaction_synchronization().caching_timestamp();
        session.join_transaction();
        assert!(session.cache_transaction_synchronization().caching_timestamp() > before);
        session.complete_transaction(true);
    }

    #[test]
    fn defaults_to_no_tenant() {
        assert_eq!(session().tenant_identifier(), None);
    }
}
