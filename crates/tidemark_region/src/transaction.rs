// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Binding cached results to the transaction that produced them.

use std::{cell::Cell, fmt, marker::PhantomData, sync::Arc};

use crate::{Timestamp, TimestampSource};

/// Per-session hooks tying cache interaction to the session's transaction lifecycle.
///
/// A synchronization belongs to exactly one session and is never shared between threads.
pub trait CacheTransactionSynchronization: Send + fmt::Debug {
    /// Returns the timestamp that results cached by this session are stamped with.
    fn caching_timestamp(&self) -> Timestamp;

    /// Called when the session joins a new transaction.
    fn transaction_joined(&mut self);

    /// Called before the transaction completes.
    fn transaction_completing(&mut self) {}

    /// Called after the transaction completed, with whether it committed.
    fn transaction_completed(&mut self, _successful: bool) {}
}

/// The synchronization used by all backends unless they supply their own.
///
/// The caching timestamp is taken from the factory clock when the synchronization is created and
/// refreshed every time the session joins a transaction, so cached results are never stamped
/// earlier than the start of the transaction that read them.
pub struct StandardCacheTransactionSynchronization {
    source: Arc<dyn TimestampSource>,
    last_completion: Timestamp,
    // Owned by one session at a time.
    _not_sync: PhantomData<Cell<()>>,
}

impl StandardCacheTransactionSynchronization {
    /// Creates a synchronization primed from `source`.
    #[must_use]
    pub fn new(source: Arc<dyn TimestampSource>) -> Self {
        let last_completion = source.next();
        Self {
            source,
            last_completion,
            _not_sync: PhantomData,
        }
    }
}

impl CacheTransactionSynchronization for StandardCacheTransactionSynchronization {
    fn caching_timestamp(&self) -> Timestamp {
        self.last_completion
    }

    fn transaction_joined(&mut self) {
        self.last_completion = self.source.next();
    }
}

impl fmt::Debug for StandardCacheTransactionSynchronization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardCacheTransactionSynchronization")
            .field("last_completion", &self.last_completion)
            .finish_non_exhaustive()
    }
}
