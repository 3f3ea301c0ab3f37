// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache operations.

use std::borrow::Cow;

/// A specialized [`Result`] type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A cache operation failed.
///
/// This is an opaque error type that wraps any fault raised by a cache backend (serialization,
/// connectivity, provider misconfiguration) as well as lifecycle misuse of a region factory.
/// Use [`std::error::Error::source()`] to access the underlying cause if needed.
///
/// A cache *miss* is never reported through this type; lookups return `Ok(None)` instead.
///
/// # Examples
///
/// ```
/// use tidemark_region::Error;
///
/// let error = Error::backend("default-query-results-region", "connection reset");
/// assert!(error.is_recoverable());
/// assert!(error.to_string().contains("default-query-results-region"));
/// ```
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error(ErrorKind);

#[derive(Debug, thiserror::Error)]
enum ErrorKind {
    #[error("cache operation on region `{region}` failed: {source}")]
    Backend {
        region: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("cache operation failed: {0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("region factory has not been started")]
    NotStarted,

    #[error("region factory failed to start: {0}")]
    StartFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid cache configuration: {0}")]
    Configuration(Cow<'static, str>),
}

impl Error {
    /// Creates an error for a fault raised by the backend storing `region`.
    pub fn backend(region: impl Into<String>, cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(ErrorKind::Backend {
            region: region.into(),
            source: cause.into(),
        })
    }

    /// Creates a new error from any type that can be converted to an error.
    ///
    /// This is the public API for creating cache errors from backend adapters that do not
    /// know which region they are serving.
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(ErrorKind::Other(cause.into()))
    }

    /// Creates an error signalling that a region was requested from a factory that is not running.
    #[must_use]
    pub fn not_started() -> Self {
        Self(ErrorKind::NotStarted)
    }

    /// Creates an error signalling that the backend could not be started.
    pub fn start_failed(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(ErrorKind::StartFailed(cause.into()))
    }

    /// Creates an error for an invalid configuration value.
    pub fn configuration(message: impl Into<Cow<'static, str>>) -> Self {
        Self(ErrorKind::Configuration(message.into()))
    }

    /// Returns `true` if the caller may recover by bypassing the cache.
    ///
    /// Backend faults are recoverable: the caller falls back to executing the query against the
    /// primary store. Lifecycle and configuration failures are not.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self.0, ErrorKind::Backend { .. } | ErrorKind::Other(_))
    }
}
