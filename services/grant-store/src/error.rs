//! Error kinds surfaced by the grant store.
//!
//! A missing key is not an error: lookups return `Ok(None)`. Everything in
//! [`StoreError`] is a genuine failure the caller has to handle.

use std::time::Duration;

use rust_common::BoundError;
use thiserror::Error;

/// Grant store error.
///
/// An elapsed deadline is its own variant so callers can read the budget that
/// ran out, but it belongs to the backend-unavailable class: use
/// [`StoreError::is_backend_unavailable`] rather than matching
/// `BackendUnavailable` alone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Connection or I/O failure talking to the backing store
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend did not answer before the deadline; a backend-unavailable
    /// failure
    #[error("Backend timed out after {0:?}")]
    Timeout(Duration),

    /// A stored payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// The grant cannot be persisted as given
    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether the caller may retry the operation.
    ///
    /// Only transient backend failures qualify. The store never retries
    /// internally.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.is_backend_unavailable()
    }

    /// Whether the backend could not be reached in time, either a connection
    /// failure or an elapsed deadline.
    #[must_use]
    pub const fn is_backend_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::Timeout(_))
    }

    /// Create a backend-unavailable error.
    #[must_use]
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an invalid-grant error.
    #[must_use]
    pub fn invalid_grant(msg: impl Into<String>) -> Self {
        Self::InvalidGrant(msg.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        // A stored value that does not decode (e.g. invalid UTF-8) is corrupt
        // data, not an outage.
        if err.kind() == redis::ErrorKind::TypeError {
            Self::Serialization(err.to_string())
        } else {
            Self::BackendUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<BoundError> for StoreError {
    fn from(err: BoundError) -> Self {
        match err {
            BoundError::TimedOut(after) => Self::Timeout(after),
            BoundError::Cancelled => Self::Cancelled,
        }
    }
}

/// Convenience result alias.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(StoreError::backend("connection refused").is_retryable());
        assert!(StoreError::Timeout(Duration::from_secs(3)).is_retryable());
    }

    #[test]
    fn test_non_retryable_errors() {
        assert!(!StoreError::serialization("bad json").is_retryable());
        assert!(!StoreError::Cancelled.is_retryable());
        assert!(!StoreError::invalid_grant("expired").is_retryable());
        assert!(!StoreError::config("PORT").is_retryable());
    }

    #[test]
    fn test_bound_error_mapping() {
        assert_eq!(
            StoreError::from(BoundError::TimedOut(Duration::from_secs(3))),
            StoreError::Timeout(Duration::from_secs(3))
        );
        assert_eq!(StoreError::from(BoundError::Cancelled), StoreError::Cancelled);
    }

    #[test]
    fn test_timeout_is_backend_unavailable() {
        let err = StoreError::Timeout(Duration::from_secs(3));
        assert!(err.is_backend_unavailable());
        assert!(StoreError::backend("refused").is_backend_unavailable());
        assert!(!StoreError::Cancelled.is_backend_unavailable());
        assert!(!StoreError::serialization("bad").is_backend_unavailable());
    }

    #[test]
    fn test_redis_type_error_is_serialization() {
        let err = redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "Response was of incompatible type",
        ));
        let mapped = StoreError::from(err);
        assert!(matches!(mapped, StoreError::Serialization(_)));
        assert!(!mapped.is_retryable());
    }

    #[test]
    fn test_redis_io_error_is_backend_unavailable() {
        let err = redis::RedisError::from((redis::ErrorKind::IoError, "broken pipe"));
        let mapped = StoreError::from(err);
        assert!(matches!(mapped, StoreError::BackendUnavailable(_)));
        assert!(mapped.is_retryable());
    }

    #[test]
    fn test_json_error_is_serialization() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(StoreError::from(err), StoreError::Serialization(_)));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(StoreError::Cancelled.to_string(), "Operation cancelled");
        assert_eq!(
            StoreError::backend("down").to_string(),
            "Backend unavailable: down"
        );
    }
}
