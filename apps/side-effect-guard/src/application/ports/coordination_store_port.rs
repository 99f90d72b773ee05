//! Coordination Store Port (Driven Port)
//!
//! The shared key-value store that arbitrates claims. All mutual exclusion
//! in the guard is delegated to [`CoordinationStore::set_if_absent`]; the
//! store is the only shared mutable resource.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Store communication failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Could not reach the store or the connection dropped.
    #[error("Store connection error: {message}")]
    Connection {
        /// Error details.
        message: String,
    },

    /// Command did not complete in time.
    #[error("Store command timed out after {timeout:?}")]
    Timeout {
        /// Configured command timeout.
        timeout: Duration,
    },

    /// Store answered with something we could not interpret.
    #[error("Store protocol error: {message}")]
    Protocol {
        /// Error details.
        message: String,
    },

    /// Store refused the command (read-only replica, disabled command, OOM).
    #[error("Store rejected command: {message}")]
    Rejected {
        /// Error details.
        message: String,
    },
}

impl StoreError {
    /// Whether retrying the same command later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Key-value store with atomic conditional create and expiry.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Atomically create `key` with `value` and `ttl` unless it exists.
    ///
    /// Returns `true` only for the single caller that created it.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
    -> Result<bool, StoreError>;

    /// Unconditionally write `key`, resetting its TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Read `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Whether `key` exists.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete `key`. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Remaining lifetime of `key`; `None` if missing or without expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;

    /// Connection-level liveness check.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(
            StoreError::Connection {
                message: "reset".into()
            }
            .is_transient()
        );
        assert!(
            StoreError::Timeout {
                timeout: Duration::from_secs(2)
            }
            .is_transient()
        );
        assert!(
            !StoreError::Rejected {
                message: "READONLY".into()
            }
            .is_transient()
        );
    }
}
