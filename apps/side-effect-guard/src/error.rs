//! Errors returned by guarded execution.
//!
//! `execute_once` never hides a business error: whatever the wrapped
//! operation returned comes back as [`GuardError::Operation`]. The only
//! error the guard adds itself is [`GuardError::StoreUnavailable`], and only
//! under the `refuse_when_unavailable` outage policy.

use thiserror::Error;

/// Error from a guarded execution.
#[derive(Debug, Error)]
pub enum GuardError<E> {
    /// The wrapped operation failed. Its claim was rolled back so a retry
    /// can claim again.
    #[error("{0}")]
    Operation(E),

    /// The coordination store could not arbitrate the claim, so the
    /// operation was not run.
    #[error("Coordination store unavailable for {key}: {reason}")]
    StoreUnavailable {
        /// Idempotency key that could not be claimed.
        key: String,
        /// What failed.
        reason: String,
    },
}

impl<E> GuardError<E> {
    /// The business error, if that is what this is.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(e) => Some(e),
            Self::StoreUnavailable { .. } => None,
        }
    }

    /// Whether the operation was refused without running.
    pub const fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}
