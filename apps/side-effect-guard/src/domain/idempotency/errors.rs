//! Idempotency domain errors.

use thiserror::Error;

/// Errors raised while parsing idempotency identifiers from outside input.
///
/// Building ids from parameters never fails; these only cover ids and tags
/// that arrive as strings (operator tooling, stored keys).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdempotencyError {
    /// Effect tag is not one of the known effect types.
    #[error("unknown effect type: {0}")]
    UnknownEffectType(String),

    /// Entity id is not a 32 character lowercase hex digest.
    #[error("invalid entity id '{value}': {reason}")]
    InvalidEntityId {
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Store key does not follow `{namespace}:{effect}:{entity_id}`.
    #[error("malformed idempotency key: {0}")]
    MalformedKey(String),
}
