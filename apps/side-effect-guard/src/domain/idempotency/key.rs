//! Idempotency key value object.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::effect_type::EffectType;
use super::entity_id::EntityId;
use super::errors::IdempotencyError;

/// Default key namespace.
pub const DEFAULT_NAMESPACE: &str = "effect";

/// Store key for one logical side effect: `{namespace}:{effect}:{entity_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey {
    namespace: String,
    effect: EffectType,
    entity_id: EntityId,
}

impl IdempotencyKey {
    /// Create a key.
    #[must_use]
    pub fn new(namespace: impl Into<String>, effect: EffectType, entity_id: EntityId) -> Self {
        Self {
            namespace: namespace.into(),
            effect,
            entity_id,
        }
    }

    /// Parse a key read back from the store.
    ///
    /// The namespace may itself contain `:`; the last two segments are the
    /// effect tag and the entity id.
    ///
    /// # Errors
    ///
    /// Returns an error if the key has fewer than three segments or either
    /// trailing segment is invalid.
    pub fn parse(key: &str) -> Result<Self, IdempotencyError> {
        let mut parts = key.rsplitn(3, ':');
        let (Some(entity), Some(effect), Some(namespace)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(IdempotencyError::MalformedKey(key.to_string()));
        };
        if namespace.is_empty() {
            return Err(IdempotencyError::MalformedKey(key.to_string()));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            effect: effect.parse()?,
            entity_id: EntityId::parse(entity)?,
        })
    }

    /// Key namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Effect type.
    #[must_use]
    pub const fn effect(&self) -> EffectType {
        self.effect
    }

    /// Entity id.
    #[must_use]
    pub const fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.effect, self.entity_id)
    }
}
