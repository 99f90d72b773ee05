//! Guard record payloads.
//!
//! A guard record's value encodes its lifecycle state:
//!
//! | Stored value          | State     | Read back as                    |
//! |-----------------------|-----------|---------------------------------|
//! | `""`                  | Claimed   | [`PriorResult::Pending`]        |
//! | valid JSON            | Completed | [`CachedResult::Structured`]    |
//! | anything else         | Completed | [`CachedResult::Raw`]           |
//!
//! Completion payloads are produced by [`encode_completion`]:
//!
//! | `serde_json` result   | Stored value            | Encoding          |
//! |-----------------------|-------------------------|-------------------|
//! | Ok                    | JSON text               | `Structured`      |
//! | Err                   | `Debug` rendering       | `StringFallback`  |
//!
//! A unit result serializes as `null`, so a Completed record is never empty
//! and cannot be confused with a claim placeholder.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Placeholder value written while a claim is held.
pub const CLAIM_PLACEHOLDER: &str = "";

/// Result of a previous execution as read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CachedResult {
    /// Payload parsed as JSON.
    Structured(serde_json::Value),
    /// Payload that is not JSON (string fallback of an unserializable result).
    Raw(String),
}

impl CachedResult {
    /// Decode a stored payload. Returns `None` for the claim placeholder.
    #[must_use]
    pub fn from_payload(payload: &str) -> Option<Self> {
        if payload == CLAIM_PLACEHOLDER {
            return None;
        }
        Some(
            serde_json::from_str(payload)
                .map_or_else(|_| Self::Raw(payload.to_string()), Self::Structured),
        )
    }

    /// Deserialize a structured payload into a caller type.
    ///
    /// Returns `None` for raw payloads or shape mismatches.
    #[must_use]
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        match self {
            Self::Structured(value) => serde_json::from_value(value.clone()).ok(),
            Self::Raw(_) => None,
        }
    }

    /// Whether this payload came from the string fallback path.
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

/// What a duplicate caller learns about the first execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum PriorResult {
    /// The first execution completed and its result was cached.
    Cached(CachedResult),
    /// A claim exists but no result is readable yet (in flight, cache write
    /// failed, or the store could not be read). Callers must treat the
    /// outcome as unknown.
    Pending,
}

impl PriorResult {
    /// Build from a stored payload (`None` when the record is gone or unreadable).
    #[must_use]
    pub fn from_payload(payload: Option<&str>) -> Self {
        payload
            .and_then(CachedResult::from_payload)
            .map_or(Self::Pending, Self::Cached)
    }

    /// Cached result, if any.
    #[must_use]
    pub const fn cached(&self) -> Option<&CachedResult> {
        match self {
            Self::Cached(result) => Some(result),
            Self::Pending => None,
        }
    }

    /// Decode the cached result into a caller type.
    #[must_use]
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        self.cached().and_then(CachedResult::decode)
    }
}

/// How a completion payload was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// JSON serialization succeeded.
    Structured,
    /// Serialization failed; the `Debug` rendering was stored instead.
    StringFallback,
}

/// Encode an operation result for the Completed record.
#[must_use]
pub fn encode_completion<T: Serialize + Debug>(result: &T) -> (String, PayloadEncoding) {
    match serde_json::to_string(result) {
        Ok(json) => (json, PayloadEncoding::Structured),
        Err(e) => {
            tracing::warn!(error = %e, "Result not serializable, caching string fallback");
            (format!("{result:?}"), PayloadEncoding::StringFallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ack {
        order_id: String,
        filled: bool,
    }

    #[test]
    fn placeholder_is_pending() {
        assert_eq!(CachedResult::from_payload(""), None);
        assert_eq!(PriorResult::from_payload(Some("")), PriorResult::Pending);
        assert_eq!(PriorResult::from_payload(None), PriorResult::Pending);
    }

    #[test]
    fn json_payload_is_structured() {
        let cached = CachedResult::from_payload(r#"{"order_id":"O-1","filled":true}"#).unwrap();
        assert!(!cached.is_raw());
        assert_eq!(
            cached.decode::<Ack>(),
            Some(Ack {
                order_id: "O-1".into(),
                filled: true
            })
        );
    }

    #[test]
    fn non_json_payload_is_raw() {
        let cached = CachedResult::from_payload("Ack { order_id: \"O-1\" }").unwrap();
        assert!(cached.is_raw());
        assert_eq!(cached.decode::<Ack>(), None);
    }

    #[test]
    fn unit_result_is_not_empty() {
        let (payload, encoding) = encode_completion(&());
        assert_eq!(payload, "null");
        assert_eq!(encoding, PayloadEncoding::Structured);
        assert_eq!(
            CachedResult::from_payload(&payload),
            Some(CachedResult::Structured(serde_json::Value::Null))
        );
    }

    #[test]
    fn unserializable_result_falls_back_to_debug() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not valid JSON object keys");
        let (payload, encoding) = encode_completion(&map);
        assert_eq!(encoding, PayloadEncoding::StringFallback);
        assert!(payload.contains("(1, 2)"));
        assert!(CachedResult::from_payload(&payload).unwrap().is_raw());
    }
}
