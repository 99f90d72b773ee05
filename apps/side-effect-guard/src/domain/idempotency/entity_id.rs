//! Entity identity builder.
//!
//! An entity id names one logical side effect. It is derived from the
//! effect tag and the operation's domain parameters:
//!
//! ```text
//! canonical = "{tag}|{k1}={v1}|{k2}={v2}|..."   (keys sorted)
//! entity_id = hex(sha256(canonical))[..32]
//! ```
//!
//! Sorting the parameters is what makes the id independent of call-site
//! argument order. Absent optional parameters are left out of the canonical
//! string entirely rather than encoded as null.
//!
//! `\`, `|` and `=` inside the tag, keys and values are backslash-escaped,
//! so a value can never spell out an extra `k=v` pair. Strings free of
//! those characters canonicalize unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::effect_type::EffectType;
use super::errors::IdempotencyError;

/// Number of hex characters kept from the SHA-256 digest.
pub const ENTITY_ID_LEN: usize = 32;

/// A primitive parameter value participating in an entity id.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Free-form text (symbols, ids, sides, states).
    Str(String),
    /// Signed integer.
    Int(i64),
    /// Binary float, rendered with a trailing `.0` for whole numbers.
    Float(f64),
    /// Exact decimal, normalized so `1.50` and `1.5` collide.
    Decimal(Decimal),
    /// Boolean flag.
    Bool(bool),
}

impl ParamValue {
    /// Canonical text used in the digest.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format!("{f:?}"),
            Self::Decimal(d) => d.normalize().to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Decimal> for ParamValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Deterministic identifier of a logical side effect.
///
/// Always [`ENTITY_ID_LEN`] lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Parse an entity id received from outside (operator input, stored keys).
    ///
    /// # Errors
    ///
    /// Returns [`IdempotencyError::InvalidEntityId`] unless the value is
    /// exactly 32 lowercase hex characters.
    pub fn parse(value: &str) -> Result<Self, IdempotencyError> {
        if value.len() != ENTITY_ID_LEN {
            return Err(IdempotencyError::InvalidEntityId {
                value: value.to_string(),
                reason: "expected 32 characters",
            });
        }
        if !value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(IdempotencyError::InvalidEntityId {
                value: value.to_string(),
                reason: "expected lowercase hex",
            });
        }
        Ok(Self(value.to_string()))
    }

    /// Get the id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = IdempotencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = IdempotencyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

/// Collects named parameters and produces an [`EntityId`].
///
/// Keys are kept sorted; setting the same key twice keeps the last value.
#[derive(Debug, Clone)]
pub struct EntityIdBuilder {
    tag: String,
    params: BTreeMap<String, ParamValue>,
}

impl EntityIdBuilder {
    /// Start a builder for an arbitrary tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            params: BTreeMap::new(),
        }
    }

    /// Start a builder for one of the known effect types.
    #[must_use]
    pub fn for_effect(effect: EffectType) -> Self {
        Self::new(effect.as_str())
    }

    /// Add a parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a parameter only when present.
    #[must_use]
    pub fn param_opt<V: Into<ParamValue>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    /// Canonical string fed into the digest.
    #[must_use]
    pub fn canonical(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", escape(k), escape(&v.canonical())))
            .collect::<Vec<_>>()
            .join("|");
        format!("{}|{params}", escape(&self.tag))
    }

    /// Compute the entity id.
    #[must_use]
    pub fn build(&self) -> EntityId {
        let digest = Sha256::digest(self.canonical().as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(ENTITY_ID_LEN);
        EntityId(hex)
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '|' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Compute an entity id from a tag and an unordered parameter list.
#[must_use]
pub fn generate_entity_id<K, V, I>(tag: &str, params: I) -> EntityId
where
    K: Into<String>,
    V: Into<ParamValue>,
    I: IntoIterator<Item = (K, V)>,
{
    params
        .into_iter()
        .fold(EntityIdBuilder::new(tag), |builder, (k, v)| builder.param(k, v))
        .build()
}

/// Entity id for an order placement.
///
/// `price` is omitted for market orders; a changed price is a distinct order.
#[must_use]
pub fn order_entity_id(
    symbol: &str,
    side: &str,
    quantity: Decimal,
    price: Option<Decimal>,
) -> EntityId {
    EntityIdBuilder::for_effect(EffectType::OrderPlacement)
        .param("symbol", symbol)
        .param("side", side)
        .param("quantity", quantity)
        .param_opt("price", price)
        .build()
}

/// Entity id for a position update.
#[must_use]
pub fn position_entity_id(symbol: &str, position_id: &str) -> EntityId {
    EntityIdBuilder::for_effect(EffectType::PositionUpdate)
        .param("symbol", symbol)
        .param("position_id", position_id)
        .build()
}

/// Entity id for a PnL write.
#[must_use]
pub fn pnl_entity_id(trade_id: &str) -> EntityId {
    EntityIdBuilder::for_effect(EffectType::PnlWrite)
        .param("trade_id", trade_id)
        .build()
}

/// Entity id for a ledger write.
#[must_use]
pub fn ledger_entity_id(transaction_id: &str) -> EntityId {
    EntityIdBuilder::for_effect(EffectType::LedgerWrite)
        .param("transaction_id", transaction_id)
        .build()
}

/// Entity id for a trade state write.
#[must_use]
pub fn trade_state_entity_id(trade_id: &str, state: &str) -> EntityId {
    EntityIdBuilder::for_effect(EffectType::TradeStateWrite)
        .param("trade_id", trade_id)
        .param("state", state)
        .build()
}
