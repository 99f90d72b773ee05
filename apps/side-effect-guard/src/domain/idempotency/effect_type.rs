//! Effect type value object.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::IdempotencyError;

/// Kind of side effect guarded against duplicate execution.
///
/// The wire tag (`as_str`) participates in both the entity id digest and the
/// store key, so renaming a tag invalidates every record written under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    /// Broker order placement.
    OrderPlacement,
    /// Position book update.
    PositionUpdate,
    /// Realized/unrealized PnL write.
    PnlWrite,
    /// Accounting ledger entry.
    LedgerWrite,
    /// Trade lifecycle state write.
    TradeStateWrite,
}

impl EffectType {
    /// All effect types, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::OrderPlacement,
        Self::PositionUpdate,
        Self::PnlWrite,
        Self::LedgerWrite,
        Self::TradeStateWrite,
    ];

    /// Stable wire tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OrderPlacement => "order_placement",
            Self::PositionUpdate => "position_update",
            Self::PnlWrite => "pnl_write",
            Self::LedgerWrite => "ledger_write",
            Self::TradeStateWrite => "trade_state_write",
        }
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectType {
    type Err = IdempotencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|effect| effect.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| IdempotencyError::UnknownEffectType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_unique() {
        let mut tags: Vec<_> = EffectType::ALL.iter().map(EffectType::as_str).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), EffectType::ALL.len());
    }

    #[test]
    fn parse_roundtrips_every_tag() {
        for effect in EffectType::ALL {
            assert_eq!(effect.as_str().parse::<EffectType>().unwrap(), effect);
        }
        assert_eq!(
            "ORDER_PLACEMENT".parse::<EffectType>().unwrap(),
            EffectType::OrderPlacement
        );
    }

    #[test]
    fn parse_rejects_unknown_tag() {
        let err = "signal_consumption".parse::<EffectType>().unwrap_err();
        assert!(matches!(err, IdempotencyError::UnknownEffectType(_)));
    }

    #[test]
    fn serde_uses_wire_tag() {
        let json = serde_json::to_string(&EffectType::TradeStateWrite).unwrap();
        assert_eq!(json, "\"trade_state_write\"");
    }
}
