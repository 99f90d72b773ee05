//! Idempotency Bounded Context
//!
//! Names logical side effects and describes what the coordination store
//! holds for each of them.
//!
//! # Key Concepts
//!
//! - **Effect Type**: Which kind of side effect (order, position, PnL, ledger, trade state)
//! - **Entity Id**: Order-independent digest of the operation's domain parameters
//! - **Idempotency Key**: `{namespace}:{effect}:{entity_id}` store key
//! - **Guard Record Payload**: Claim placeholder or cached completion result

pub mod effect_type;
pub mod entity_id;
pub mod errors;
pub mod key;
pub mod payload;

pub use effect_type::EffectType;
pub use entity_id::{
    ENTITY_ID_LEN, EntityId, EntityIdBuilder, ParamValue, generate_entity_id, ledger_entity_id,
    order_entity_id, pnl_entity_id, position_entity_id, trade_state_entity_id,
};
pub use errors::IdempotencyError;
pub use key::{DEFAULT_NAMESPACE, IdempotencyKey};
pub use payload::{
    CLAIM_PLACEHOLDER, CachedResult, PayloadEncoding, PriorResult, encode_completion,
};
