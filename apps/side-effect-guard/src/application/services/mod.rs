//! Application Services
//!
//! The guard, its per-effect adapters, and the store safety validator.

mod execution_guard_adapter;
mod side_effect_guard;
mod store_safety_validator;

pub use execution_guard_adapter::ExecutionGuardAdapter;
pub use side_effect_guard::{
    DEFAULT_TTL, ExecutionOutcome, GuardConfig, GuardResult, STORE_BREAKER_NAME, SideEffectGuard,
    StoreOutagePolicy,
};
pub use store_safety_validator::{DEFAULT_AUDIT_INTERVAL, StoreSafetyValidator, ValidatorConfig};
