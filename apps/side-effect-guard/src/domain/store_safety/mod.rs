//! Store Safety Bounded Context
//!
//! The guard's at-most-once property is only as strong as the store's
//! configuration. This context describes what the store reports about
//! itself and grades each property.
//!
//! # Key Concepts
//!
//! - **Introspection snapshots**: persistence, eviction policy, memory, replication
//! - **Validation Result**: leveled (OK / WARNING / ERROR / CRITICAL) outcome per check
//! - **Validation Summary**: per-level counts plus the startup pass/fail verdict

pub mod checks;
pub mod value_objects;

pub use checks::{
    DEFAULT_MIN_FREE_MEMORY_MB, check_connectivity, check_eviction_policy, check_failed,
    check_memory_headroom, check_persistence, check_replication,
};
pub use value_objects::{
    MemoryInfo, PersistenceInfo, ReplicationInfo, ReplicationRole, SafetyCheck, ValidationLevel,
    ValidationResult, ValidationSummary,
};
