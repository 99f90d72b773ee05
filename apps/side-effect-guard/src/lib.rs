// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Side-Effect Guard - Rust Core Library
//!
//! Exactly-once execution of financial side effects for trading services.
//! Retries, reconnects and racing workers all funnel through a shared
//! coordination store, so each logical operation (order placement,
//! position update, PnL write, ledger write, trade-state write) runs at most
//! once while its record lives.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core rules with no infrastructure dependencies
//!   - `idempotency`: Effect types, entity ids, keys, record payloads
//!   - `store_safety`: Store configuration checks and severity levels
//!
//! - **Application**: Orchestration
//!   - `ports`: `CoordinationStore`, `StoreIntrospection`
//!   - `services`: `SideEffectGuard`, `ExecutionGuardAdapter`, `StoreSafetyValidator`
//!
//! - **Infrastructure**: Adapters
//!   - `store`: Redis and in-memory coordination stores
//!
//! Cross-cutting: `config`, `observability` (tracing + Prometheus metrics),
//! `resilience` (store circuit breaker), `error`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Guard services and port definitions.
pub mod application;

/// Infrastructure layer - Coordination store adapters.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// Configuration loading and validation.
pub mod config;

/// Guard error type.
pub mod error;

/// Logging and metrics.
pub mod observability;

/// Store circuit breaker.
pub mod resilience;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::idempotency::{
    CachedResult, EffectType, EntityId, IdempotencyError, IdempotencyKey, PriorResult,
    generate_entity_id,
};
pub use domain::store_safety::{ValidationLevel, ValidationResult, ValidationSummary};

// Application re-exports
pub use application::ports::{CoordinationStore, StoreError, StoreIntrospection};
pub use application::services::{
    ExecutionGuardAdapter, ExecutionOutcome, GuardConfig, GuardResult, SideEffectGuard,
    StoreOutagePolicy, StoreSafetyValidator, ValidatorConfig,
};

// Infrastructure re-exports
pub use infrastructure::store::{InMemoryCoordinationStore, RedisCoordinationStore};

pub use error::GuardError;
