//! Domain Layer
//!
//! The innermost layer containing business logic with zero infrastructure dependencies.
//! This layer defines:
//!
//! - **Value Objects**: Immutable domain types with equality by value
//! - **Domain Services**: Stateless rules (entity id derivation, safety grading)
//!
//! # Bounded Contexts
//!
//! - [`idempotency`]: Effect types, entity ids, keys and guard record payloads
//! - [`store_safety`]: Coordination store configuration checks

pub mod idempotency;
pub mod store_safety;
