//! Application Ports (Driven)
//!
//! Ports define interfaces for the external systems the guard depends on.
//! Implementations live in `infrastructure::store`.

mod coordination_store_port;
mod store_introspection_port;

pub use coordination_store_port::{CoordinationStore, StoreError};
pub use store_introspection_port::StoreIntrospection;
