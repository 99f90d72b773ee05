//! Infrastructure Layer
//!
//! Adapters implementing the ports defined in the application layer:
//!
//! - `store/`: coordination store adapters (Redis, in-memory)

pub mod store;
