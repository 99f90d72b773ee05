//! Application Layer
//!
//! The application layer runs the guard protocol against the coordination
//! store. It defines:
//!
//! - **Ports**: Interfaces for the coordination store and its introspection
//! - **Services**: The side-effect guard, its per-effect adapters, and the
//!   store safety validator

pub mod ports;
pub mod services;

pub use ports::*;
pub use services::*;
