//! Coordination store adapters.
//!
//! - `redis`: production store (atomic `SET NX PX`)
//! - `in_memory`: process-local store with fault injection, for tests and
//!   single-process use

mod in_memory;
mod redis;

pub use self::in_memory::{InMemoryCoordinationStore, StoreOperation};
pub use self::redis::{
    DEFAULT_COMMAND_TIMEOUT, RedisCoordinationStore, RedisStoreConfig, parse_info,
};
