//! Store Introspection Port (Driven Port)
//!
//! Read-only view of the coordination store's own configuration, consumed
//! by the safety validator.

use async_trait::async_trait;

use super::coordination_store_port::StoreError;
use crate::domain::store_safety::{MemoryInfo, PersistenceInfo, ReplicationInfo};

/// Port for reading the store's persistence, eviction, memory and replication setup.
#[async_trait]
pub trait StoreIntrospection: Send + Sync {
    /// Liveness check.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Persistence configuration.
    async fn persistence_info(&self) -> Result<PersistenceInfo, StoreError>;

    /// Configured eviction policy name.
    async fn eviction_policy(&self) -> Result<String, StoreError>;

    /// Memory usage and ceiling.
    async fn memory_info(&self) -> Result<MemoryInfo, StoreError>;

    /// Replication role of the connected instance.
    async fn replication_info(&self) -> Result<ReplicationInfo, StoreError>;
}
