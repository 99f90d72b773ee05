//! In-memory coordination store for testing.
//!
//! Implements the same capability contract as the Redis adapter: atomic
//! create-if-absent, TTL expiry, and configuration introspection. Adds the
//! failure controls the chaos tests need: store-wide outage, per-command
//! fault injection, artificial latency, and restart with or without
//! persistence.
//!
//! Expiry is measured on `tokio::time::Instant`, so paused-clock tests can
//! expire records with `tokio::time::advance`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::application::ports::{CoordinationStore, StoreError, StoreIntrospection};
use crate::domain::store_safety::{
    MemoryInfo, PersistenceInfo, ReplicationInfo, ReplicationRole,
};

/// Store commands, for fault injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// Conditional create.
    SetIfAbsent,
    /// Unconditional write.
    Set,
    /// Read.
    Get,
    /// Existence check.
    Exists,
    /// Delete.
    Delete,
    /// TTL query.
    Ttl,
    /// Liveness ping.
    Ping,
    /// Persistence introspection.
    PersistenceInfo,
    /// Eviction policy introspection.
    EvictionPolicy,
    /// Memory introspection.
    MemoryInfo,
    /// Replication introspection.
    ReplicationInfo,
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone)]
struct Introspection {
    persistence: PersistenceInfo,
    eviction_policy: String,
    memory: MemoryInfo,
    replication: ReplicationInfo,
}

impl Introspection {
    fn safe() -> Self {
        Self {
            persistence: PersistenceInfo {
                aof_enabled: true,
                append_fsync: Some("everysec".to_string()),
                rdb_enabled: true,
                rdb_last_save_time: None,
            },
            eviction_policy: "noeviction".to_string(),
            memory: MemoryInfo {
                used_bytes: 16 * 1024 * 1024,
                max_bytes: 1024 * 1024 * 1024,
            },
            replication: ReplicationInfo {
                role: ReplicationRole::Primary,
                connected_replicas: 0,
            },
        }
    }
}

/// In-memory implementation of `CoordinationStore` and `StoreIntrospection`.
///
/// Suitable for testing and development. Not for production use: claims are
/// only exclusive within one process.
#[derive(Debug)]
pub struct InMemoryCoordinationStore {
    entries: Mutex<HashMap<String, Entry>>,
    available: AtomicBool,
    persistent: bool,
    latency: Option<Duration>,
    faults: Mutex<HashMap<StoreOperation, u32>>,
    calls: Mutex<HashMap<StoreOperation, u64>>,
    introspection: RwLock<Introspection>,
}

impl Default for InMemoryCoordinationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCoordinationStore {
    /// Create an empty, persistent, safely configured store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            persistent: true,
            latency: None,
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            introspection: RwLock::new(Introspection::safe()),
        }
    }

    /// Whether records survive [`simulate_restart`](Self::simulate_restart).
    ///
    /// A non-persistent store also reports no persistence when introspected.
    #[must_use]
    pub fn with_persistence(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        if !persistent {
            self.introspection
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner)
                .persistence = PersistenceInfo::default();
        }
        self
    }

    /// Delay every command, widening race windows in concurrency tests.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Take the whole store down or bring it back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Whether the store is answering.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Fail the next `count` calls of `operation` with a connection error.
    pub fn fail_next(&self, operation: StoreOperation, count: u32) {
        *self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(operation)
            .or_default() += count;
    }

    /// Number of calls made to `operation`, failed ones included.
    #[must_use]
    pub fn call_count(&self, operation: StoreOperation) -> u64 {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// Simulate a crash and restart. Records are kept only if persistent.
    pub fn simulate_restart(&self) {
        if !self.persistent {
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
        self.set_available(true);
        tracing::info!(persistent = self.persistent, "In-memory store restarted");
    }

    /// Read a live record without going through the command path.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Whether no live records exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Override the reported persistence configuration.
    pub fn set_persistence_info(&self, info: PersistenceInfo) {
        self.introspection_mut(|i| i.persistence = info);
    }

    /// Override the reported eviction policy.
    pub fn set_eviction_policy(&self, policy: &str) {
        self.introspection_mut(|i| i.eviction_policy = policy.to_string());
    }

    /// Override the reported memory usage.
    pub fn set_memory_info(&self, info: MemoryInfo) {
        self.introspection_mut(|i| i.memory = info);
    }

    /// Override the reported replication role.
    pub fn set_replication_info(&self, info: ReplicationInfo) {
        self.introspection_mut(|i| i.replication = info);
    }

    fn introspection_mut(&self, update: impl FnOnce(&mut Introspection)) {
        update(
            &mut self
                .introspection
                .write()
                .unwrap_or_else(PoisonError::into_inner),
        );
    }

    fn introspection(&self) -> Introspection {
        self.introspection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Count the call, apply latency, then outage and injected faults.
    async fn command(&self, operation: StoreOperation) -> Result<(), StoreError> {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(operation)
            .or_default() += 1;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if !self.is_available() {
            return Err(StoreError::Connection {
                message: "store unavailable".to_string(),
            });
        }

        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(remaining) = faults.get_mut(&operation)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(StoreError::Connection {
                message: format!("injected {operation:?} fault"),
            });
        }
        Ok(())
    }

    /// Run `f` over the record map after sweeping every expired record.
    fn with_entries<R>(&self, f: impl FnOnce(&mut HashMap<String, Entry>) -> R) -> R {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| !entry.is_expired(now));
        f(&mut entries)
    }
}

/// Deadline `ttl` from now. A deadline past the clock's range never expires.
fn expiry_after(ttl: Duration) -> Option<Instant> {
    Instant::now().checked_add(ttl)
}

#[async_trait]
impl CoordinationStore for InMemoryCoordinationStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.command(StoreOperation::SetIfAbsent).await?;
        let expires_at = expiry_after(ttl);
        Ok(self.with_entries(|entries| {
            if entries.contains_key(key) {
                return false;
            }
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at,
                },
            );
            true
        }))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.command(StoreOperation::Set).await?;
        let expires_at = expiry_after(ttl);
        self.with_entries(|entries| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at,
                },
            );
        });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.command(StoreOperation::Get).await?;
        Ok(self.with_entries(|entries| {
            entries.get(key).map(|entry| entry.value.clone())
        }))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.command(StoreOperation::Exists).await?;
        Ok(self.with_entries(|entries| entries.contains_key(key)))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.command(StoreOperation::Delete).await?;
        Ok(self.with_entries(|entries| entries.remove(key).is_some()))
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.command(StoreOperation::Ttl).await?;
        let now = Instant::now();
        Ok(self.with_entries(|entries| {
            entries
                .get(key)
                .and_then(|entry| entry.expires_at)
                .map(|at| at.saturating_duration_since(now))
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.command(StoreOperation::Ping).await
    }
}

#[async_trait]
impl StoreIntrospection for InMemoryCoordinationStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.command(StoreOperation::Ping).await
    }

    async fn persistence_info(&self) -> Result<PersistenceInfo, StoreError> {
        self.command(StoreOperation::PersistenceInfo).await?;
        Ok(self.introspection().persistence)
    }

    async fn eviction_policy(&self) -> Result<String, StoreError> {
        self.command(StoreOperation::EvictionPolicy).await?;
        Ok(self.introspection().eviction_policy)
    }

    async fn memory_info(&self) -> Result<MemoryInfo, StoreError> {
        self.command(StoreOperation::MemoryInfo).await?;
        Ok(self.introspection().memory)
    }

    async fn replication_info(&self) -> Result<ReplicationInfo, StoreError> {
        self.command(StoreOperation::ReplicationInfo).await?;
        Ok(self.introspection().replication)
    }
}
