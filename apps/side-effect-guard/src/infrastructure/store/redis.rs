//! Redis coordination store adapter.
//!
//! Claims use `SET key value NX PX ttl`, which Redis executes atomically, so
//! exactly one of any number of concurrent claimers gets `OK` back.
//! Completion uses plain `SET ... PX`, which also refreshes the TTL.
//!
//! Every command runs under `command_timeout`. The connection manager
//! reconnects on its own after a dropped connection; the command that saw
//! the drop still fails and is reported to the guard.
//!
//! Introspection reads `INFO persistence|memory|replication`. `appendfsync`
//! and `save` are only exposed through `CONFIG GET`, which managed Redis
//! offerings often disable; those fields then fall back to what `INFO` shows.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{ErrorKind, RedisError};

use crate::application::ports::{CoordinationStore, StoreError, StoreIntrospection};
use crate::domain::store_safety::{
    MemoryInfo, PersistenceInfo, ReplicationInfo, ReplicationRole,
};

/// Default command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisStoreConfig {
    /// Redis URL (`redis://[:password@]host:port[/db]`).
    pub url: String,
    /// Per-command timeout.
    pub command_timeout: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_timeout() {
            return Self::Connection {
                message: format!("timed out: {err}"),
            };
        }
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            return Self::Connection {
                message: err.to_string(),
            };
        }
        match err.kind() {
            ErrorKind::TypeError => Self::Protocol {
                message: err.to_string(),
            },
            _ => Self::Rejected {
                message: err.to_string(),
            },
        }
    }
}

/// Redis implementation of `CoordinationStore` and `StoreIntrospection`.
#[derive(Clone)]
pub struct RedisCoordinationStore {
    connection: ConnectionManager,
    command_timeout: Duration,
}

impl std::fmt::Debug for RedisCoordinationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCoordinationStore")
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisCoordinationStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the first connection fails
    /// within `command_timeout`.
    pub async fn connect(config: &RedisStoreConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            StoreError::Connection {
                message: format!("invalid store url: {e}"),
            }
        })?;

        let connection = tokio::time::timeout(config.command_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout {
                timeout: config.command_timeout,
            })??;

        tracing::info!(
            timeout_ms = config.command_timeout.as_millis() as u64,
            "Connected to coordination store"
        );

        Ok(Self {
            connection,
            command_timeout: config.command_timeout,
        })
    }

    /// Run one command under the command timeout.
    async fn run<T, F, Fut>(&self, command: F) -> Result<T, StoreError>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = Result<T, RedisError>>,
    {
        let connection = self.connection.clone();
        match tokio::time::timeout(self.command_timeout, command(connection)).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout {
                timeout: self.command_timeout,
            }),
        }
    }

    async fn info(&self, section: &'static str) -> Result<HashMap<String, String>, StoreError> {
        let text: String = self
            .run(|mut conn| async move {
                redis::cmd("INFO").arg(section).query_async(&mut conn).await
            })
            .await?;
        Ok(parse_info(&text))
    }

    /// `CONFIG GET name`, `None` when CONFIG is disabled or the key is unknown.
    async fn config_get(&self, name: &'static str) -> Option<String> {
        let reply: Result<Vec<String>, StoreError> = self
            .run(|mut conn| async move {
                redis::cmd("CONFIG")
                    .arg("GET")
                    .arg(name)
                    .query_async(&mut conn)
                    .await
            })
            .await;
        match reply {
            Ok(pair) => pair.into_iter().nth(1),
            Err(e) => {
                tracing::debug!(name, error = %e, "CONFIG GET unavailable");
                None
            }
        }
    }
}

/// Largest `PX` sent. Redis rejects an expiry whose absolute deadline
/// overflows `i64` milliseconds, so leave headroom for the server clock.
const MAX_TTL_MILLIS: u64 = i64::MAX.unsigned_abs() / 2;

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis())
        .unwrap_or(u64::MAX)
        .clamp(1, MAX_TTL_MILLIS)
}

#[async_trait]
impl CoordinationStore for RedisCoordinationStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let reply: Option<String> = self
            .run(|mut conn| async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl_millis(ttl))
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        Ok(reply.is_some())
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.run(|mut conn| async move {
            redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(ttl_millis(ttl))
                .query_async(&mut conn)
                .await
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.run(|mut conn| async move { redis::cmd("GET").arg(key).query_async(&mut conn).await })
            .await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let count: u64 = self
            .run(|mut conn| async move {
                redis::cmd("EXISTS").arg(key).query_async(&mut conn).await
            })
            .await?;
        Ok(count > 0)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let removed: u64 = self
            .run(|mut conn| async move { redis::cmd("DEL").arg(key).query_async(&mut conn).await })
            .await?;
        Ok(removed > 0)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let millis: i64 = self
            .run(|mut conn| async move { redis::cmd("PTTL").arg(key).query_async(&mut conn).await })
            .await?;
        // -2: missing, -1: no expiry
        Ok(u64::try_from(millis).ok().map(Duration::from_millis))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let pong: String = self
            .run(|mut conn| async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Protocol {
                message: format!("unexpected PING reply: {pong}"),
            })
        }
    }
}

#[async_trait]
impl StoreIntrospection for RedisCoordinationStore {
    async fn ping(&self) -> Result<(), StoreError> {
        CoordinationStore::ping(self).await
    }

    async fn persistence_info(&self) -> Result<PersistenceInfo, StoreError> {
        let info = self.info("persistence").await?;
        let append_fsync = self.config_get("appendfsync").await;
        let save = self.config_get("save").await;
        Ok(persistence_from_info(&info, append_fsync, save.as_deref()))
    }

    async fn eviction_policy(&self) -> Result<String, StoreError> {
        let info = self.info("memory").await?;
        if let Some(policy) = info.get("maxmemory_policy") {
            return Ok(policy.clone());
        }
        self.config_get("maxmemory-policy")
            .await
            .ok_or_else(|| StoreError::Protocol {
                message: "maxmemory_policy not reported".to_string(),
            })
    }

    async fn memory_info(&self) -> Result<MemoryInfo, StoreError> {
        let info = self.info("memory").await?;
        memory_from_info(&info)
    }

    async fn replication_info(&self) -> Result<ReplicationInfo, StoreError> {
        let info = self.info("replication").await?;
        replication_from_info(&info)
    }
}

/// Parse `INFO` output into `field -> value`, skipping section headers.
pub fn parse_info(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn field<T: std::str::FromStr>(info: &HashMap<String, String>, name: &str) -> Option<T> {
    info.get(name).and_then(|v| v.parse().ok())
}

fn persistence_from_info(
    info: &HashMap<String, String>,
    append_fsync: Option<String>,
    save: Option<&str>,
) -> PersistenceInfo {
    let rdb_enabled = save.map_or_else(
        || field::<u64>(info, "rdb_saves").is_some_and(|n| n > 0),
        |schedule| !schedule.trim().is_empty(),
    );
    PersistenceInfo {
        aof_enabled: field::<u8>(info, "aof_enabled") == Some(1),
        append_fsync,
        rdb_enabled,
        rdb_last_save_time: field(info, "rdb_last_save_time"),
    }
}

fn memory_from_info(info: &HashMap<String, String>) -> Result<MemoryInfo, StoreError> {
    let used_bytes = field(info, "used_memory").ok_or_else(|| StoreError::Protocol {
        message: "used_memory not reported".to_string(),
    })?;
    Ok(MemoryInfo {
        used_bytes,
        max_bytes: field(info, "maxmemory").unwrap_or(0),
    })
}

fn replication_from_info(info: &HashMap<String, String>) -> Result<ReplicationInfo, StoreError> {
    let role = info.get("role").ok_or_else(|| StoreError::Protocol {
        message: "role not reported".to_string(),
    })?;
    Ok(ReplicationInfo {
        role: ReplicationRole::parse(role),
        connected_replicas: field(info, "connected_slaves").unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERSISTENCE: &str = "# Persistence\r\n\
        loading:0\r\n\
        rdb_changes_since_last_save:12\r\n\
        rdb_last_save_time:1700000000\r\n\
        rdb_saves:3\r\n\
        aof_enabled:1\r\n\
        aof_rewrite_in_progress:0\r\n";

    #[test]
    fn test_parse_info_skips_headers() {
        let info = parse_info(PERSISTENCE);
        assert_eq!(info.get("aof_enabled").map(String::as_str), Some("1"));
        assert_eq!(info.get("rdb_last_save_time").map(String::as_str), Some("1700000000"));
        assert!(!info.contains_key("# Persistence"));
    }

    #[test]
    fn test_persistence_with_config() {
        let info = parse_info(PERSISTENCE);
        let persistence = persistence_from_info(&info, Some("everysec".into()), Some(""));
        assert!(persistence.aof_enabled);
        assert_eq!(persistence.append_fsync.as_deref(), Some("everysec"));
        assert!(!persistence.rdb_enabled);
        assert_eq!(persistence.rdb_last_save_time, Some(1_700_000_000));
    }

    #[test]
    fn test_persistence_without_config_falls_back_to_info() {
        let info = parse_info(PERSISTENCE);
        let persistence = persistence_from_info(&info, None, None);
        assert_eq!(persistence.append_fsync, None);
        assert!(persistence.rdb_enabled);
    }

    #[test]
    fn test_memory_from_info() {
        let info = parse_info("used_memory:1048576\r\nmaxmemory:0\r\nmaxmemory_policy:noeviction");
        assert_eq!(
            memory_from_info(&info).unwrap(),
            MemoryInfo {
                used_bytes: 1_048_576,
                max_bytes: 0
            }
        );
        assert!(memory_from_info(&HashMap::new()).is_err());
    }

    #[test]
    fn test_replication_from_info() {
        let primary = parse_info("# Replication\r\nrole:master\r\nconnected_slaves:2\r\n");
        let replica = parse_info("role:slave\r\nmaster_host:10.0.0.1\r\n");

        let primary = replication_from_info(&primary).unwrap();
        assert_eq!(primary.role, ReplicationRole::Primary);
        assert_eq!(primary.connected_replicas, 2);
        assert_eq!(
            replication_from_info(&replica).unwrap().role,
            ReplicationRole::Replica
        );
    }

    #[test]
    fn test_ttl_millis_never_zero() {
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(259_200)), 259_200_000);
    }

    #[test]
    fn test_ttl_millis_clamped_to_server_range() {
        assert_eq!(ttl_millis(Duration::MAX), MAX_TTL_MILLIS);
        assert!(i64::try_from(ttl_millis(Duration::MAX)).is_ok());
    }

    #[test]
    fn test_redis_error_mapping() {
        let io: RedisError = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset").into();
        assert!(matches!(StoreError::from(io), StoreError::Connection { .. }));

        let rejected: RedisError = (ErrorKind::ResponseError, "READONLY replica").into();
        assert!(matches!(StoreError::from(rejected), StoreError::Rejected { .. }));

        let protocol: RedisError = (ErrorKind::TypeError, "not an integer").into();
        assert!(matches!(StoreError::from(protocol), StoreError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let config = RedisStoreConfig {
            url: "not a url".to_string(),
            ..RedisStoreConfig::default()
        };
        assert!(matches!(
            RedisCoordinationStore::connect(&config).await,
            Err(StoreError::Connection { .. })
        ));
    }
}
