//! Safety check rules.
//!
//! Pure functions from store introspection snapshots to leveled results.
//! Nothing here talks to the store; the validator service gathers the
//! snapshots and turns store failures into [`check_failed`] results.

use std::time::Duration;

use serde_json::json;

use super::value_objects::{
    MemoryInfo, PersistenceInfo, ReplicationInfo, ReplicationRole, SafetyCheck, ValidationLevel,
    ValidationResult,
};

/// Default minimum free memory before a headroom warning.
pub const DEFAULT_MIN_FREE_MEMORY_MB: u64 = 100;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Liveness ping outcome.
#[must_use]
pub fn check_connectivity(ping: Result<Duration, String>) -> ValidationResult {
    match ping {
        Ok(latency) => ValidationResult::new(
            ValidationLevel::Ok,
            SafetyCheck::Connectivity,
            format!("Store reachable ({} ms)", latency.as_millis()),
            json!({ "latency_ms": latency.as_millis() as u64 }),
        ),
        Err(error) => ValidationResult::new(
            ValidationLevel::Critical,
            SafetyCheck::Connectivity,
            format!("Store unreachable: {error}"),
            json!({ "error": error }),
        ),
    }
}

/// Durable logging with at most one second of loss, else snapshots, else nothing.
#[must_use]
pub fn check_persistence(info: &PersistenceInfo) -> ValidationResult {
    if info.aof_enabled {
        let fsync = info.append_fsync.as_deref().unwrap_or("unknown");
        let details = json!({ "aof_enabled": true, "appendfsync": fsync });
        return match fsync {
            "always" | "everysec" => ValidationResult::new(
                ValidationLevel::Ok,
                SafetyCheck::Persistence,
                format!("AOF enabled with {fsync} sync policy"),
                details,
            ),
            _ => ValidationResult::new(
                ValidationLevel::Warning,
                SafetyCheck::Persistence,
                format!("AOF enabled but sync policy is {fsync} (recommend everysec or always)"),
                details,
            ),
        };
    }

    if info.rdb_enabled {
        return ValidationResult::new(
            ValidationLevel::Warning,
            SafetyCheck::Persistence,
            "AOF disabled, using RDB snapshots only (recommend enabling AOF)",
            json!({ "aof_enabled": false, "rdb_last_save": info.rdb_last_save_time }),
        );
    }

    ValidationResult::new(
        ValidationLevel::Error,
        SafetyCheck::Persistence,
        "No persistence configured, guard records will be lost on restart",
        json!({ "aof_enabled": false, "rdb_enabled": false }),
    )
}

/// Guard records must not be evicted to make room for other keys.
#[must_use]
pub fn check_eviction_policy(policy: &str) -> ValidationResult {
    let details = json!({ "policy": policy });
    let (level, message) = match policy {
        "noeviction" => (
            ValidationLevel::Ok,
            "Eviction policy is noeviction (safest for guards)".to_string(),
        ),
        p if p.starts_with("allkeys-") => (
            ValidationLevel::Warning,
            format!("Eviction policy is {p}, guard records can be evicted under memory pressure"),
        ),
        p if p.starts_with("volatile-") => (
            ValidationLevel::Warning,
            format!("Eviction policy is {p}, guard records carry a TTL and are eviction candidates"),
        ),
        p => (
            ValidationLevel::Warning,
            format!("Unknown eviction policy: {p}"),
        ),
    };
    ValidationResult::new(level, SafetyCheck::EvictionPolicy, message, details)
}

/// Free memory against the configured ceiling.
#[must_use]
pub fn check_memory_headroom(info: &MemoryInfo, min_free_mb: u64) -> ValidationResult {
    let used_mb = info.used_bytes as f64 / BYTES_PER_MB;

    if info.max_bytes == 0 {
        return ValidationResult::new(
            ValidationLevel::Warning,
            SafetyCheck::MemoryHeadroom,
            "No maxmemory limit set (recommend setting a limit)",
            json!({ "used_memory_mb": used_mb, "maxmemory": 0 }),
        );
    }

    let free_bytes = info.max_bytes.saturating_sub(info.used_bytes);
    let free_mb = free_bytes as f64 / BYTES_PER_MB;
    let free_pct = free_bytes as f64 / info.max_bytes as f64 * 100.0;
    let used_pct = 100.0 - free_pct;
    let details = json!({
        "used_memory_mb": used_mb,
        "free_memory_mb": free_mb,
        "free_percent": free_pct,
        "used_percent": used_pct,
        "min_free_mb": min_free_mb,
    });

    if free_bytes >= min_free_mb.saturating_mul(1024 * 1024) {
        ValidationResult::new(
            ValidationLevel::Ok,
            SafetyCheck::MemoryHeadroom,
            format!("Sufficient memory headroom: {free_mb:.1}MB free ({free_pct:.1}% free)"),
            details,
        )
    } else {
        ValidationResult::new(
            ValidationLevel::Warning,
            SafetyCheck::MemoryHeadroom,
            format!("Low memory headroom: {free_mb:.1}MB free ({free_pct:.1}% free)"),
            details,
        )
    }
}

/// Guards must only ever talk to the primary.
#[must_use]
pub fn check_replication(info: &ReplicationInfo) -> ValidationResult {
    match &info.role {
        ReplicationRole::Primary => ValidationResult::new(
            ValidationLevel::Ok,
            SafetyCheck::ReplicaReads,
            format!(
                "Connected to primary ({} replicas attached)",
                info.connected_replicas
            ),
            json!({ "role": "primary", "connected_replicas": info.connected_replicas }),
        ),
        ReplicationRole::Replica => ValidationResult::new(
            ValidationLevel::Error,
            SafetyCheck::ReplicaReads,
            "Connected to a replica, guards require the primary for consistent claims",
            json!({ "role": "replica" }),
        ),
        ReplicationRole::Unknown(role) => ValidationResult::new(
            ValidationLevel::Warning,
            SafetyCheck::ReplicaReads,
            format!("Unknown replication role: {role}"),
            json!({ "role": role }),
        ),
    }
}

/// A check that could not gather its snapshot.
#[must_use]
pub fn check_failed(check: SafetyCheck, error: &str) -> ValidationResult {
    ValidationResult::new(
        ValidationLevel::Error,
        check,
        format!("Failed to check {check}: {error}"),
        json!({ "error": error }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn persistence(aof: bool, fsync: Option<&str>, rdb: bool) -> PersistenceInfo {
        PersistenceInfo {
            aof_enabled: aof,
            append_fsync: fsync.map(str::to_string),
            rdb_enabled: rdb,
            rdb_last_save_time: rdb.then_some(1_700_000_000),
        }
    }

    #[test_case(true, Some("always"), false => ValidationLevel::Ok; "aof always")]
    #[test_case(true, Some("everysec"), true => ValidationLevel::Ok; "aof everysec")]
    #[test_case(true, Some("no"), false => ValidationLevel::Warning; "aof without fsync")]
    #[test_case(true, None, false => ValidationLevel::Warning; "aof fsync unreadable")]
    #[test_case(false, None, true => ValidationLevel::Warning; "rdb only")]
    #[test_case(false, None, false => ValidationLevel::Error; "no persistence")]
    fn persistence_levels(aof: bool, fsync: Option<&str>, rdb: bool) -> ValidationLevel {
        check_persistence(&persistence(aof, fsync, rdb)).level
    }

    #[test_case("noeviction" => ValidationLevel::Ok)]
    #[test_case("allkeys-lru" => ValidationLevel::Warning)]
    #[test_case("allkeys-random" => ValidationLevel::Warning)]
    #[test_case("volatile-ttl" => ValidationLevel::Warning)]
    #[test_case("something-new" => ValidationLevel::Warning)]
    fn eviction_levels(policy: &str) -> ValidationLevel {
        check_eviction_policy(policy).level
    }

    #[test_case(10, 0 => ValidationLevel::Warning; "unlimited")]
    #[test_case(100, 1024 => ValidationLevel::Ok; "plenty free")]
    #[test_case(1000, 1024 => ValidationLevel::Warning; "24mb free")]
    #[test_case(924, 1024 => ValidationLevel::Ok; "exactly at threshold")]
    #[test_case(2048, 1024 => ValidationLevel::Warning; "over the ceiling")]
    fn memory_levels(used_mb: u64, max_mb: u64) -> ValidationLevel {
        let info = MemoryInfo {
            used_bytes: used_mb * 1024 * 1024,
            max_bytes: max_mb * 1024 * 1024,
        };
        check_memory_headroom(&info, DEFAULT_MIN_FREE_MEMORY_MB).level
    }

    #[test]
    fn memory_details_report_percentages() {
        let info = MemoryInfo {
            used_bytes: 256 * 1024 * 1024,
            max_bytes: 1024 * 1024 * 1024,
        };
        let result = check_memory_headroom(&info, DEFAULT_MIN_FREE_MEMORY_MB);
        let free_pct = result.details["free_percent"].as_f64().unwrap();
        assert!((free_pct - 75.0).abs() < 1e-9);
        assert!((result.details["free_memory_mb"].as_f64().unwrap() - 768.0).abs() < 1e-9);
    }

    #[test]
    fn replica_is_error() {
        let info = ReplicationInfo {
            role: ReplicationRole::Replica,
            connected_replicas: 0,
        };
        assert_eq!(check_replication(&info).level, ValidationLevel::Error);
    }

    #[test]
    fn primary_is_ok_and_reports_replicas() {
        let info = ReplicationInfo {
            role: ReplicationRole::Primary,
            connected_replicas: 2,
        };
        let result = check_replication(&info);
        assert_eq!(result.level, ValidationLevel::Ok);
        assert_eq!(result.details["connected_replicas"], 2);
    }

    #[test]
    fn unreachable_store_is_critical() {
        let result = check_connectivity(Err("connection refused".into()));
        assert_eq!(result.level, ValidationLevel::Critical);
        assert!(result.message.contains("connection refused"));
    }

    #[test]
    fn failed_check_is_error() {
        let result = check_failed(SafetyCheck::EvictionPolicy, "CONFIG disabled");
        assert_eq!(result.level, ValidationLevel::Error);
        assert_eq!(result.check, SafetyCheck::EvictionPolicy);
        assert_eq!(result.details["error"], "CONFIG disabled");
    }
}
