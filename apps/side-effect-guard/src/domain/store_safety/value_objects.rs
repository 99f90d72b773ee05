//! Store safety value objects.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a safety check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    /// Configuration is safe for guard records.
    Ok,
    /// Works, but weakens guarantees under some failure.
    Warning,
    /// Guard guarantees do not hold.
    Error,
    /// Store unusable.
    Critical,
}

impl ValidationLevel {
    /// Whether this level should block startup.
    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        matches!(self, Self::Error | Self::Critical)
    }

    /// Numeric gauge value (0 = ok .. 3 = critical).
    #[must_use]
    pub const fn as_gauge(&self) -> f64 {
        match self {
            Self::Ok => 0.0,
            Self::Warning => 1.0,
            Self::Error => 2.0,
            Self::Critical => 3.0,
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Individual safety checks run against the coordination store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCheck {
    /// Store answers a liveness ping.
    Connectivity,
    /// Records survive a restart.
    Persistence,
    /// Records are not evicted under memory pressure.
    EvictionPolicy,
    /// Enough memory left before eviction or write refusal.
    MemoryHeadroom,
    /// Connected to the primary, never a replica.
    ReplicaReads,
}

impl SafetyCheck {
    /// Stable check name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::Persistence => "persistence",
            Self::EvictionPolicy => "eviction_policy",
            Self::MemoryHeadroom => "memory_headroom",
            Self::ReplicaReads => "replica_reads",
        }
    }
}

impl fmt::Display for SafetyCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one safety check.
///
/// Serializes flat as `{level, check, message, details}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Severity.
    pub level: ValidationLevel,
    /// Which check produced it.
    pub check: SafetyCheck,
    /// Human-readable message.
    pub message: String,
    /// Structured details (always a JSON object).
    pub details: serde_json::Value,
}

impl ValidationResult {
    /// Create a result.
    #[must_use]
    pub fn new(
        level: ValidationLevel,
        check: SafetyCheck,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            level,
            check,
            message: message.into(),
            details,
        }
    }
}

/// Aggregate view over a validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    /// Number of checks run.
    pub total_checks: usize,
    /// Checks at OK.
    pub ok: usize,
    /// Checks at WARNING.
    pub warning: usize,
    /// Checks at ERROR.
    pub error: usize,
    /// Checks at CRITICAL.
    pub critical: usize,
    /// Whether startup gating passes (no ERROR or CRITICAL).
    pub passed: bool,
    /// When the pass ran.
    pub generated_at: DateTime<Utc>,
    /// Individual results.
    pub checks: Vec<ValidationResult>,
}

impl ValidationSummary {
    /// Summarize a list of results.
    #[must_use]
    pub fn from_results(checks: Vec<ValidationResult>) -> Self {
        let count = |level| checks.iter().filter(|r| r.level == level).count();
        Self {
            total_checks: checks.len(),
            ok: count(ValidationLevel::Ok),
            warning: count(ValidationLevel::Warning),
            error: count(ValidationLevel::Error),
            critical: count(ValidationLevel::Critical),
            passed: !checks.iter().any(|r| r.level.is_blocking()),
            generated_at: Utc::now(),
            checks,
        }
    }

    /// Highest level seen, `Ok` when empty.
    #[must_use]
    pub fn worst_level(&self) -> ValidationLevel {
        self.checks
            .iter()
            .map(|r| r.level)
            .max()
            .unwrap_or(ValidationLevel::Ok)
    }
}

/// Persistence configuration reported by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceInfo {
    /// Append-only log enabled and active.
    pub aof_enabled: bool,
    /// Append-only log sync policy (`always`, `everysec`, `no`), if readable.
    pub append_fsync: Option<String>,
    /// Snapshot persistence configured.
    pub rdb_enabled: bool,
    /// Unix time of the last successful snapshot, if any.
    pub rdb_last_save_time: Option<i64>,
}

/// Memory usage reported by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Bytes in use.
    pub used_bytes: u64,
    /// Configured ceiling in bytes; 0 means unlimited.
    pub max_bytes: u64,
}

/// Replication role of the connected store instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationRole {
    /// Primary (accepts writes).
    Primary,
    /// Read replica.
    Replica,
    /// Anything else the store reported.
    Unknown(String),
}

impl ReplicationRole {
    /// Parse a role name as reported by the store.
    #[must_use]
    pub fn parse(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "master" | "primary" => Self::Primary,
            "slave" | "replica" => Self::Replica,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ReplicationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Replica => write!(f, "replica"),
            Self::Unknown(role) => write!(f, "{role}"),
        }
    }
}

/// Replication state reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationInfo {
    /// Role of the instance we are connected to.
    pub role: ReplicationRole,
    /// Replicas attached to it (primary only).
    pub connected_replicas: u32,
}
