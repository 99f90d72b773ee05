//! Prometheus metrics for the side-effect guard.
//!
//! Covers guard outcomes, coordination store failures, the store circuit
//! breaker, and safety validator check levels.
//!
//! # Example
//!
//! ```ignore
//! use side_effect_guard::observability::{init_metrics, MetricsConfig};
//!
//! let config = MetricsConfig::default();
//! init_metrics(&config)?;
//!
//! record_execution("order_placement", ExecutionOutcomeLabel::Executed);
//! ```

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9090)),
        }
    }
}

impl MetricsConfig {
    /// Create a new metrics configuration with custom address.
    #[must_use]
    pub const fn with_addr(addr: SocketAddr) -> Self {
        Self { listen_addr: addr }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// This starts an HTTP server that exposes metrics at `/metrics`.
///
/// # Errors
///
/// Returns an error if the metrics exporter fails to start (e.g., port already in use).
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(
        addr = %config.listen_addr,
        "Prometheus metrics exporter started"
    );

    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

// ============================================================================
// Guard Metrics
// ============================================================================

/// Outcome label for `side_effect_executions_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcomeLabel {
    /// This caller ran the operation.
    Executed,
    /// A cached result from an earlier run was returned.
    Duplicate,
    /// A claim exists but no result was readable.
    Pending,
    /// The operation returned an error and the claim was rolled back.
    Failed,
    /// Refused because the coordination store is unavailable.
    Refused,
}

impl ExecutionOutcomeLabel {
    /// Label value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Executed => "executed",
            Self::Duplicate => "duplicate",
            Self::Pending => "pending",
            Self::Failed => "failed",
            Self::Refused => "refused",
        }
    }
}

/// Record the outcome of one guarded execution.
///
/// # Arguments
///
/// * `effect` - Effect tag (e.g., `"order_placement"`)
/// * `outcome` - What the guard did
pub fn record_execution(effect: &str, outcome: ExecutionOutcomeLabel) {
    counter!(
        "side_effect_executions_total",
        "effect" => effect.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a coordination store command failure.
///
/// # Arguments
///
/// * `operation` - Store command (e.g., `"set_if_absent"`, `"get"`)
pub fn record_store_error(operation: &'static str) {
    counter!("side_effect_store_errors_total", "operation" => operation).increment(1);
}

/// Record a failed write of the Completed record after a successful run.
pub fn record_cache_write_failure(effect: &str) {
    counter!(
        "side_effect_cache_write_failures_total",
        "effect" => effect.to_string()
    )
    .increment(1);
}

/// Record a failed delete of a claim after the operation errored.
pub fn record_rollback_failure(effect: &str) {
    counter!(
        "side_effect_rollback_failures_total",
        "effect" => effect.to_string()
    )
    .increment(1);
}

// ============================================================================
// Circuit Breaker Metrics
// ============================================================================

/// Circuit breaker state values for the gauge.
pub mod circuit_breaker_state {
    /// Circuit is closed (healthy).
    pub const CLOSED: f64 = 0.0;
    /// Circuit is open (failing).
    pub const OPEN: f64 = 1.0;
    /// Circuit is half-open (testing).
    pub const HALF_OPEN: f64 = 2.0;
}

/// Update the store circuit breaker state gauge.
///
/// # Arguments
///
/// * `breaker` - Breaker name
/// * `state` - Numeric state (0=closed, 1=open, 2=`half_open`)
pub fn record_circuit_breaker_state(breaker: &str, state: f64) {
    gauge!(
        "store_circuit_breaker_state",
        "breaker" => breaker.to_string()
    )
    .set(state);
}

// ============================================================================
// Safety Validator Metrics
// ============================================================================

/// Update the level gauge for one safety check (0=ok .. 3=critical).
pub fn record_check_level(check: &'static str, level: f64) {
    gauge!("coordination_store_check_level", "check" => check).set(level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels() {
        assert_eq!(ExecutionOutcomeLabel::Executed.as_str(), "executed");
        assert_eq!(ExecutionOutcomeLabel::Duplicate.as_str(), "duplicate");
        assert_eq!(ExecutionOutcomeLabel::Pending.as_str(), "pending");
        assert_eq!(ExecutionOutcomeLabel::Failed.as_str(), "failed");
        assert_eq!(ExecutionOutcomeLabel::Refused.as_str(), "refused");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_execution("order_placement", ExecutionOutcomeLabel::Executed);
        record_store_error("get");
        record_circuit_breaker_state("coordination_store", circuit_breaker_state::OPEN);
        record_check_level("persistence", 2.0);
    }

    #[test]
    fn default_listens_on_9090() {
        assert_eq!(MetricsConfig::default().listen_addr.port(), 9090);
    }
}
