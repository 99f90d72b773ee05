//! Coordination Store Safety Validator
//!
//! Audits the coordination store's configuration at startup and,
//! optionally, on a fixed interval. Guard correctness rests on the store
//! keeping records across restarts, never evicting them, and serving every
//! claim from the primary. The validator reports; it never blocks or
//! retries guard operations.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{StoreError, StoreIntrospection};
use crate::domain::store_safety::{
    DEFAULT_MIN_FREE_MEMORY_MB, SafetyCheck, ValidationLevel, ValidationResult, ValidationSummary,
    check_connectivity, check_eviction_policy, check_failed, check_memory_headroom,
    check_persistence, check_replication,
};
use crate::observability::record_check_level;

/// Default interval between periodic audits.
pub const DEFAULT_AUDIT_INTERVAL: Duration = Duration::from_secs(300);

/// Validator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Free memory below this is a warning.
    pub min_free_memory_mb: u64,
    /// Interval of the periodic audit.
    pub audit_interval: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_free_memory_mb: DEFAULT_MIN_FREE_MEMORY_MB,
            audit_interval: DEFAULT_AUDIT_INTERVAL,
        }
    }
}

/// Runs the safety checks against a store.
pub struct StoreSafetyValidator<I>
where
    I: StoreIntrospection,
{
    store: Arc<I>,
    config: ValidatorConfig,
}

impl<I> StoreSafetyValidator<I>
where
    I: StoreIntrospection,
{
    /// Create a validator.
    pub const fn new(store: Arc<I>, config: ValidatorConfig) -> Self {
        Self { store, config }
    }

    /// Validator settings.
    pub const fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Run every check. A check whose snapshot cannot be read becomes an
    /// ERROR result; nothing here returns early.
    pub async fn validate_all(&self) -> Vec<ValidationResult> {
        let started = Instant::now();
        let ping = self
            .store
            .ping()
            .await
            .map(|()| started.elapsed())
            .map_err(|e| e.to_string());

        let results = vec![
            check_connectivity(ping),
            Self::or_failed(
                SafetyCheck::Persistence,
                self.store.persistence_info().await,
                |info| check_persistence(&info),
            ),
            Self::or_failed(
                SafetyCheck::EvictionPolicy,
                self.store.eviction_policy().await,
                |policy| check_eviction_policy(&policy),
            ),
            Self::or_failed(
                SafetyCheck::MemoryHeadroom,
                self.store.memory_info().await,
                |info| check_memory_headroom(&info, self.config.min_free_memory_mb),
            ),
            Self::or_failed(
                SafetyCheck::ReplicaReads,
                self.store.replication_info().await,
                |info| check_replication(&info),
            ),
        ];

        for result in &results {
            record_check_level(result.check.as_str(), result.level.as_gauge());
        }
        results
    }

    /// Run every check and log each result.
    ///
    /// Returns `false` if any check is ERROR or CRITICAL. Warnings pass.
    pub async fn validate_on_startup(&self) -> bool {
        tracing::info!("Validating coordination store configuration");
        let summary = ValidationSummary::from_results(self.validate_all().await);
        for result in &summary.checks {
            log_result(result);
        }

        if summary.passed {
            tracing::info!(
                ok = summary.ok,
                warning = summary.warning,
                "Coordination store validation passed"
            );
        } else {
            tracing::error!(
                error = summary.error,
                critical = summary.critical,
                "Coordination store validation failed, guard guarantees do not hold"
            );
        }
        summary.passed
    }

    /// Run every check and aggregate.
    pub async fn summary(&self) -> ValidationSummary {
        ValidationSummary::from_results(self.validate_all().await)
    }

    /// Audit on `audit_interval` until `shutdown` is cancelled.
    ///
    /// The first audit runs immediately. Only non-OK results are logged.
    pub async fn run_periodic_audit(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.audit_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.config.audit_interval.as_secs(),
            "Coordination store audit started"
        );

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    tracing::info!("Coordination store audit stopped");
                    break;
                }
                _ = interval.tick() => {
                    let summary = self.summary().await;
                    for result in summary.checks.iter().filter(|r| r.level != ValidationLevel::Ok) {
                        log_result(result);
                    }
                    tracing::debug!(
                        worst = %summary.worst_level(),
                        passed = summary.passed,
                        "Coordination store audit completed"
                    );
                }
            }
        }
    }

    fn or_failed<V>(
        check: SafetyCheck,
        snapshot: Result<V, StoreError>,
        evaluate: impl FnOnce(V) -> ValidationResult,
    ) -> ValidationResult {
        match snapshot {
            Ok(value) => evaluate(value),
            Err(e) => check_failed(check, &e.to_string()),
        }
    }
}

fn log_result(result: &ValidationResult) {
    let check = result.check.as_str();
    let level = result.level;
    match level {
        ValidationLevel::Ok => {
            tracing::info!(check, level = %level, details = %result.details, "{}", result.message);
        }
        ValidationLevel::Warning => {
            tracing::warn!(check, level = %level, details = %result.details, "{}", result.message);
        }
        ValidationLevel::Error | ValidationLevel::Critical => {
            tracing::error!(check, level = %level, details = %result.details, "{}", result.message);
        }
    }
}
