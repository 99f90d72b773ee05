//! Observability: Prometheus metrics and structured logging.

mod metrics;
mod tracing;

pub use self::metrics::{
    ExecutionOutcomeLabel, MetricsConfig, MetricsError, circuit_breaker_state, init_metrics,
    record_cache_write_failure, record_check_level, record_circuit_breaker_state,
    record_execution, record_rollback_failure, record_store_error,
};
pub use self::tracing::{TracingError, build_filter, init_tracing};
