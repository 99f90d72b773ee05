//! Coordination Store Safety Check Binary
//!
//! Validates that the coordination store can back the side-effect guard:
//! reachable, persistent, non-evicting, not a replica, with memory headroom.
//! Exits non-zero when any check is ERROR or CRITICAL, so deploy pipelines
//! can gate on it. With `validator.periodic_audit` enabled it keeps auditing
//! until SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin guard-safety-check
//! ```
//!
//! # Environment Variables
//!
//! - `GUARD_CONFIG`: Config file path (default: guard.yaml, optional)
//! - `RUST_LOG`: Log filter, overrides `observability.logging.level`

use std::sync::Arc;

use anyhow::Context;
use side_effect_guard::application::services::StoreSafetyValidator;
use side_effect_guard::config::{Config, load_config};
use side_effect_guard::infrastructure::store::RedisCoordinationStore;
use side_effect_guard::observability::{init_metrics, init_tracing};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let config = load_config(None).context("loading configuration")?;
    init_tracing(&config.observability.logging).context("initializing tracing")?;
    if let Some(metrics) = config.observability.metrics_config() {
        init_metrics(&metrics).context("initializing metrics")?;
    }

    log_config(&config);

    let store = match RedisCoordinationStore::connect(&config.store.to_store_config()).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, "Coordination store unreachable");
            anyhow::bail!("coordination store unreachable: {e}");
        }
    };

    let validator = StoreSafetyValidator::new(store, config.validator.to_validator_config());
    if !validator.validate_on_startup().await {
        anyhow::bail!("coordination store is not safe for the side-effect guard");
    }

    if config.validator.periodic_audit {
        let shutdown = CancellationToken::new();
        tokio::spawn(shutdown_signal(shutdown.clone()));
        validator.run_periodic_audit(shutdown).await;
    }

    Ok(())
}

fn log_config(config: &Config) {
    tracing::info!(
        namespace = %config.guard.namespace,
        default_ttl_secs = config.guard.default_ttl_secs,
        outage_policy = ?config.guard.outage_policy,
        command_timeout_ms = config.store.command_timeout_ms,
        periodic_audit = config.validator.periodic_audit,
        "Starting coordination store safety check"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, stopping audit"),
        () = terminate => tracing::info!("Received SIGTERM, stopping audit"),
    }

    shutdown.cancel();
}
