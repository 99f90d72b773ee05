//! Configuration module for the side-effect guard.
//!
//! Loads the YAML configuration with environment variable interpolation and
//! validates it. Every section has defaults, so an absent default config
//! file yields a usable configuration.
//!
//! # Usage
//!
//! ```rust,ignore
//! use side_effect_guard::config::load_config;
//!
//! // Load from $GUARD_CONFIG or guard.yaml
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("deploy/guard.yaml"))?;
//!
//! println!("store: {}", config.store.url);
//! ```

mod circuit_breaker;
mod guard;
mod observability;
mod store;
mod validator;

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use circuit_breaker::CircuitBreakerSettings;
pub use guard::GuardSettings;
pub use observability::{LogFormat, LoggingConfig, ObservabilityConfig};
pub use store::StoreSettings;
pub use validator::ValidatorSettings;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "GUARD_CONFIG";

/// Config file used when neither a path nor `GUARD_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "guard.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Coordination store connection.
    #[serde(default)]
    pub store: StoreSettings,
    /// Guard behavior.
    #[serde(default)]
    pub guard: GuardSettings,
    /// Store circuit breaker.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    /// Store safety validator.
    #[serde(default)]
    pub validator: ValidatorSettings,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// The guard's runtime config, breaker settings included.
    #[must_use]
    pub fn guard_config(&self) -> crate::application::services::GuardConfig {
        self.guard.to_guard_config(&self.circuit_breaker)
    }
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to `$GUARD_CONFIG`,
///   then `guard.yaml`. A missing file is only an error when the path was
///   given explicitly (argument or environment).
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let explicit = path
        .map(str::to_string)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().filter(|p| !p.is_empty()));

    let path = explicit
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    if explicit.is_none() && !Path::new(&path).exists() {
        tracing::debug!(path, "No config file, using defaults");
        let config = Config::default();
        validate_config(&config)?;
        return Ok(config);
    }

    let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.clone(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = if interpolated.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml_bw::from_str(&interpolated)?
    };
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.guard.namespace.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "guard.namespace must not be empty".to_string(),
        ));
    }

    if config.guard.default_ttl_secs == 0 {
        return Err(ConfigError::ValidationError(
            "guard.default_ttl_secs must be positive".to_string(),
        ));
    }

    if config.store.command_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "store.command_timeout_ms must be positive".to_string(),
        ));
    }

    let cb = &config.circuit_breaker;
    if !(0.0..=1.0).contains(&cb.failure_rate_threshold) {
        return Err(ConfigError::ValidationError(
            "circuit_breaker.failure_rate_threshold must be between 0.0 and 1.0".to_string(),
        ));
    }

    if config.validator.periodic_audit && config.validator.audit_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "validator.audit_interval_secs must be positive when periodic_audit is enabled"
                .to_string(),
        ));
    }

    Ok(())
}
