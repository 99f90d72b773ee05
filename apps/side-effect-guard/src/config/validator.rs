//! Store safety validator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::services::{DEFAULT_AUDIT_INTERVAL, ValidatorConfig};
use crate::domain::store_safety::DEFAULT_MIN_FREE_MEMORY_MB;

/// Validator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorSettings {
    /// Free memory below this is a warning.
    #[serde(default = "default_min_free_memory_mb")]
    pub min_free_memory_mb: u64,
    /// Seconds between periodic audits.
    #[serde(default = "default_audit_interval_secs")]
    pub audit_interval_secs: u64,
    /// Keep auditing after the startup check.
    #[serde(default)]
    pub periodic_audit: bool,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            min_free_memory_mb: default_min_free_memory_mb(),
            audit_interval_secs: default_audit_interval_secs(),
            periodic_audit: false,
        }
    }
}

impl ValidatorSettings {
    /// Build the validator's runtime config.
    #[must_use]
    pub const fn to_validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            min_free_memory_mb: self.min_free_memory_mb,
            audit_interval: Duration::from_secs(self.audit_interval_secs),
        }
    }
}

const fn default_min_free_memory_mb() -> u64 {
    DEFAULT_MIN_FREE_MEMORY_MB
}

const fn default_audit_interval_secs() -> u64 {
    DEFAULT_AUDIT_INTERVAL.as_secs()
}
