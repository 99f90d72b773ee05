//! Guard configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::circuit_breaker::CircuitBreakerSettings;
use crate::application::services::{DEFAULT_TTL, GuardConfig, StoreOutagePolicy};
use crate::domain::idempotency::DEFAULT_NAMESPACE;

/// Guard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardSettings {
    /// Key namespace.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Record TTL in seconds.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Behavior when the store cannot be reached.
    #[serde(default)]
    pub outage_policy: StoreOutagePolicy,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            default_ttl_secs: default_ttl_secs(),
            outage_policy: StoreOutagePolicy::default(),
        }
    }
}

impl GuardSettings {
    /// Build the guard's runtime config.
    #[must_use]
    pub fn to_guard_config(&self, circuit_breaker: &CircuitBreakerSettings) -> GuardConfig {
        GuardConfig {
            namespace: self.namespace.clone(),
            default_ttl: Duration::from_secs(self.default_ttl_secs),
            outage_policy: self.outage_policy,
            circuit_breaker: circuit_breaker.to_resilience_config(),
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

const fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}
