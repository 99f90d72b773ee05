//! Coordination store connection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::infrastructure::store::RedisStoreConfig;

/// Coordination store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Redis URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Per-command timeout in milliseconds.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: default_url(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl StoreSettings {
    /// Convert to the Redis adapter's connection settings.
    #[must_use]
    pub fn to_store_config(&self) -> RedisStoreConfig {
        RedisStoreConfig {
            url: self.url.clone(),
            command_timeout: Duration::from_millis(self.command_timeout_ms),
        }
    }
}

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

const fn default_command_timeout_ms() -> u64 {
    2000
}
