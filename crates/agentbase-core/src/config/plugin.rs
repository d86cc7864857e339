//! Plugin runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Plugin runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Upper bound for a single hook/filter callback, in milliseconds.
    #[serde(default = "default_callback_timeout")]
    pub callback_timeout_ms: u64,
    /// Upper bound for a plugin's outbound request, in seconds.
    #[serde(default = "default_outbound_timeout")]
    pub outbound_timeout_seconds: u64,
    /// Base URL that relative plugin requests (`/api/...`) resolve against.
    #[serde(default = "default_platform_base_url")]
    pub platform_base_url: String,
    /// Whether to re-activate persisted `active` installations on startup.
    #[serde(default = "default_true")]
    pub restore_on_start: bool,
}

impl PluginConfig {
    /// Callback timeout as a `Duration`.
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }

    /// Outbound request timeout as a `Duration`.
    pub fn outbound_timeout(&self) -> Duration {
        Duration::from_secs(self.outbound_timeout_seconds)
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            callback_timeout_ms: default_callback_timeout(),
            outbound_timeout_seconds: default_outbound_timeout(),
            platform_base_url: default_platform_base_url(),
            restore_on_start: default_true(),
        }
    }
}

fn default_callback_timeout() -> u64 {
    30_000
}

fn default_outbound_timeout() -> u64 {
    30
}

fn default_platform_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_true() -> bool {
    true
}
