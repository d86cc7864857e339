//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section; every field has a default so an empty file is a valid config.

pub mod app;
pub mod database;
pub mod logging;
pub mod plugin;

use serde::{Deserialize, Serialize};

use self::app::ServerConfig;
use self::database::DatabaseConfig;
use self::logging::LoggingConfig;
use self::plugin::PluginConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Installation store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Plugin runtime settings.
    #[serde(default)]
    pub plugins: PluginConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Merges `config/default.toml`, the file at `path` and environment
    /// variables prefixed with `AGENTBASE__` (e.g. `AGENTBASE__SERVER__PORT`).
    /// Missing files are skipped.
    pub fn load(path: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("AGENTBASE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
