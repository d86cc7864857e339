//! Application state shared across all handlers and middleware.

use std::sync::Arc;

use agentbase_core::config::AppConfig;
use agentbase_plugin::Runtime;

/// Application state passed to every handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Plugin runtime (catalog, manager, registry, dispatcher, bridge).
    pub runtime: Arc<Runtime>,
}

impl AppState {
    /// Creates the state.
    pub fn new(config: AppConfig, runtime: Arc<Runtime>) -> Self {
        Self {
            config: Arc::new(config),
            runtime,
        }
    }
}
