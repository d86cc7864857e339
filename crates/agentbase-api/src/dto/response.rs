//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use agentbase_plugin::Installation;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server answers.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Number of packages in the marketplace.
    pub marketplace_plugins: usize,
}

/// Installation as returned by the management API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallationResponse {
    /// Record id.
    pub id: Uuid,
    /// Application id.
    pub app_id: String,
    /// Plugin name.
    pub plugin_id: String,
    /// Installed version.
    pub version: String,
    /// Lifecycle state.
    pub state: String,
    /// Installing user.
    pub installed_by: String,
    /// Current settings.
    pub settings: Map<String, Value>,
    /// Created at.
    pub installed_at: DateTime<Utc>,
    /// Last activation.
    pub activated_at: Option<DateTime<Utc>>,
    /// Last deactivation.
    pub deactivated_at: Option<DateTime<Utc>>,
    /// Uninstall time.
    pub uninstalled_at: Option<DateTime<Utc>>,
}

impl From<Installation> for InstallationResponse {
    fn from(inst: Installation) -> Self {
        Self {
            id: inst.id,
            app_id: inst.app_id,
            plugin_id: inst.plugin_id,
            version: inst.plugin_version,
            state: inst.state.as_str().to_string(),
            installed_by: inst.installed_by,
            settings: inst.settings,
            installed_at: inst.installed_at,
            activated_at: inst.activated_at,
            deactivated_at: inst.deactivated_at,
            uninstalled_at: inst.uninstalled_at,
        }
    }
}
