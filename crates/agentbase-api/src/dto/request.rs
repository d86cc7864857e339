//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Install a plugin from the marketplace.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InstallPluginRequest {
    /// Plugin name as published in the marketplace.
    #[validate(length(min = 1, max = 100))]
    pub plugin: String,
    /// Exact version; latest when omitted.
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub version: Option<String>,
}

/// Query parameters for `GET /api/marketplace`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketplaceQuery {
    /// `published` or `deprecated`; every plugin when omitted.
    #[serde(default)]
    pub status: Option<String>,
}

/// Update a single setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSettingRequest {
    /// New value, checked against the plugin's settings schema.
    pub value: Value,
}

/// Update several settings at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSettingsRequest {
    /// Key/value pairs; all are validated before any is stored.
    pub settings: Map<String, Value>,
}
