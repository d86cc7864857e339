//! Installation records: one plugin installed into one application.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use agentbase_core::error::AppError;
use agentbase_core::result::AppResult;

use crate::manifest::PluginManifest;

/// Lifecycle state of an installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallationState {
    /// Installed but never activated.
    Installed,
    /// Callbacks are registered.
    Active,
    /// Deactivated after having been active.
    Inactive,
    /// Removed; kept for history only.
    Uninstalled,
}

impl InstallationState {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Uninstalled => "uninstalled",
        }
    }

    /// Returns true for every state except `Uninstalled`.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Uninstalled)
    }

    fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Installed, Self::Active)
                | (Self::Inactive, Self::Active)
                | (Self::Active, Self::Inactive)
                | (Self::Installed, Self::Uninstalled)
                | (Self::Inactive, Self::Uninstalled)
        )
    }
}

impl fmt::Display for InstallationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallationState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "installed" => Ok(Self::Installed),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "uninstalled" => Ok(Self::Uninstalled),
            other => Err(AppError::validation(format!(
                "Unknown installation state '{other}'"
            ))),
        }
    }
}

/// Application id + plugin id; at most one live installation exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstallKey {
    /// Application id.
    pub app_id: String,
    /// Plugin id.
    pub plugin_id: String,
}

impl InstallKey {
    /// Creates a key.
    pub fn new(app_id: impl Into<String>, plugin_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            plugin_id: plugin_id.into(),
        }
    }
}

impl fmt::Display for InstallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_id, self.plugin_id)
    }
}

/// A plugin installed into an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installation {
    /// Record id.
    pub id: Uuid,
    /// Owning application.
    pub app_id: String,
    /// Installed plugin (its manifest name).
    pub plugin_id: String,
    /// Installed plugin version.
    pub plugin_version: String,
    /// User who installed the plugin.
    pub installed_by: String,
    /// Lifecycle state.
    pub state: InstallationState,
    /// Current setting values.
    pub settings: Map<String, Value>,
    /// When the record was created.
    pub installed_at: DateTime<Utc>,
    /// Last activation.
    pub activated_at: Option<DateTime<Utc>>,
    /// Last deactivation.
    pub deactivated_at: Option<DateTime<Utc>>,
    /// When the plugin was uninstalled.
    pub uninstalled_at: Option<DateTime<Utc>>,
    /// Last modification.
    pub updated_at: DateTime<Utc>,
}

impl Installation {
    /// Creates a fresh record in the `Installed` state.
    pub fn new(
        app_id: &str,
        manifest: &PluginManifest,
        installed_by: &str,
        settings: Map<String, Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            app_id: app_id.to_string(),
            plugin_id: manifest.name.clone(),
            plugin_version: manifest.version.clone(),
            installed_by: installed_by.to_string(),
            state: InstallationState::Installed,
            settings,
            installed_at: now,
            activated_at: None,
            deactivated_at: None,
            uninstalled_at: None,
            updated_at: now,
        }
    }

    /// Returns the `(app_id, plugin_id)` key.
    pub fn key(&self) -> InstallKey {
        InstallKey::new(&self.app_id, &self.plugin_id)
    }

    /// Returns true if the plugin's callbacks should be registered.
    pub fn is_active(&self) -> bool {
        self.state == InstallationState::Active
    }

    /// Moves to `next`, stamping the matching timestamp.
    pub fn transition(&mut self, next: InstallationState) -> AppResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::conflict(format!(
                "Plugin '{}' cannot move from {} to {} in application '{}'",
                self.plugin_id, self.state, next, self.app_id
            )));
        }

        let now = Utc::now();
        match next {
            InstallationState::Active => self.activated_at = Some(now),
            InstallationState::Inactive => self.deactivated_at = Some(now),
            InstallationState::Uninstalled => self.uninstalled_at = Some(now),
            InstallationState::Installed => {}
        }
        self.state = next;
        self.updated_at = now;
        Ok(())
    }
}
