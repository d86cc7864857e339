//! Plugin descriptors: manifest, settings schema and the callable definition.

pub mod package;
pub mod settings;

use std::collections::{BTreeMap, BTreeSet};

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use agentbase_core::error::AppError;
use agentbase_core::result::AppResult;

pub use package::{HookBinding, PluginBuilder, PluginDefinition, PluginPackage};
pub use settings::{SettingField, SettingType, SettingsSchema};

/// Maximum length of a plugin name.
const MAX_NAME_LEN: usize = 100;

/// Static metadata describing a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique plugin name; doubles as the plugin id.
    pub name: String,
    /// Semantic version.
    pub version: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Author name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Declared capabilities (e.g. `platform:api`, `network:example.com`).
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    /// Other plugins this one expects, name → semver requirement.
    ///
    /// Validated for syntax only; not enforced at activation.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl PluginManifest {
    /// Creates a manifest with no optional fields.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: None,
            author: None,
            permissions: BTreeSet::new(),
            dependencies: BTreeMap::new(),
        }
    }

    /// Parses the version string.
    pub fn parsed_version(&self) -> AppResult<Version> {
        Version::parse(&self.version).map_err(|e| {
            AppError::validation(format!(
                "Plugin '{}' has invalid version '{}': {e}",
                self.name, self.version
            ))
        })
    }

    /// Returns true if the manifest declares `capability`.
    pub fn has_permission(&self, capability: &str) -> bool {
        self.permissions.contains(capability)
    }

    /// Checks that the manifest is well formed.
    pub fn validate(&self) -> AppResult<()> {
        let name = self.name.as_str();
        if name.is_empty() {
            return Err(AppError::validation("Plugin name must not be empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(AppError::validation(format!(
                "Plugin name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        if name.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(AppError::validation(format!(
                "Plugin name '{name}' must not contain whitespace or '/'"
            )));
        }

        self.parsed_version()?;

        for permission in &self.permissions {
            if permission.is_empty() || permission.chars().any(char::is_whitespace) {
                return Err(AppError::validation(format!(
                    "Plugin '{name}' declares an invalid permission '{permission}'"
                )));
            }
        }

        for (dependency, requirement) in &self.dependencies {
            if dependency.is_empty() || dependency == name {
                return Err(AppError::validation(format!(
                    "Plugin '{name}' declares an invalid dependency '{dependency}'"
                )));
            }
            VersionReq::parse(requirement).map_err(|e| {
                AppError::validation(format!(
                    "Plugin '{name}' dependency '{dependency}' has invalid requirement '{requirement}': {e}"
                ))
            })?;
        }

        Ok(())
    }
}
