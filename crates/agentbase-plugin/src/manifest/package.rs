//! Plugin definition (callbacks and settings) and the package that pairs it with a manifest.

use std::fmt;
use std::sync::Arc;

use agentbase_core::error::AppError;
use agentbase_core::result::AppResult;

use super::PluginManifest;
use super::settings::{SettingField, SettingsSchema};
use crate::hooks::callback::Callback;
use crate::hooks::definitions::{normalize_subpath, route_subpath};

/// A callback bound to an extension point.
#[derive(Clone)]
pub struct HookBinding {
    /// Extension point name.
    pub point: String,
    /// The callback.
    pub callback: Arc<dyn Callback>,
}

impl fmt::Debug for HookBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookBinding")
            .field("point", &self.point)
            .finish_non_exhaustive()
    }
}

/// The callable part of a plugin.
///
/// Hooks and filters are kept in declaration order; that order becomes
/// the registration order when the plugin is activated.
#[derive(Clone, Default)]
pub struct PluginDefinition {
    /// Action callbacks, including `api:request:` route handlers.
    pub hooks: Vec<HookBinding>,
    /// Filter callbacks.
    pub filters: Vec<HookBinding>,
    /// Declared settings.
    pub settings: SettingsSchema,
    /// Called after the plugin's callbacks are registered.
    pub on_activate: Option<Arc<dyn Callback>>,
    /// Called before the plugin's callbacks are removed.
    pub on_deactivate: Option<Arc<dyn Callback>>,
}

impl fmt::Debug for PluginDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let points = |bindings: &[HookBinding]| -> Vec<String> {
            bindings.iter().map(|b| b.point.clone()).collect()
        };
        f.debug_struct("PluginDefinition")
            .field("hooks", &points(&self.hooks))
            .field("filters", &points(&self.filters))
            .field("settings", &self.settings)
            .field("on_activate", &self.on_activate.is_some())
            .field("on_deactivate", &self.on_deactivate.is_some())
            .finish()
    }
}

impl PluginDefinition {
    /// Subpaths this plugin serves through the route bridge.
    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().filter_map(|b| route_subpath(&b.point))
    }

    /// Checks point names and the settings schema.
    pub fn validate(&self) -> AppResult<()> {
        for binding in self.hooks.iter().chain(self.filters.iter()) {
            if binding.point.trim().is_empty() {
                return Err(AppError::validation("Extension point names must not be empty"));
            }
        }
        for subpath in self.routes() {
            if normalize_subpath(subpath) == "/" {
                return Err(AppError::validation(
                    "Route handlers must declare a non-empty subpath",
                ));
            }
        }
        self.settings.validate()
    }
}

/// A manifest paired with its definition; the unit that gets published and installed.
#[derive(Debug, Clone)]
pub struct PluginPackage {
    /// Static metadata.
    pub manifest: PluginManifest,
    /// Callbacks and settings.
    pub definition: PluginDefinition,
}

impl PluginPackage {
    /// Creates a package.
    pub fn new(manifest: PluginManifest, definition: PluginDefinition) -> Self {
        Self {
            manifest,
            definition,
        }
    }

    /// Starts building a package.
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> PluginBuilder {
        PluginBuilder {
            manifest: PluginManifest::new(name, version),
            definition: PluginDefinition::default(),
        }
    }

    /// Plugin name (the plugin id).
    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    /// Plugin version.
    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    /// Validates the manifest and the definition.
    pub fn validate(&self) -> AppResult<()> {
        self.manifest.validate()?;
        self.definition.validate()
    }
}

/// Fluent builder for [`PluginPackage`].
#[derive(Debug)]
pub struct PluginBuilder {
    manifest: PluginManifest,
    definition: PluginDefinition,
}

impl PluginBuilder {
    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.manifest.description = Some(description.into());
        self
    }

    /// Sets the author.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.manifest.author = Some(author.into());
        self
    }

    /// Declares a capability.
    pub fn permission(mut self, capability: impl Into<String>) -> Self {
        self.manifest.permissions.insert(capability.into());
        self
    }

    /// Declares a dependency on another plugin.
    pub fn dependency(mut self, name: impl Into<String>, requirement: impl Into<String>) -> Self {
        self.manifest
            .dependencies
            .insert(name.into(), requirement.into());
        self
    }

    /// Adds an action callback.
    pub fn hook(mut self, point: impl Into<String>, callback: Arc<dyn Callback>) -> Self {
        self.definition.hooks.push(HookBinding {
            point: point.into(),
            callback,
        });
        self
    }

    /// Adds a filter callback.
    pub fn filter(mut self, point: impl Into<String>, callback: Arc<dyn Callback>) -> Self {
        self.definition.filters.push(HookBinding {
            point: point.into(),
            callback,
        });
        self
    }

    /// Adds a route handler served at `subpath` through the route bridge.
    pub fn route(self, subpath: &str, callback: Arc<dyn Callback>) -> Self {
        let point = crate::hooks::definitions::route_point(subpath);
        self.hook(point, callback)
    }

    /// Declares a setting.
    pub fn setting(mut self, key: impl Into<String>, field: SettingField) -> Self {
        self.definition.settings.insert(key, field);
        self
    }

    /// Sets the activation callback.
    pub fn on_activate(mut self, callback: Arc<dyn Callback>) -> Self {
        self.definition.on_activate = Some(callback);
        self
    }

    /// Sets the deactivation callback.
    pub fn on_deactivate(mut self, callback: Arc<dyn Callback>) -> Self {
        self.definition.on_deactivate = Some(callback);
        self
    }

    /// Finishes the package. Validation happens on publish and install.
    pub fn build(self) -> PluginPackage {
        PluginPackage::new(self.manifest, self.definition)
    }
}
