//! Plugin manager: install, activate, deactivate and uninstall per application.
//!
//! Lifecycle operations on the same `(app_id, plugin_id)` are serialized
//! through a per-pair mutex; operations on different pairs run concurrently.
//! Lifecycle events (`plugin:installed`, ...) are dispatched after the pair
//! lock is released.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value, json};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use agentbase_core::error::AppError;
use agentbase_core::result::AppResult;

use crate::api::context::InvocationScope;
use crate::bridge::RouteBridge;
use crate::catalog::{PackageStatus, PluginCatalog};
use crate::hooks::definitions::{CallbackKind, points};
use crate::hooks::dispatcher::HookDispatcher;
use crate::hooks::registry::HookRegistry;
use crate::installation::{InstallKey, Installation, InstallationState};
use crate::manifest::PluginPackage;
use crate::store::InstallationStore;

/// Outcome of [`PluginManager::restore`].
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    /// Installations whose callbacks were re-registered.
    pub restored: usize,
    /// Installations skipped because their package is not in the catalog.
    pub skipped: Vec<InstallKey>,
}

/// Manages plugin installations and keeps the hook registry in step with them.
pub struct PluginManager {
    store: Arc<dyn InstallationStore>,
    catalog: Arc<PluginCatalog>,
    registry: Arc<HookRegistry>,
    dispatcher: Arc<HookDispatcher>,
    bridge: Arc<RouteBridge>,
    locks: DashMap<InstallKey, Arc<Mutex<()>>>,
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("locked_pairs", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl PluginManager {
    /// Creates a manager over shared runtime components.
    pub fn new(
        store: Arc<dyn InstallationStore>,
        catalog: Arc<PluginCatalog>,
        registry: Arc<HookRegistry>,
        dispatcher: Arc<HookDispatcher>,
        bridge: Arc<RouteBridge>,
    ) -> Self {
        Self {
            store,
            catalog,
            registry,
            dispatcher,
            bridge,
            locks: DashMap::new(),
        }
    }

    async fn lock(&self, key: &InstallKey) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(key.clone()).or_default().clone();
        mutex.lock_owned().await
    }

    async fn find_live(&self, app_id: &str, plugin_id: &str) -> AppResult<Installation> {
        self.store
            .find_live(app_id, plugin_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Plugin '{plugin_id}' is not installed in application '{app_id}'"
                ))
            })
    }

    async fn package_for(&self, installation: &Installation) -> AppResult<Arc<PluginPackage>> {
        self.catalog
            .get(&installation.plugin_id, &installation.plugin_version)
            .await
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Plugin '{}' version {} is not in the catalog",
                    installation.plugin_id, installation.plugin_version
                ))
            })
    }

    /// Installs a package into an application with its default settings.
    ///
    /// The package is published to the catalog if that version is not
    /// there yet. Fails with `Conflict` if the plugin is already installed
    /// or deprecated in the marketplace.
    pub async fn install(
        &self,
        app_id: &str,
        installed_by: &str,
        package: Arc<PluginPackage>,
    ) -> AppResult<Installation> {
        if app_id.trim().is_empty() {
            return Err(AppError::validation("Application id must not be empty"));
        }
        if installed_by.trim().is_empty() {
            return Err(AppError::validation("Installing user must not be empty"));
        }

        let package = self.catalog.publish_or_get(package).await?;
        if self.catalog.status(package.name()).await == Some(PackageStatus::Deprecated) {
            return Err(AppError::conflict(format!(
                "Plugin '{}' is deprecated and cannot be installed",
                package.name()
            )));
        }
        let key = InstallKey::new(app_id, package.name());

        let installation = {
            let _guard = self.lock(&key).await;

            if self.store.find_live(app_id, package.name()).await?.is_some() {
                return Err(AppError::conflict(format!(
                    "Plugin '{}' is already installed in application '{app_id}'",
                    package.name()
                )));
            }

            let installation = Installation::new(
                app_id,
                &package.manifest,
                installed_by,
                package.definition.settings.defaults(),
            );
            self.store.insert(&installation).await?;
            installation
        };

        info!(
            app_id = %app_id,
            plugin_id = %installation.plugin_id,
            version = %installation.plugin_version,
            installed_by = %installed_by,
            "Plugin installed"
        );

        let scope = InvocationScope::new(app_id).with_user(installed_by);
        self.emit(points::PLUGIN_INSTALLED, &scope, &installation).await;
        Ok(installation)
    }

    /// Installs a published package by name, using the latest version
    /// unless `version` is given.
    pub async fn install_from_catalog(
        &self,
        app_id: &str,
        installed_by: &str,
        plugin_id: &str,
        version: Option<&str>,
    ) -> AppResult<Installation> {
        let package = self.catalog.resolve(plugin_id, version).await?;
        self.install(app_id, installed_by, package).await
    }

    /// Activates an installed plugin: registers its callbacks in
    /// declaration order, runs `on_activate`, then persists `active`.
    ///
    /// Activating an already active plugin is a no-op.
    pub async fn activate(&self, app_id: &str, plugin_id: &str) -> AppResult<Installation> {
        let key = InstallKey::new(app_id, plugin_id);

        let installation = {
            let _guard = self.lock(&key).await;
            let mut installation = self.find_live(app_id, plugin_id).await?;
            if installation.is_active() {
                return Ok(installation);
            }

            let package = self.package_for(&installation).await?;
            installation.transition(InstallationState::Active)?;

            self.attach(&installation, &package).await;
            if let Err(e) = self.store.save_lifecycle(&installation).await {
                self.registry.unregister(app_id, plugin_id);
                return Err(e);
            }
            installation
        };

        info!(app_id = %app_id, plugin_id = %plugin_id, "Plugin activated");

        let scope = InvocationScope::new(app_id);
        self.emit(points::PLUGIN_ACTIVATED, &scope, &installation).await;
        Ok(installation)
    }

    /// Deactivates an active plugin: runs `on_deactivate`, removes its
    /// callbacks, then persists `inactive`.
    ///
    /// If the new state cannot be persisted the callbacks are registered
    /// again, so the plugin stays active. Fails with `NotFound` if the
    /// plugin is not currently active.
    pub async fn deactivate(&self, app_id: &str, plugin_id: &str) -> AppResult<Installation> {
        let key = InstallKey::new(app_id, plugin_id);

        let installation = {
            let _guard = self.lock(&key).await;
            let mut installation = self.find_live(app_id, plugin_id).await?;
            if !installation.is_active() {
                return Err(AppError::not_found(format!(
                    "Plugin '{plugin_id}' is not active in application '{app_id}'"
                )));
            }

            installation.transition(InstallationState::Inactive)?;
            self.detach(&installation).await;
            if let Err(e) = self.store.save_lifecycle(&installation).await {
                self.reattach(&installation).await;
                return Err(e);
            }
            installation
        };

        info!(app_id = %app_id, plugin_id = %plugin_id, "Plugin deactivated");

        let scope = InvocationScope::new(app_id);
        self.emit(points::PLUGIN_DEACTIVATED, &scope, &installation).await;
        Ok(installation)
    }

    /// Uninstalls a plugin, deactivating it first if needed.
    ///
    /// The record is kept with state `uninstalled` so the plugin can be
    /// installed again later.
    pub async fn uninstall(&self, app_id: &str, plugin_id: &str) -> AppResult<Installation> {
        let key = InstallKey::new(app_id, plugin_id);

        let installation = {
            let _guard = self.lock(&key).await;
            let mut installation = self.find_live(app_id, plugin_id).await?;

            let was_active = installation.is_active();
            if was_active {
                installation.transition(InstallationState::Inactive)?;
            }
            installation.transition(InstallationState::Uninstalled)?;
            if was_active {
                self.detach(&installation).await;
            }
            if let Err(e) = self.store.save_lifecycle(&installation).await {
                if was_active {
                    self.reattach(&installation).await;
                }
                return Err(e);
            }
            installation
        };

        info!(app_id = %app_id, plugin_id = %plugin_id, "Plugin uninstalled");

        let scope = InvocationScope::new(app_id);
        self.emit(points::PLUGIN_UNINSTALLED, &scope, &installation).await;
        Ok(installation)
    }

    /// Validates and stores a single setting.
    pub async fn set_setting(
        &self,
        app_id: &str,
        plugin_id: &str,
        key: &str,
        value: Value,
    ) -> AppResult<Installation> {
        let mut values = Map::new();
        values.insert(key.to_string(), value);
        self.update_settings(app_id, plugin_id, values).await
    }

    /// Validates every entry, then stores them together; nothing is
    /// stored if any entry is invalid.
    pub async fn update_settings(
        &self,
        app_id: &str,
        plugin_id: &str,
        values: Map<String, Value>,
    ) -> AppResult<Installation> {
        let _guard = self.lock(&InstallKey::new(app_id, plugin_id)).await;
        let installation = self.find_live(app_id, plugin_id).await?;
        let package = self.package_for(&installation).await?;
        package.definition.settings.validate_values(&values)?;

        let updated = self.store.merge_settings(installation.id, &values).await?;

        info!(
            app_id = %app_id,
            plugin_id = %plugin_id,
            keys = ?values.keys().collect::<Vec<_>>(),
            "Plugin settings updated"
        );
        Ok(updated)
    }

    /// Returns the live installation of a plugin.
    pub async fn get(&self, app_id: &str, plugin_id: &str) -> AppResult<Installation> {
        self.find_live(app_id, plugin_id).await
    }

    /// Lists the live installations of an application.
    pub async fn list_installed(&self, app_id: &str) -> AppResult<Vec<Installation>> {
        self.store.list_by_app(app_id).await
    }

    /// Lists every installation record ever created for the pair.
    pub async fn history(&self, app_id: &str, plugin_id: &str) -> AppResult<Vec<Installation>> {
        self.store.history(app_id, plugin_id).await
    }

    /// Re-registers the callbacks of every installation persisted as active.
    ///
    /// Installations are replayed in activation order so callback ordering
    /// matches the original run. States are not changed; pairs that are
    /// already registered are left alone.
    pub async fn restore(&self) -> AppResult<RestoreReport> {
        let mut active = self.store.list_by_state(InstallationState::Active).await?;
        active.sort_by_key(|i| (i.activated_at, i.installed_at));

        let mut report = RestoreReport::default();
        for installation in active {
            let key = installation.key();
            let _guard = self.lock(&key).await;

            if self
                .registry
                .contains_plugin(&installation.app_id, &installation.plugin_id)
            {
                continue;
            }

            match self.package_for(&installation).await {
                Ok(package) => {
                    self.attach(&installation, &package).await;
                    report.restored += 1;
                }
                Err(e) => {
                    error!(
                        app_id = %installation.app_id,
                        plugin_id = %installation.plugin_id,
                        error = %e,
                        "Cannot restore active plugin"
                    );
                    report.skipped.push(key);
                }
            }
        }

        info!(
            restored = report.restored,
            skipped = report.skipped.len(),
            "Active plugins restored"
        );
        Ok(report)
    }

    /// Registers the package's callbacks for the installation, then runs `on_activate`.
    async fn attach(&self, installation: &Installation, package: &PluginPackage) {
        let app_id = &installation.app_id;
        let plugin_id = &installation.plugin_id;
        let definition = &package.definition;

        self.register_callbacks(installation, package);
        self.bridge
            .flag_duplicate_claims(app_id, plugin_id, definition);

        if let Some(on_activate) = &definition.on_activate {
            let scope = InvocationScope::new(app_id.as_str());
            if let Err(e) = self
                .dispatcher
                .invoke_as(plugin_id, on_activate, &scope, &[])
                .await
            {
                warn!(
                    app_id = %app_id,
                    plugin_id = %plugin_id,
                    error = %e,
                    "on_activate failed; plugin stays active"
                );
            }
        }
    }

    /// Puts back the callbacks removed by a `detach` whose state change
    /// could not be persisted. `on_activate` is not run again.
    async fn reattach(&self, installation: &Installation) {
        match self.package_for(installation).await {
            Ok(package) => {
                self.register_callbacks(installation, &package);
                warn!(
                    app_id = %installation.app_id,
                    plugin_id = %installation.plugin_id,
                    "State change not persisted; callbacks registered again"
                );
            }
            Err(e) => error!(
                app_id = %installation.app_id,
                plugin_id = %installation.plugin_id,
                error = %e,
                "State change not persisted and callbacks cannot be restored"
            ),
        }
    }

    fn register_callbacks(&self, installation: &Installation, package: &PluginPackage) {
        let app_id = &installation.app_id;
        let plugin_id = &installation.plugin_id;
        let definition = &package.definition;

        for binding in &definition.hooks {
            self.registry.register(
                CallbackKind::Action,
                app_id,
                &binding.point,
                plugin_id,
                binding.callback.clone(),
            );
        }
        for binding in &definition.filters {
            self.registry.register(
                CallbackKind::Filter,
                app_id,
                &binding.point,
                plugin_id,
                binding.callback.clone(),
            );
        }
    }

    /// Runs `on_deactivate`, then removes every callback of the installation.
    async fn detach(&self, installation: &Installation) {
        let app_id = &installation.app_id;
        let plugin_id = &installation.plugin_id;

        match self.package_for(installation).await {
            Ok(package) => {
                if let Some(on_deactivate) = &package.definition.on_deactivate {
                    let scope = InvocationScope::new(app_id.as_str());
                    if let Err(e) = self
                        .dispatcher
                        .invoke_as(plugin_id, on_deactivate, &scope, &[])
                        .await
                    {
                        warn!(
                            app_id = %app_id,
                            plugin_id = %plugin_id,
                            error = %e,
                            "on_deactivate failed; continuing"
                        );
                    }
                }
            }
            Err(e) => warn!(
                app_id = %app_id,
                plugin_id = %plugin_id,
                error = %e,
                "Skipping on_deactivate"
            ),
        }

        self.registry.unregister(app_id, plugin_id);
    }

    async fn emit(&self, point: &str, scope: &InvocationScope, installation: &Installation) {
        let args = [json!({
            "app_id": installation.app_id,
            "plugin": installation.plugin_id,
            "version": installation.plugin_version,
            "state": installation.state,
        })];
        self.dispatcher.dispatch(point, scope, &args).await;
    }
}
