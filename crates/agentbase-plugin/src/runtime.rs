//! Runtime: wires store, catalog, registry, dispatcher, bridge and manager together.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::info;

use agentbase_core::config::plugin::PluginConfig;
use agentbase_core::result::AppResult;

use crate::api::context::{ContextFactory, InvocationScope};
use crate::bridge::RouteBridge;
use crate::catalog::PluginCatalog;
use crate::hooks::definitions::points;
use crate::hooks::dispatcher::{DispatchReport, HookDispatcher};
use crate::hooks::registry::HookRegistry;
use crate::installation::InstallationState;
use crate::manager::{PluginManager, RestoreReport};
use crate::manifest::PluginPackage;
use crate::store::{InstallationStore, MemoryInstallationStore};

/// One independent plugin runtime.
///
/// Every component is owned here and shared through `Arc`, so several
/// runtimes (for example one per test) never see each other's state.
pub struct Runtime {
    config: PluginConfig,
    store: Arc<dyn InstallationStore>,
    catalog: Arc<PluginCatalog>,
    registry: Arc<HookRegistry>,
    dispatcher: Arc<HookDispatcher>,
    bridge: Arc<RouteBridge>,
    manager: Arc<PluginManager>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Creates a runtime persisting installations in `store`.
    pub fn new(config: PluginConfig, store: Arc<dyn InstallationStore>) -> AppResult<Self> {
        let catalog = Arc::new(PluginCatalog::new());
        let registry = Arc::new(HookRegistry::new());
        let contexts = Arc::new(ContextFactory::new(
            store.clone(),
            catalog.clone(),
            config.clone(),
        )?);
        let dispatcher = Arc::new(HookDispatcher::new(
            registry.clone(),
            contexts,
            config.callback_timeout(),
        ));
        let bridge = Arc::new(RouteBridge::new(registry.clone(), dispatcher.clone()));
        let manager = Arc::new(PluginManager::new(
            store.clone(),
            catalog.clone(),
            registry.clone(),
            dispatcher.clone(),
            bridge.clone(),
        ));

        Ok(Self {
            config,
            store,
            catalog,
            registry,
            dispatcher,
            bridge,
            manager,
        })
    }

    /// Creates a runtime backed by an in-memory store.
    pub fn in_memory(config: PluginConfig) -> AppResult<Self> {
        Self::new(config, Arc::new(MemoryInstallationStore::new()))
    }

    /// Runtime configuration.
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Installation store.
    pub fn store(&self) -> &Arc<dyn InstallationStore> {
        &self.store
    }

    /// Marketplace catalog.
    pub fn catalog(&self) -> &Arc<PluginCatalog> {
        &self.catalog
    }

    /// Hook registry.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// Hook dispatcher.
    pub fn dispatcher(&self) -> &Arc<HookDispatcher> {
        &self.dispatcher
    }

    /// Route bridge.
    pub fn bridge(&self) -> &Arc<RouteBridge> {
        &self.bridge
    }

    /// Lifecycle manager.
    pub fn manager(&self) -> &Arc<PluginManager> {
        &self.manager
    }

    /// Publishes a package to the catalog.
    pub async fn publish(&self, package: PluginPackage) -> AppResult<Arc<PluginPackage>> {
        self.catalog.publish(package).await
    }

    /// Re-registers callbacks of installations persisted as active.
    pub async fn restore(&self) -> AppResult<RestoreReport> {
        self.manager.restore().await
    }

    /// Fires `app:init` once for every application with an active plugin.
    ///
    /// Returns the number of applications initialized.
    pub async fn boot_applications(&self) -> AppResult<usize> {
        let apps: BTreeSet<String> = self
            .store
            .list_by_state(InstallationState::Active)
            .await?
            .into_iter()
            .map(|i| i.app_id)
            .collect();

        for app_id in &apps {
            let scope = InvocationScope::new(app_id.as_str());
            let report = self
                .dispatcher
                .dispatch(points::APP_INIT, &scope, &[json!({ "app_id": app_id })])
                .await;
            info!(
                app_id = %app_id,
                invoked = report.invoked,
                failed = report.failures.len(),
                "Application initialized"
            );
        }
        Ok(apps.len())
    }

    /// Dispatches an action.
    pub async fn dispatch(&self, point: &str, scope: &InvocationScope, args: &[Value]) -> DispatchReport {
        self.dispatcher.dispatch(point, scope, args).await
    }

    /// Runs a filter pipeline.
    pub async fn filter(
        &self,
        point: &str,
        scope: &InvocationScope,
        value: Value,
        args: &[Value],
    ) -> Value {
        self.dispatcher.filter(point, scope, value, args).await
    }
}
