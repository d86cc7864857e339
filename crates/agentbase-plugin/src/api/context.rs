//! Plugin context: what a callback sees about the invocation that triggered it.

use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use agentbase_core::config::plugin::PluginConfig;
use agentbase_core::error::AppError;
use agentbase_core::result::AppResult;

use super::capability::PluginApi;
use crate::catalog::PluginCatalog;
use crate::store::InstallationStore;

/// Who triggered a dispatch and on behalf of which application.
#[derive(Debug, Clone)]
pub struct InvocationScope {
    /// Application the dispatch belongs to.
    pub app_id: String,
    /// Acting user, if any.
    pub user_id: Option<String>,
    /// Cancelled when the triggering request goes away.
    pub cancel: CancellationToken,
}

impl InvocationScope {
    /// Creates a scope with no user and a fresh cancellation token.
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            user_id: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the acting user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Uses `cancel` instead of a fresh token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Context passed to every plugin callback.
///
/// Built per invocation for the plugin that owns the callback, so `config`
/// and `api` always refer to that plugin's own installation.
#[derive(Clone)]
pub struct PluginContext {
    /// Application the callback runs for.
    pub app_id: String,
    /// Acting user, if any.
    pub user_id: Option<String>,
    /// Plugin that owns the callback.
    pub plugin_id: String,
    /// Snapshot of the plugin's settings at the start of the invocation.
    pub config: Map<String, Value>,
    /// Capability-scoped host services.
    pub api: PluginApi,
    cancel: CancellationToken,
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("app_id", &self.app_id)
            .field("user_id", &self.user_id)
            .field("plugin_id", &self.plugin_id)
            .finish_non_exhaustive()
    }
}

impl PluginContext {
    /// Token cancelled when the triggering request is abandoned.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns a setting from the snapshot.
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    /// Returns a string setting.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    /// Returns a boolean setting.
    pub fn setting_bool(&self, key: &str) -> Option<bool> {
        self.config.get(key).and_then(Value::as_bool)
    }

    /// Returns a numeric setting as `f64`.
    pub fn setting_f64(&self, key: &str) -> Option<f64> {
        self.config.get(key).and_then(Value::as_f64)
    }
}

/// Builds a [`PluginContext`] for the plugin that owns a callback.
pub struct ContextFactory {
    store: Arc<dyn InstallationStore>,
    catalog: Arc<PluginCatalog>,
    http: Client,
    config: PluginConfig,
}

impl fmt::Debug for ContextFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFactory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ContextFactory {
    /// Creates a factory sharing one HTTP client across all plugins.
    pub fn new(
        store: Arc<dyn InstallationStore>,
        catalog: Arc<PluginCatalog>,
        config: PluginConfig,
    ) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("agentbase-plugin/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                AppError::with_source(
                    agentbase_core::error::ErrorKind::Configuration,
                    "Failed to build plugin HTTP client",
                    e,
                )
            })?;

        Ok(Self {
            store,
            catalog,
            http,
            config,
        })
    }

    /// Loads the plugin's live installation and package and builds its context.
    pub async fn build(&self, scope: &InvocationScope, plugin_id: &str) -> AppResult<PluginContext> {
        let installation = self
            .store
            .find_live(&scope.app_id, plugin_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Plugin '{plugin_id}' is not installed in application '{}'",
                    scope.app_id
                ))
            })?;

        let package = self
            .catalog
            .get(&installation.plugin_id, &installation.plugin_version)
            .await
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Plugin '{plugin_id}' version {} is not in the catalog",
                    installation.plugin_version
                ))
            })?;

        let config = installation.settings.clone();
        let api = PluginApi::new(
            installation,
            package,
            self.store.clone(),
            self.http.clone(),
            &self.config,
            scope.cancel.clone(),
        );

        Ok(PluginContext {
            app_id: scope.app_id.clone(),
            user_id: scope.user_id.clone(),
            plugin_id: plugin_id.to_string(),
            config,
            api,
            cancel: scope.cancel.clone(),
        })
    }
}
