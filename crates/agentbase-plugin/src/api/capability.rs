//! Host services available to plugins, gated by the capabilities a
//! plugin declares in its manifest.
//!
//! - Relative URLs (`/api/...`) target the platform itself and need `platform:api`.
//!   Under `/api/applications/` only the calling application's own
//!   `plugin-api` routes are reachable.
//! - Absolute URLs need `network` or `network:<host>`.
//!
//! Identity headers (`x-user-id`, `x-agentbase-*`, credentials) supplied by
//! the plugin are dropped; the host sets its own `x-agentbase-*` headers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use agentbase_core::config::plugin::PluginConfig;
use agentbase_core::error::{AppError, ErrorKind};
use agentbase_core::result::AppResult;

use crate::installation::Installation;
use crate::manifest::{PluginManifest, PluginPackage};
use crate::store::InstallationStore;

/// Capability names understood by the host.
pub mod capabilities {
    /// Call the platform's own HTTP API through relative URLs.
    pub const PLATFORM_API: &str = "platform:api";
    /// Call any external host.
    pub const NETWORK: &str = "network";
    /// Prefix for host-scoped network access (`network:example.com`).
    pub const NETWORK_HOST_PREFIX: &str = "network:";
}

/// Header names a plugin may not set on outbound requests.
const RESERVED_HEADERS: &[&str] = &["x-user-id", "authorization", "cookie", "host"];

/// Prefix of the headers the host stamps on every outbound request.
const HOST_HEADER_PREFIX: &str = "x-agentbase-";

/// Returns whether `name` is a header only the host may set.
pub fn is_reserved_header(name: &str) -> bool {
    let name = name.trim().to_ascii_lowercase();
    name.starts_with(HOST_HEADER_PREFIX) || RESERVED_HEADERS.contains(&name.as_str())
}

/// Severity for [`PluginApi::log`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug output.
    Debug,
    /// Informational.
    #[default]
    Info,
    /// Warning.
    Warn,
    /// Error.
    Error,
}

/// An outbound HTTP request issued by a plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundRequest {
    /// HTTP method; defaults to `GET`.
    #[serde(default = "default_method")]
    pub method: String,
    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// JSON body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Default for OutboundRequest {
    fn default() -> Self {
        Self::get()
    }
}

impl OutboundRequest {
    /// A bodiless GET.
    pub fn get() -> Self {
        Self {
            method: default_method(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// A POST with a JSON body.
    pub fn post(body: Value) -> Self {
        Self {
            method: "POST".to_string(),
            headers: BTreeMap::new(),
            body: Some(body),
        }
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Response to an [`OutboundRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundResponse {
    /// HTTP status code.
    pub status: u16,
    /// Parsed JSON body, or the raw text as a JSON string if it was not JSON.
    pub body: Value,
}

impl OutboundResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Resolves `url` and checks that the manifest grants the needed capability.
///
/// `app_id` is the application the plugin runs in; platform URLs scoped to
/// any application are limited to that application's `plugin-api` routes.
pub fn authorize_url(
    manifest: &PluginManifest,
    app_id: &str,
    url: &str,
    platform_base_url: &str,
) -> AppResult<Url> {
    if url.starts_with('/') {
        if !manifest.has_permission(capabilities::PLATFORM_API) {
            return Err(missing_capability(manifest, capabilities::PLATFORM_API));
        }
        let base = Url::parse(platform_base_url).map_err(|e| {
            AppError::configuration(format!(
                "Invalid platform base URL '{platform_base_url}': {e}"
            ))
        })?;
        let resolved = base
            .join(url)
            .map_err(|e| AppError::validation(format!("Invalid request URL '{url}': {e}")))?;
        if resolved.origin() != base.origin() {
            return Err(AppError::validation(format!(
                "Relative request URL '{url}' must stay on the platform"
            )));
        }
        if !platform_path_allowed(resolved.path(), app_id) {
            return Err(AppError::permission(format!(
                "Plugin '{}' may not call '{}'",
                manifest.name,
                resolved.path()
            )));
        }
        return Ok(resolved);
    }

    let parsed = Url::parse(url)
        .map_err(|e| AppError::validation(format!("Invalid request URL '{url}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::validation(format!(
            "Unsupported URL scheme '{}'",
            parsed.scheme()
        )));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::validation(format!("Request URL '{url}' has no host")))?;

    let scoped = format!("{}{host}", capabilities::NETWORK_HOST_PREFIX);
    if manifest.has_permission(capabilities::NETWORK) || manifest.has_permission(&scoped) {
        Ok(parsed)
    } else {
        Err(missing_capability(manifest, &scoped))
    }
}

/// Application-scoped platform paths are open to plugins only as
/// `/api/applications/{own app}/plugin-api/...`.
fn platform_path_allowed(path: &str, app_id: &str) -> bool {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let scoped = segments
        .iter()
        .take(2)
        .map(|s| s.to_ascii_lowercase())
        .eq(["api", "applications"]);
    if !scoped && !segments.iter().take(2).any(|s| s.contains('%')) {
        return true;
    }

    matches!(
        segments.as_slice(),
        ["api", "applications", app, "plugin-api", _, ..] if *app == app_id
    )
}

fn missing_capability(manifest: &PluginManifest, capability: &str) -> AppError {
    AppError::permission(format!(
        "Plugin '{}' did not declare capability '{capability}'",
        manifest.name
    ))
}

struct ApiInner {
    installation: Installation,
    package: Arc<PluginPackage>,
    settings: RwLock<Map<String, Value>>,
    store: Arc<dyn InstallationStore>,
    http: Client,
    platform_base_url: String,
    outbound_timeout: Duration,
    cancel: CancellationToken,
}

/// Capability-scoped API for one plugin installation.
#[derive(Clone)]
pub struct PluginApi {
    inner: Arc<ApiInner>,
}

impl fmt::Debug for PluginApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginApi")
            .field("app_id", &self.inner.installation.app_id)
            .field("plugin_id", &self.inner.installation.plugin_id)
            .finish_non_exhaustive()
    }
}

impl PluginApi {
    pub(crate) fn new(
        installation: Installation,
        package: Arc<PluginPackage>,
        store: Arc<dyn InstallationStore>,
        http: Client,
        config: &PluginConfig,
        cancel: CancellationToken,
    ) -> Self {
        let settings = RwLock::new(installation.settings.clone());
        Self {
            inner: Arc::new(ApiInner {
                installation,
                package,
                settings,
                store,
                http,
                platform_base_url: config.platform_base_url.clone(),
                outbound_timeout: config.outbound_timeout(),
                cancel,
            }),
        }
    }

    fn app_id(&self) -> &str {
        &self.inner.installation.app_id
    }

    fn plugin_id(&self) -> &str {
        &self.inner.installation.plugin_id
    }

    /// Reads one of this plugin's settings.
    pub async fn get_config(&self, key: &str) -> Option<Value> {
        self.inner.settings.read().await.get(key).cloned()
    }

    /// Validates and persists one of this plugin's settings.
    ///
    /// Later `get_config` calls through this API observe the new value.
    pub async fn set_config(&self, key: &str, value: Value) -> AppResult<()> {
        self.inner
            .package
            .definition
            .settings
            .validate_value(key, &value)?;

        let mut values = Map::new();
        values.insert(key.to_string(), value);
        let updated = self
            .inner
            .store
            .merge_settings(self.inner.installation.id, &values)
            .await?;

        *self.inner.settings.write().await = updated.settings;
        debug!(
            app_id = %self.app_id(),
            plugin_id = %self.plugin_id(),
            key = %key,
            "Plugin updated its setting"
        );
        Ok(())
    }

    /// Issues an HTTP request on behalf of the plugin.
    ///
    /// Fails with `Permission` before any network activity if the plugin
    /// lacks the capability for the target, and with `Cancelled` if the
    /// triggering request goes away first.
    pub async fn make_request(&self, url: &str, request: OutboundRequest) -> AppResult<OutboundResponse> {
        let target = authorize_url(
            &self.inner.package.manifest,
            self.app_id(),
            url,
            &self.inner.platform_base_url,
        )?;

        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| AppError::validation(format!("Invalid HTTP method '{}'", request.method)))?;

        let mut builder = self
            .inner
            .http
            .request(method, target.clone())
            .timeout(self.inner.outbound_timeout)
            .header("x-agentbase-app", self.app_id())
            .header("x-agentbase-plugin", self.plugin_id());
        for (name, value) in &request.headers {
            if is_reserved_header(name) {
                warn!(
                    app_id = %self.app_id(),
                    plugin_id = %self.plugin_id(),
                    header = %name,
                    "Dropping reserved header from plugin request"
                );
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(
            app_id = %self.app_id(),
            plugin_id = %self.plugin_id(),
            url = %target,
            "Plugin outbound request"
        );

        let send = async {
            let response = builder.send().await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::ExternalService,
                    format!("Request to '{target}' failed"),
                    e,
                )
            })?;
            let status = response.status().as_u16();
            let bytes = response.bytes().await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::ExternalService,
                    format!("Reading response from '{target}' failed"),
                    e,
                )
            })?;
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes)
                    .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            };
            Ok(OutboundResponse { status, body })
        };

        tokio::select! {
            _ = self.inner.cancel.cancelled() => Err(AppError::cancelled(format!(
                "Request to '{target}' cancelled"
            ))),
            result = send => result,
        }
    }

    /// Writes a log line attributed to the plugin and application.
    pub fn log(&self, message: &str, level: LogLevel) {
        let app_id = self.app_id();
        let plugin_id = self.plugin_id();
        match level {
            LogLevel::Debug => debug!(app_id = %app_id, plugin_id = %plugin_id, "{message}"),
            LogLevel::Info => info!(app_id = %app_id, plugin_id = %plugin_id, "{message}"),
            LogLevel::Warn => warn!(app_id = %app_id, plugin_id = %plugin_id, "{message}"),
            LogLevel::Error => error!(app_id = %app_id, plugin_id = %plugin_id, "{message}"),
        }
    }
}
