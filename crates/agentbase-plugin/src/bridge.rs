//! Dynamic route bridge: forwards requests under an application's plugin
//! API prefix to the active plugin that claimed the subpath.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use crate::api::context::InvocationScope;
use crate::hooks::definitions::{CallbackKind, normalize_subpath, points, route_point};
use crate::hooks::dispatcher::HookDispatcher;
use crate::hooks::registry::HookRegistry;
use crate::manifest::PluginDefinition;

/// A request forwarded to a plugin route handler (serialized as its only argument).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeRequest {
    /// HTTP method, uppercase.
    pub method: String,
    /// Normalized subpath below the plugin API prefix.
    pub path: String,
    /// Query parameters.
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    /// Request headers (lowercase names).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// JSON body, `null` when absent.
    #[serde(default)]
    pub body: Value,
}

/// Response produced by a plugin route handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

impl BridgeResponse {
    fn error(status: u16, code: &str, message: String) -> Self {
        Self {
            status,
            body: json!({ "error": code, "message": message }),
        }
    }

    /// Maps a handler's return value to a response.
    ///
    /// `{status, body}` objects with a valid status are used as is, `null`
    /// becomes 204 and anything else is returned with 200.
    pub fn from_handler_value(value: Value) -> Self {
        if let Value::Object(map) = &value {
            let status = map
                .get("status")
                .and_then(Value::as_u64)
                .filter(|s| (100..=599).contains(s));
            if let Some(status) = status {
                return Self {
                    status: status as u16,
                    body: map.get("body").cloned().unwrap_or(Value::Null),
                };
            }
        }

        match value {
            Value::Null => Self {
                status: 204,
                body: Value::Null,
            },
            other => Self {
                status: 200,
                body: other,
            },
        }
    }
}

/// An entry contributed through the `api:routes` filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    /// HTTP method the route expects.
    pub method: String,
    /// Subpath below the plugin API prefix.
    pub path: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Plugin that serves the route.
    pub plugin: String,
}

/// Routes requests to plugin route handlers through the hook registry.
pub struct RouteBridge {
    registry: Arc<HookRegistry>,
    dispatcher: Arc<HookDispatcher>,
}

impl fmt::Debug for RouteBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBridge").finish_non_exhaustive()
    }
}

impl RouteBridge {
    /// Creates a bridge over the shared registry and dispatcher.
    pub fn new(registry: Arc<HookRegistry>, dispatcher: Arc<HookDispatcher>) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    /// Plugins currently claiming `subpath` in `app_id`, first registrant first.
    pub fn claimants(&self, app_id: &str, subpath: &str) -> Vec<String> {
        self.registry
            .owners(CallbackKind::Action, app_id, &route_point(subpath))
    }

    /// Logs a warning for every route of `definition` that another plugin
    /// already serves in `app_id`. Returns the contested subpaths.
    pub fn flag_duplicate_claims(
        &self,
        app_id: &str,
        plugin_id: &str,
        definition: &PluginDefinition,
    ) -> Vec<String> {
        let mut contested = Vec::new();
        for subpath in definition.routes() {
            let claimants = self.claimants(app_id, subpath);
            if claimants.iter().any(|owner| owner != plugin_id) {
                warn!(
                    app_id = %app_id,
                    plugin_id = %plugin_id,
                    path = %subpath,
                    claimants = ?claimants,
                    "Route claimed by more than one plugin; the first registrant serves it"
                );
                contested.push(normalize_subpath(subpath));
            }
        }
        contested
    }

    /// Serves a bridged request.
    ///
    /// Returns 404 when no active plugin claims the subpath and a generic
    /// 5xx when the handler fails; plugin errors never leak to the caller.
    pub async fn handle(&self, scope: &InvocationScope, mut request: BridgeRequest) -> BridgeResponse {
        request.path = normalize_subpath(&request.path);
        let point = route_point(&request.path);
        let entries = self
            .registry
            .list(CallbackKind::Action, &scope.app_id, &point);

        let Some(entry) = entries.first() else {
            debug!(app_id = %scope.app_id, path = %request.path, "No plugin route matched");
            return BridgeResponse::error(
                404,
                "NOT_FOUND",
                format!("No active plugin serves '{}'", request.path),
            );
        };

        if entries.len() > 1 {
            warn!(
                app_id = %scope.app_id,
                path = %request.path,
                serving = %entry.plugin_id,
                claimants = entries.len(),
                "Multiple plugins claim route; first registrant serves it"
            );
        }

        let args = match serde_json::to_value(&request) {
            Ok(value) => [value],
            Err(e) => {
                error!(error = %e, "Failed to serialize bridged request");
                return BridgeResponse::error(500, "INTERNAL", "Internal server error".to_string());
            }
        };

        match self.dispatcher.invoke(entry, scope, &args).await {
            Ok(value) => BridgeResponse::from_handler_value(value),
            Err(err) => {
                error!(
                    app_id = %scope.app_id,
                    plugin_id = %entry.plugin_id,
                    path = %request.path,
                    error = %err,
                    "Plugin route handler failed"
                );
                if err.is_timeout() {
                    BridgeResponse::error(504, "PLUGIN_TIMEOUT", "Plugin handler timed out".to_string())
                } else {
                    BridgeResponse::error(500, "PLUGIN_ERROR", "Plugin handler failed".to_string())
                }
            }
        }
    }

    /// Collects the route descriptors active plugins advertise via `api:routes`.
    ///
    /// Entries that do not parse as descriptors are skipped.
    pub async fn routes(&self, scope: &InvocationScope) -> Vec<RouteDescriptor> {
        let value = self
            .dispatcher
            .filter(points::API_ROUTES, scope, Value::Array(Vec::new()), &[])
            .await;

        let Value::Array(items) = value else {
            warn!(app_id = %scope.app_id, "api:routes filter did not return a list");
            return Vec::new();
        };

        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<RouteDescriptor>(item) {
                Ok(mut descriptor) => {
                    descriptor.path = normalize_subpath(&descriptor.path);
                    Some(descriptor)
                }
                Err(e) => {
                    warn!(app_id = %scope.app_id, error = %e, "Skipping malformed route descriptor");
                    None
                }
            })
            .collect()
    }
}
