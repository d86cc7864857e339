//! Registry inspection handlers.

use axum::Json;
use axum::extract::{Path, State};

use agentbase_plugin::hooks::registry::RegistrySummary;
use agentbase_plugin::{InvocationScope, RouteDescriptor};

use crate::dto::response::ApiResponse;
use crate::extractors::Actor;
use crate::state::AppState;

/// GET /api/applications/{app_id}/hooks
pub async fn registered_hooks(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
) -> Json<ApiResponse<RegistrySummary>> {
    Json(ApiResponse::ok(state.runtime.registry().summary(&app_id)))
}

/// GET /api/applications/{app_id}/plugin-routes
///
/// Runs the `api:routes` filter of the application's active plugins.
pub async fn plugin_routes(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
    Actor(user_id): Actor,
) -> Json<ApiResponse<Vec<RouteDescriptor>>> {
    let mut scope = InvocationScope::new(app_id);
    if let Some(user_id) = user_id {
        scope = scope.with_user(user_id);
    }

    Json(ApiResponse::ok(state.runtime.bridge().routes(&scope).await))
}
