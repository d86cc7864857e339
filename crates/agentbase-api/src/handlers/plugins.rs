//! Plugin installation and lifecycle handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use validator::Validate;

use agentbase_core::error::AppError;

use crate::dto::request::{InstallPluginRequest, UpdateSettingRequest, UpdateSettingsRequest};
use crate::dto::response::{ApiResponse, InstallationResponse};
use crate::error::ApiError;
use crate::extractors::RequiredActor;
use crate::state::AppState;

type InstallationJson = Json<ApiResponse<InstallationResponse>>;

/// GET /api/applications/{app_id}/plugins
pub async fn list_installed(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<InstallationResponse>>>, ApiError> {
    let installations = state.runtime.manager().list_installed(&app_id).await?;
    let items: Vec<InstallationResponse> =
        installations.into_iter().map(InstallationResponse::from).collect();
    Ok(Json(ApiResponse::ok(items)))
}

/// POST /api/applications/{app_id}/plugins
pub async fn install(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
    actor: RequiredActor,
    Json(req): Json<InstallPluginRequest>,
) -> Result<(StatusCode, InstallationJson), ApiError> {
    req.validate()?;

    let installation = state
        .runtime
        .manager()
        .install_from_catalog(&app_id, &actor, &req.plugin, req.version.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(installation.into())),
    ))
}

/// GET /api/applications/{app_id}/plugins/{plugin_id}
pub async fn get_installation(
    State(state): State<AppState>,
    Path((app_id, plugin_id)): Path<(String, String)>,
) -> Result<InstallationJson, ApiError> {
    let installation = state.runtime.manager().get(&app_id, &plugin_id).await?;
    Ok(Json(ApiResponse::ok(installation.into())))
}

/// GET /api/applications/{app_id}/plugins/{plugin_id}/history
pub async fn history(
    State(state): State<AppState>,
    Path((app_id, plugin_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Vec<InstallationResponse>>>, ApiError> {
    let records = state.runtime.manager().history(&app_id, &plugin_id).await?;
    let items: Vec<InstallationResponse> =
        records.into_iter().map(InstallationResponse::from).collect();
    Ok(Json(ApiResponse::ok(items)))
}

/// PUT /api/applications/{app_id}/plugins/{plugin_id}/activate
pub async fn activate(
    State(state): State<AppState>,
    Path((app_id, plugin_id)): Path<(String, String)>,
) -> Result<InstallationJson, ApiError> {
    let installation = state.runtime.manager().activate(&app_id, &plugin_id).await?;
    Ok(Json(ApiResponse::ok(installation.into())))
}

/// PUT /api/applications/{app_id}/plugins/{plugin_id}/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    Path((app_id, plugin_id)): Path<(String, String)>,
) -> Result<InstallationJson, ApiError> {
    let installation = state
        .runtime
        .manager()
        .deactivate(&app_id, &plugin_id)
        .await?;
    Ok(Json(ApiResponse::ok(installation.into())))
}

/// DELETE /api/applications/{app_id}/plugins/{plugin_id}
pub async fn uninstall(
    State(state): State<AppState>,
    Path((app_id, plugin_id)): Path<(String, String)>,
) -> Result<InstallationJson, ApiError> {
    let installation = state
        .runtime
        .manager()
        .uninstall(&app_id, &plugin_id)
        .await?;
    Ok(Json(ApiResponse::ok(installation.into())))
}

/// PUT /api/applications/{app_id}/plugins/{plugin_id}/settings
pub async fn update_settings(
    State(state): State<AppState>,
    Path((app_id, plugin_id)): Path<(String, String)>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<InstallationJson, ApiError> {
    if req.settings.is_empty() {
        return Err(AppError::validation("At least one setting is required").into());
    }

    let installation = state
        .runtime
        .manager()
        .update_settings(&app_id, &plugin_id, req.settings)
        .await?;
    Ok(Json(ApiResponse::ok(installation.into())))
}

/// PUT /api/applications/{app_id}/plugins/{plugin_id}/settings/{key}
pub async fn update_setting(
    State(state): State<AppState>,
    Path((app_id, plugin_id, key)): Path<(String, String, String)>,
    Json(req): Json<UpdateSettingRequest>,
) -> Result<InstallationJson, ApiError> {
    let installation = state
        .runtime
        .manager()
        .set_setting(&app_id, &plugin_id, &key, req.value)
        .await?;
    Ok(Json(ApiResponse::ok(installation.into())))
}
