//! Marketplace handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use tracing::info;

use agentbase_plugin::{CatalogListing, PackageStatus};

use crate::dto::request::MarketplaceQuery;
use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::RequiredActor;
use crate::state::AppState;

/// GET /api/marketplace?status=published|deprecated
pub async fn list_marketplace(
    State(state): State<AppState>,
    Query(query): Query<MarketplaceQuery>,
) -> Result<Json<ApiResponse<Vec<CatalogListing>>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<PackageStatus>)
        .transpose()?;

    Ok(Json(ApiResponse::ok(
        state.runtime.catalog().list_marketplace(status).await,
    )))
}

/// GET /api/marketplace/{name}
///
/// Returns the latest manifest, the marketplace status and the settings
/// schema of a package.
pub async fn get_package(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let catalog = state.runtime.catalog();
    let package = catalog.resolve(&name, None).await?;
    let status = catalog.status(&name).await.unwrap_or_default();

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "manifest": package.manifest,
            "status": status,
            "settings": package.definition.settings,
        }
    })))
}

/// PUT /api/marketplace/{name}/deprecate
pub async fn deprecate(
    State(state): State<AppState>,
    Path(name): Path<String>,
    actor: RequiredActor,
) -> Result<Json<ApiResponse<CatalogListing>>, ApiError> {
    let listing = state.runtime.catalog().deprecate(&name).await?;
    info!(plugin_id = %name, user_id = %actor.0, "Marketplace plugin deprecated");
    Ok(Json(ApiResponse::ok(listing)))
}
