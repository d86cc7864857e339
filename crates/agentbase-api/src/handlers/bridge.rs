//! Forwards `/plugin-api/*` requests to plugin route handlers.

use std::collections::BTreeMap;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;

use agentbase_core::error::AppError;
use agentbase_plugin::{BridgeRequest, InvocationScope};

use crate::error::ApiError;
use crate::extractors::Actor;
use crate::state::AppState;

/// ANY /api/applications/{app_id}/plugin-api/{*subpath}
///
/// If the client disconnects, the handler future is dropped and the drop
/// guard cancels the scope, which aborts the plugin's outbound requests.
pub async fn forward(
    State(state): State<AppState>,
    Path((app_id, subpath)): Path<(String, String)>,
    Query(query): Query<BTreeMap<String, String>>,
    Actor(user_id): Actor,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let body = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::validation(format!("Request body is not valid JSON: {e}")))?
    };

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let mut scope = InvocationScope::new(app_id).with_cancellation(cancel);
    if let Some(user_id) = user_id {
        scope = scope.with_user(user_id);
    }

    let request = BridgeRequest {
        method: method.as_str().to_uppercase(),
        path: subpath,
        query,
        headers: forwarded_headers(&headers),
        body,
    };

    let response = state.runtime.bridge().handle(&scope, request).await;
    guard.disarm();

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status == StatusCode::NO_CONTENT || response.body.is_null() {
        return Ok(status.into_response());
    }
    Ok((status, Json(response.body)).into_response())
}

fn forwarded_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| !matches!(name.as_str(), "authorization" | "cookie"))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}
