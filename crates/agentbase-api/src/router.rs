//! Route definitions for the Agentbase HTTP API.
//!
//! All routes are organized by domain and mounted under `/api`.

use axum::{
    Router, middleware as axum_middleware,
    routing::{any, get, put},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::middleware::cors::build_cors_layer;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(health_routes())
        .merge(marketplace_routes())
        .merge(plugin_routes())
        .merge(registry_routes())
        .merge(bridge_routes());

    let cors = build_cors_layer(&state.config.server.cors);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

fn marketplace_routes() -> Router<AppState> {
    Router::new()
        .route("/marketplace", get(handlers::marketplace::list_marketplace))
        .route("/marketplace/{name}", get(handlers::marketplace::get_package))
        .route(
            "/marketplace/{name}/deprecate",
            put(handlers::marketplace::deprecate),
        )
}

/// Installation and lifecycle management per application.
fn plugin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/applications/{app_id}/plugins",
            get(handlers::plugins::list_installed).post(handlers::plugins::install),
        )
        .route(
            "/applications/{app_id}/plugins/{plugin_id}",
            get(handlers::plugins::get_installation).delete(handlers::plugins::uninstall),
        )
        .route(
            "/applications/{app_id}/plugins/{plugin_id}/history",
            get(handlers::plugins::history),
        )
        .route(
            "/applications/{app_id}/plugins/{plugin_id}/activate",
            put(handlers::plugins::activate),
        )
        .route(
            "/applications/{app_id}/plugins/{plugin_id}/deactivate",
            put(handlers::plugins::deactivate),
        )
        .route(
            "/applications/{app_id}/plugins/{plugin_id}/settings",
            put(handlers::plugins::update_settings),
        )
        .route(
            "/applications/{app_id}/plugins/{plugin_id}/settings/{key}",
            put(handlers::plugins::update_setting),
        )
}

fn registry_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/applications/{app_id}/hooks",
            get(handlers::hooks::registered_hooks),
        )
        .route(
            "/applications/{app_id}/plugin-routes",
            get(handlers::hooks::plugin_routes),
        )
}

fn bridge_routes() -> Router<AppState> {
    Router::new().route(
        "/applications/{app_id}/plugin-api/{*subpath}",
        any(handlers::bridge::forward),
    )
}
