//! # agentbase-api
//!
//! HTTP API layer for Agentbase built on Axum.
//!
//! Provides the plugin management endpoints, registry and route listings,
//! the bridge that forwards `/plugin-api/*` requests to plugin route
//! handlers, middleware (CORS, logging), extractors, DTOs and error mapping.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::run_server;
pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
