//! Caller identity taken from the `x-user-id` header.
//!
//! Authentication happens upstream of this service; the gateway forwards
//! the authenticated user id in the header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use agentbase_core::error::AppError;

use crate::error::ApiError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

fn user_id(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Optional caller identity.
#[derive(Debug, Clone, Default)]
pub struct Actor(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(user_id(parts)))
    }
}

/// Caller identity that must be present; rejects with 401 otherwise.
#[derive(Debug, Clone)]
pub struct RequiredActor(pub String);

impl std::ops::Deref for RequiredActor {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequiredActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_id(parts)
            .map(Self)
            .ok_or_else(|| AppError::unauthorized("Missing x-user-id header").into())
    }
}
