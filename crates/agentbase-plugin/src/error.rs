//! Errors raised by plugin callbacks.

use std::time::Duration;

use thiserror::Error;

use agentbase_core::error::AppError;

/// Failure of a single hook, filter, route or lifecycle callback.
///
/// Never propagated to the host operation that triggered dispatch; the
/// dispatcher logs it together with the owning plugin and extension point.
#[derive(Debug, Clone, Error)]
pub enum CallbackError {
    /// The plugin reported a failure.
    #[error("{0}")]
    Failed(String),
    /// The callback did not finish within the configured bound.
    #[error("callback timed out after {0:?}")]
    Timeout(Duration),
    /// A host service used by the callback failed (permission, store, outbound call).
    #[error(transparent)]
    Host(#[from] AppError),
}

impl CallbackError {
    /// Creates a plugin-reported failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Returns true if the callback was cut off by the timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<serde_json::Error> for CallbackError {
    fn from(err: serde_json::Error) -> Self {
        Self::Host(AppError::from(err))
    }
}
