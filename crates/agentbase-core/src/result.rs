//! Convenience result type alias for Agentbase.

use crate::error::AppError;

/// A specialized `Result` type for Agentbase operations.
pub type AppResult<T> = Result<T, AppError>;
