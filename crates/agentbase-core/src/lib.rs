//! # agentbase-core
//!
//! Core crate for Agentbase. Contains configuration schemas and the
//! unified error system shared by the plugin runtime, the persistence
//! layer and the HTTP API.
//!
//! This crate has **no** internal dependencies on other Agentbase crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
