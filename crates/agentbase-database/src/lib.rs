//! # agentbase-database
//!
//! PostgreSQL connection management and the persistent implementation of
//! the plugin installation store.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::PgInstallationStore;
