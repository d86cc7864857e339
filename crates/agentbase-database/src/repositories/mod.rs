//! Repository implementations.

pub mod installation;

pub use installation::PgInstallationStore;
