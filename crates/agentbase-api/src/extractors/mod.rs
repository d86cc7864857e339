//! Custom Axum extractors.

pub mod actor;

pub use actor::{Actor, RequiredActor};
