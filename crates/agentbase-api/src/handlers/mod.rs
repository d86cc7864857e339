//! HTTP request handlers.

pub mod bridge;
pub mod health;
pub mod hooks;
pub mod marketplace;
pub mod plugins;
