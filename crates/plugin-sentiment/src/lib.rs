//! Sentiment analysis plugin for Agentbase.
//!
//! Serves two endpoints through the route bridge:
//!
//! - `POST /sentiment/analyze`: asks the platform's AI conversation API
//!   to classify a text.
//! - `GET /sentiment/health`: static health payload.
//!
//! Both are advertised through the `api:routes` filter.

pub mod analyze;
pub mod plugin;

pub use plugin::{PLUGIN_NAME, PLUGIN_VERSION, plugin};
