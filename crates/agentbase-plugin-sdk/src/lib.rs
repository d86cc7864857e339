//! # agentbase-plugin-sdk
//!
//! SDK for developing Agentbase plugins.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agentbase_plugin_sdk::prelude::*;
//!
//! pub fn plugin() -> PluginPackage {
//!     create_plugin("my-plugin", "1.0.0")
//!         .description("A sample plugin")
//!         .hook(points::APP_INIT, hook_fn(|ctx, _args| async move {
//!             ctx.api.log("ready", LogLevel::Info);
//!             Ok(())
//!         }))
//!         .filter(points::RESPONSE_MODIFY, filter_fn(|_ctx, value, _args| async move {
//!             Ok(value)
//!         }))
//!         .setting("enabled", SettingField::boolean("Enabled").with_default(true))
//!         .build()
//! }
//! ```

use serde::Serialize;
use serde_json::{Value, json};

use agentbase_plugin::manifest::{PluginBuilder, PluginPackage};

/// Prelude for convenient imports.
pub mod prelude {
    pub use async_trait::async_trait;

    pub use agentbase_plugin::bridge::BridgeRequest;
    pub use agentbase_plugin::prelude::*;

    pub use crate::{create_plugin, respond, route_descriptor};
}

/// Starts describing a plugin.
pub fn create_plugin(name: impl Into<String>, version: impl Into<String>) -> PluginBuilder {
    PluginPackage::builder(name, version)
}

/// Builds the `{status, body}` value a route handler returns to set the HTTP status.
pub fn respond(status: u16, body: impl Serialize) -> Value {
    let body = serde_json::to_value(body).unwrap_or(Value::Null);
    json!({ "status": status, "body": body })
}

/// Builds an entry for the `api:routes` filter.
pub fn route_descriptor(method: &str, path: &str, description: &str, plugin: &str) -> Value {
    json!({
        "method": method,
        "path": path,
        "description": description,
        "plugin": plugin,
    })
}
