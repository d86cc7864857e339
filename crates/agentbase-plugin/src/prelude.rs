//! Convenience re-exports for plugin authors.
//!
//! ```rust,ignore
//! use agentbase_plugin::prelude::*;
//! ```

pub use crate::api::capability::{LogLevel, OutboundRequest, OutboundResponse, PluginApi};
pub use crate::api::context::PluginContext;
pub use crate::bridge::RouteDescriptor;
pub use crate::error::CallbackError;
pub use crate::hooks::callback::{Callback, filter_fn, handler_fn, hook_fn, lifecycle_fn};
pub use crate::hooks::definitions::points;
pub use crate::manifest::{PluginBuilder, PluginPackage, SettingField, SettingType};

pub use serde_json::{Value, json};
