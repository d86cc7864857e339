//! The API surface handed to plugin callbacks.

pub mod capability;
pub mod context;

pub use capability::{LogLevel, OutboundRequest, OutboundResponse, PluginApi};
pub use context::{ContextFactory, InvocationScope, PluginContext};
