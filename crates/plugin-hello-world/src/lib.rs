//! Hello World plugin for Agentbase.
//!
//! A minimal plugin showing the plugin structure: two actions, one
//! pass-through filter, two settings and lifecycle callbacks.

pub mod hooks;
pub mod plugin;

pub use plugin::{PLUGIN_NAME, PLUGIN_VERSION, plugin};
