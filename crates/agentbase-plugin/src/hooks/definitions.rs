//! Extension point names and callback kinds.
//!
//! Extension points are plain strings so plugins may fire and listen on
//! points the host does not know about. The constants below are the ones
//! the host itself dispatches.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known extension points.
pub mod points {
    // ── Application ──
    /// Fired once per application after active installations are restored.
    pub const APP_INIT: &str = "app:init";

    // ── Conversation ──
    /// Fired before a user message is handed to the model.
    pub const CONVERSATION_BEFORE_MESSAGE: &str = "conversation:beforeMessage";
    /// Fired after the model produced a reply.
    pub const CONVERSATION_AFTER_MESSAGE: &str = "conversation:afterMessage";

    // ── Filters ──
    /// Filter over the outgoing response text.
    pub const RESPONSE_MODIFY: &str = "response:modify";
    /// Filter over the list of plugin route descriptors, seeded with `[]`.
    pub const API_ROUTES: &str = "api:routes";

    // ── Plugin lifecycle ──
    /// Fired after an installation record is created.
    pub const PLUGIN_INSTALLED: &str = "plugin:installed";
    /// Fired after a plugin becomes active.
    pub const PLUGIN_ACTIVATED: &str = "plugin:activated";
    /// Fired after a plugin is deactivated.
    pub const PLUGIN_DEACTIVATED: &str = "plugin:deactivated";
    /// Fired after a plugin is uninstalled.
    pub const PLUGIN_UNINSTALLED: &str = "plugin:uninstalled";

    // ── Route bridge ──
    /// Prefix of the action a plugin registers to serve a bridged subpath.
    pub const API_REQUEST_PREFIX: &str = "api:request:";
}

/// Whether a callback is an action (side effects only) or a filter (value transform).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    /// Fire-and-forget side effect; return value ignored.
    Action,
    /// Transforms a value threaded through the pipeline.
    Filter,
}

impl CallbackKind {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Filter => "filter",
        }
    }
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalizes a bridged subpath: leading `/`, no trailing `/`, no empty segments.
pub fn normalize_subpath(path: &str) -> String {
    let segments: Vec<&str> = path
        .trim()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();
    format!("/{}", segments.join("/"))
}

/// Returns the extension point a plugin registers to serve `subpath`.
pub fn route_point(subpath: &str) -> String {
    format!("{}{}", points::API_REQUEST_PREFIX, normalize_subpath(subpath))
}

/// Returns the subpath served by a route point, or `None` for other points.
pub fn route_subpath(point: &str) -> Option<&str> {
    point.strip_prefix(points::API_REQUEST_PREFIX)
}
