//! Callbacks registered by the Hello World plugin.

use std::sync::Arc;

use agentbase_plugin_sdk::prelude::*;

/// Longest message prefix written to the log.
const PREVIEW_CHARS: usize = 50;

/// `app:init`: announces the plugin.
pub fn on_app_init() -> Arc<dyn Callback> {
    hook_fn(|ctx, _args| async move {
        ctx.api.log("Hello World plugin initialized!", LogLevel::Info);
        Ok(())
    })
}

/// `conversation:beforeMessage`: logs a preview of the incoming message.
///
/// Expects `args[0]` to be a message object with a `content` string.
pub fn on_before_message() -> Arc<dyn Callback> {
    hook_fn(|ctx, args| async move {
        if ctx.setting_bool("enabled") == Some(false) {
            return Ok(());
        }
        let content = args
            .first()
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let preview: String = content.chars().take(PREVIEW_CHARS).collect();
        ctx.api
            .log(&format!("Processing message: {preview}..."), LogLevel::Info);
        Ok(())
    })
}

/// `response:modify`: returns the response unchanged.
pub fn modify_response() -> Arc<dyn Callback> {
    filter_fn(|_ctx, response, _args| async move { Ok(response) })
}

/// Logs activation.
pub fn on_activate() -> Arc<dyn Callback> {
    lifecycle_fn(|ctx| async move {
        ctx.api.log("Hello World plugin activated!", LogLevel::Info);
        Ok(())
    })
}

/// Logs deactivation.
pub fn on_deactivate() -> Arc<dyn Callback> {
    lifecycle_fn(|ctx| async move {
        ctx.api.log("Hello World plugin deactivated", LogLevel::Info);
        Ok(())
    })
}
