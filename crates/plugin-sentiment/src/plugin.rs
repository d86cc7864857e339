//! Package definition for the sentiment plugin.

use agentbase_plugin_sdk::prelude::*;

use crate::analyze::{self, DEFAULT_MAX_TEXT_LENGTH, DEFAULT_MODEL};

/// Plugin name (its id).
pub const PLUGIN_NAME: &str = "custom-api-sentiment";
/// Plugin version.
pub const PLUGIN_VERSION: &str = "1.0.0";

/// Builds the sentiment package.
pub fn plugin() -> PluginPackage {
    create_plugin(PLUGIN_NAME, PLUGIN_VERSION)
        .description("Adds a custom /sentiment API endpoint for text analysis")
        .author("Agentbase Team")
        .permission("platform:api")
        .hook(
            points::APP_INIT,
            hook_fn(|ctx, _args| async move {
                ctx.api.log("Sentiment API plugin initialized", LogLevel::Info);
                Ok(())
            }),
        )
        .route("/sentiment/analyze", analyze::analyze())
        .route("/sentiment/health", analyze::health())
        .filter(points::API_ROUTES, analyze::advertise_routes())
        .setting(
            "maxTextLength",
            SettingField::number("Maximum text length for analysis")
                .with_default(DEFAULT_MAX_TEXT_LENGTH),
        )
        .setting(
            "defaultModel",
            SettingField::string("Preferred AI model for analysis").with_default(DEFAULT_MODEL),
        )
        .on_activate(lifecycle_fn(|ctx| async move {
            ctx.api.log("Sentiment API endpoints registered", LogLevel::Info);
            Ok(())
        }))
        .on_deactivate(lifecycle_fn(|ctx| async move {
            ctx.api.log("Sentiment API endpoints removed", LogLevel::Info);
            Ok(())
        }))
        .build()
}
