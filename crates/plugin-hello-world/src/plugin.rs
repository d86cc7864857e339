//! Package definition for the Hello World plugin.

use agentbase_plugin_sdk::prelude::*;

use crate::hooks;

/// Plugin name (its id).
pub const PLUGIN_NAME: &str = "hello-world";
/// Plugin version.
pub const PLUGIN_VERSION: &str = "1.0.0";

/// Builds the Hello World package.
pub fn plugin() -> PluginPackage {
    create_plugin(PLUGIN_NAME, PLUGIN_VERSION)
        .description("A minimal example plugin for Agentbase")
        .author("Agentbase Team")
        .hook(points::APP_INIT, hooks::on_app_init())
        .hook(points::CONVERSATION_BEFORE_MESSAGE, hooks::on_before_message())
        .filter(points::RESPONSE_MODIFY, hooks::modify_response())
        .setting(
            "greeting",
            SettingField::string("Custom Greeting").with_default("Hello from the plugin!"),
        )
        .setting("enabled", SettingField::boolean("Enable Greeting").with_default(true))
        .on_activate(hooks::on_activate())
        .on_deactivate(hooks::on_deactivate())
        .build()
}
