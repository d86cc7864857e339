//! Plugin management commands for one application.

use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};
use tabled::Tabled;

use agentbase_core::error::AppError;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

/// Arguments for plugin commands
#[derive(Debug, Args)]
pub struct PluginsArgs {
    /// Application id
    #[arg(short, long)]
    pub app: String,

    /// Plugin subcommand
    #[command(subcommand)]
    pub command: PluginCommand,
}

/// Plugin subcommands
#[derive(Debug, Subcommand)]
pub enum PluginCommand {
    /// List installed plugins
    List,
    /// Install a plugin from the marketplace
    Install {
        /// Plugin name
        plugin: String,
        /// Exact version (latest when omitted)
        #[arg(long)]
        version: Option<String>,
    },
    /// Show one installation
    Show {
        /// Plugin name
        plugin: String,
    },
    /// Show every installation record, including uninstalled ones
    History {
        /// Plugin name
        plugin: String,
    },
    /// Activate an installed plugin
    Activate {
        /// Plugin name
        plugin: String,
    },
    /// Deactivate an active plugin
    Deactivate {
        /// Plugin name
        plugin: String,
    },
    /// Uninstall a plugin
    Uninstall {
        /// Plugin name
        plugin: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Update a setting; the value is parsed as JSON, falling back to a string
    Set {
        /// Plugin name
        plugin: String,
        /// Setting key
        key: String,
        /// New value
        value: String,
    },
}

/// Installation display row
#[derive(Debug, Serialize, Tabled)]
struct InstallationRow {
    /// Plugin name
    plugin: String,
    /// Version
    version: String,
    /// State
    state: String,
    /// Installed by
    installed_by: String,
    /// Installed at
    installed_at: String,
}

impl From<&Value> for InstallationRow {
    fn from(v: &Value) -> Self {
        Self {
            plugin: super::cell(&v["plugin_id"]),
            version: super::cell(&v["version"]),
            state: super::cell(&v["state"]),
            installed_by: super::cell(&v["installed_by"]),
            installed_at: super::cell(&v["installed_at"]),
        }
    }
}

/// Parses a setting value typed on the command line.
pub fn parse_setting_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Execute plugin commands
pub async fn execute(
    args: &PluginsArgs,
    client: &ApiClient,
    format: OutputFormat,
) -> Result<(), AppError> {
    let base = format!("/applications/{}/plugins", args.app);

    match &args.command {
        PluginCommand::List => {
            let data = client.get(&base).await?;
            print_installations(&data, format);
        }
        PluginCommand::Install { plugin, version } => {
            let data = client
                .post(&base, &json!({ "plugin": plugin, "version": version }))
                .await?;
            report(&data, format, &format!("Installed '{plugin}'"));
        }
        PluginCommand::Show { plugin } => {
            let data = client.get(&format!("{base}/{plugin}")).await?;
            output::print_json(&data);
        }
        PluginCommand::History { plugin } => {
            let data = client.get(&format!("{base}/{plugin}/history")).await?;
            print_installations(&data, format);
        }
        PluginCommand::Activate { plugin } => {
            let data = client
                .put(&format!("{base}/{plugin}/activate"), None::<&Value>)
                .await?;
            report(&data, format, &format!("Activated '{plugin}'"));
        }
        PluginCommand::Deactivate { plugin } => {
            let data = client
                .put(&format!("{base}/{plugin}/deactivate"), None::<&Value>)
                .await?;
            report(&data, format, &format!("Deactivated '{plugin}'"));
        }
        PluginCommand::Uninstall { plugin, yes } => {
            if !yes {
                let confirm = dialoguer::Confirm::new()
                    .with_prompt(format!("Uninstall '{plugin}' from '{}'?", args.app))
                    .default(false)
                    .interact()
                    .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

                if !confirm {
                    output::print_warning("Aborted.");
                    return Ok(());
                }
            }

            let data = client.delete(&format!("{base}/{plugin}")).await?;
            report(&data, format, &format!("Uninstalled '{plugin}'"));
        }
        PluginCommand::Set { plugin, key, value } => {
            let body = json!({ "value": parse_setting_value(value) });
            let data = client
                .put(&format!("{base}/{plugin}/settings/{key}"), Some(&body))
                .await?;
            report(&data, format, &format!("Updated '{key}' of '{plugin}'"));
        }
    }
    Ok(())
}

fn print_installations(data: &Value, format: OutputFormat) {
    let rows: Vec<InstallationRow> = data
        .as_array()
        .map(|items| items.iter().map(InstallationRow::from).collect())
        .unwrap_or_default();
    output::print_list(&rows, format);
}

fn report(data: &Value, format: OutputFormat, message: &str) {
    match format {
        OutputFormat::Json => output::print_json(data),
        OutputFormat::Table => {
            output::print_success(message);
            output::print_kv("State", &super::cell(&data["state"]));
            output::print_kv("Version", &super::cell(&data["version"]));
        }
    }
}
