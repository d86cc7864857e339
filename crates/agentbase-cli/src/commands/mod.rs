//! CLI command definitions and dispatch.

pub mod health;
pub mod marketplace;
pub mod plugins;
pub mod registry;

use clap::{Parser, Subcommand};

use agentbase_core::error::AppError;

use crate::client::ApiClient;
use crate::output::OutputFormat;

/// Agentbase: plugin management client
#[derive(Debug, Parser)]
#[command(name = "agentbase", version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the Agentbase server
    #[arg(short, long, env = "AGENTBASE_SERVER", default_value = "http://127.0.0.1:8080")]
    pub server: String,

    /// User id sent as `x-user-id`
    #[arg(short, long, env = "AGENTBASE_USER")]
    pub user: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check server health
    Health,
    /// Browse published plugins
    Marketplace(marketplace::MarketplaceArgs),
    /// Manage the plugins of an application
    Plugins(plugins::PluginsArgs),
    /// Show registered hooks of an application
    Hooks(registry::RegistryArgs),
    /// Show custom API routes advertised by an application's plugins
    Routes(registry::RegistryArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let client = ApiClient::new(&self.server, self.user.clone())?;

        match &self.command {
            Commands::Health => health::execute(&client, self.format).await,
            Commands::Marketplace(args) => marketplace::execute(args, &client, self.format).await,
            Commands::Plugins(args) => plugins::execute(args, &client, self.format).await,
            Commands::Hooks(args) => registry::hooks(args, &client, self.format).await,
            Commands::Routes(args) => registry::routes(args, &client, self.format).await,
        }
    }
}

/// Helper: render a JSON scalar or structure for a table cell
pub fn cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
