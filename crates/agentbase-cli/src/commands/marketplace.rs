//! Marketplace commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use agentbase_core::error::AppError;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

/// Arguments for marketplace commands
#[derive(Debug, Args)]
pub struct MarketplaceArgs {
    /// Marketplace subcommand
    #[command(subcommand)]
    pub command: MarketplaceCommand,
}

/// Marketplace subcommands
#[derive(Debug, Subcommand)]
pub enum MarketplaceCommand {
    /// List marketplace plugins (latest version of each)
    List {
        /// Only show plugins with this status (published, deprecated)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show a plugin's manifest and settings schema
    Show {
        /// Plugin name
        name: String,
    },
    /// Deprecate a plugin so it can no longer be installed
    Deprecate {
        /// Plugin name
        name: String,
    },
}

/// Marketplace display row
#[derive(Debug, Serialize, Tabled)]
struct PackageRow {
    /// Name
    name: String,
    /// Version
    version: String,
    /// Status
    status: String,
    /// Author
    author: String,
    /// Permissions
    permissions: String,
    /// Description
    description: String,
}

/// Execute marketplace commands
pub async fn execute(
    args: &MarketplaceArgs,
    client: &ApiClient,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        MarketplaceCommand::List { status } => {
            let path = match status {
                Some(status) => format!("/marketplace?status={status}"),
                None => "/marketplace".to_string(),
            };
            let data = client.get(&path).await?;
            let rows: Vec<PackageRow> = data
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .map(|m| PackageRow {
                            name: super::cell(&m["name"]),
                            version: super::cell(&m["version"]),
                            status: super::cell(&m["status"]),
                            author: super::cell(&m["author"]),
                            permissions: m["permissions"]
                                .as_array()
                                .map(|p| p.iter().map(super::cell).collect::<Vec<_>>().join(", "))
                                .unwrap_or_default(),
                            description: super::cell(&m["description"]),
                        })
                        .collect()
                })
                .unwrap_or_default();

            output::print_list(&rows, format);
        }
        MarketplaceCommand::Show { name } => {
            let data = client.get(&format!("/marketplace/{name}")).await?;
            output::print_json(&data);
        }
        MarketplaceCommand::Deprecate { name } => {
            client
                .put(&format!("/marketplace/{name}/deprecate"), None::<&serde_json::Value>)
                .await?;
            output::print_success(&format!("Plugin '{name}' deprecated"));
        }
    }
    Ok(())
}
