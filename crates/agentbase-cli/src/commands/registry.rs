//! Registry inspection commands.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use agentbase_core::error::AppError;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

/// Arguments for registry commands
#[derive(Debug, Args)]
pub struct RegistryArgs {
    /// Application id
    #[arg(short, long)]
    pub app: String,
}

/// Registered hook row
#[derive(Debug, Serialize, Tabled)]
struct HookRow {
    /// Action or filter
    kind: String,
    /// Extension point
    point: String,
    /// Plugins in execution order
    plugins: String,
}

/// Advertised route row
#[derive(Debug, Serialize, Tabled)]
struct RouteRow {
    /// HTTP method
    method: String,
    /// Path below `plugin-api/`
    path: String,
    /// Serving plugin
    plugin: String,
    /// Description
    description: String,
}

/// Show the hooks registered for an application
pub async fn hooks(
    args: &RegistryArgs,
    client: &ApiClient,
    format: OutputFormat,
) -> Result<(), AppError> {
    let data = client
        .get(&format!("/applications/{}/hooks", args.app))
        .await?;

    let mut rows = Vec::new();
    for kind in ["actions", "filters"] {
        if let Some(points) = data[kind].as_object() {
            for (point, owners) in points {
                let plugins = owners
                    .as_array()
                    .map(|o| o.iter().map(super::cell).collect::<Vec<_>>().join(" → "))
                    .unwrap_or_default();
                rows.push(HookRow {
                    kind: kind.trim_end_matches('s').to_string(),
                    point: point.clone(),
                    plugins,
                });
            }
        }
    }

    output::print_list(&rows, format);
    Ok(())
}

/// Show the plugin API routes advertised for an application
pub async fn routes(
    args: &RegistryArgs,
    client: &ApiClient,
    format: OutputFormat,
) -> Result<(), AppError> {
    let data = client
        .get(&format!("/applications/{}/plugin-routes", args.app))
        .await?;

    let rows: Vec<RouteRow> = data
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|r| RouteRow {
                    method: super::cell(&r["method"]),
                    path: super::cell(&r["path"]),
                    plugin: super::cell(&r["plugin"]),
                    description: super::cell(&r["description"]),
                })
                .collect()
        })
        .unwrap_or_default();

    output::print_list(&rows, format);
    Ok(())
}
