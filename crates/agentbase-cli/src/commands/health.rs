//! Server health command.

use agentbase_core::error::AppError;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

/// Execute the health command
pub async fn execute(client: &ApiClient, format: OutputFormat) -> Result<(), AppError> {
    let data = client.get("/health").await?;

    match format {
        OutputFormat::Json => output::print_json(&data),
        OutputFormat::Table => {
            output::print_kv("Status", &super::cell(&data["status"]));
            output::print_kv("Version", &super::cell(&data["version"]));
            output::print_kv("Marketplace plugins", &super::cell(&data["marketplace_plugins"]));
        }
    }
    Ok(())
}
