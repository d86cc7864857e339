//! Agentbase Server: plugin extensibility runtime
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use agentbase_core::config::AppConfig;
use agentbase_core::config::database::StoreBackend;
use agentbase_core::error::AppError;
use agentbase_database::{DatabasePool, PgInstallationStore};
use agentbase_plugin::store::MemoryInstallationStore;
use agentbase_plugin::{InstallationStore, PluginPackage, Runtime};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("AGENTBASE_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

    AppConfig::load(&config_path)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Plugins shipped with the server.
fn bundled_packages() -> Vec<PluginPackage> {
    vec![plugin_hello_world::plugin(), plugin_sentiment::plugin()]
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Agentbase v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Installation store ───────────────────────────────
    let (store, db_pool): (Arc<dyn InstallationStore>, Option<DatabasePool>) =
        match config.database.backend {
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory installation store; state is lost on restart");
                (Arc::new(MemoryInstallationStore::new()), None)
            }
            StoreBackend::Postgres => {
                let pool = DatabasePool::connect(&config.database).await?;
                agentbase_database::migration::run_migrations(pool.pool()).await?;
                let store = Arc::new(PgInstallationStore::new(pool.pool().clone()));
                (store, Some(pool))
            }
        };

    // ── Step 2: Runtime and marketplace ──────────────────────────
    let runtime = Arc::new(Runtime::new(config.plugins.clone(), store)?);

    for package in bundled_packages() {
        let published = runtime.publish(package).await?;
        tracing::info!(
            plugin_id = %published.name(),
            version = %published.version(),
            "Published bundled plugin"
        );
    }

    // ── Step 3: Rebuild the registry from persisted state ────────
    if config.plugins.restore_on_start {
        let report = runtime.restore().await?;
        for key in &report.skipped {
            tracing::warn!(installation = %key, "Active installation has no package; skipped");
        }
        tracing::info!(restored = report.restored, "Plugin registry restored");

        let apps = runtime.boot_applications().await?;
        tracing::info!(applications = apps, "Applications initialized");
    }

    // ── Step 4: HTTP server ──────────────────────────────────────
    agentbase_api::run_server(config, runtime).await?;

    if let Some(pool) = db_pool {
        pool.close().await;
    }

    Ok(())
}
