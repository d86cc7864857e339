//! Persistence of installation records.

pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use agentbase_core::result::AppResult;

use crate::installation::{Installation, InstallationState};

pub use memory::MemoryInstallationStore;

/// Durable store of installation records.
///
/// Implementations must enforce at most one live (not uninstalled)
/// record per `(app_id, plugin_id)`.
#[async_trait]
pub trait InstallationStore: Send + Sync {
    /// Inserts a new record. Fails with `Conflict` if a live record
    /// already exists for the same application and plugin.
    async fn insert(&self, installation: &Installation) -> AppResult<()>;

    /// Returns the live record for the pair, if any.
    async fn find_live(&self, app_id: &str, plugin_id: &str) -> AppResult<Option<Installation>>;

    /// Persists the state and lifecycle timestamps of an existing record.
    async fn save_lifecycle(&self, installation: &Installation) -> AppResult<()>;

    /// Merges `values` into the settings of a live record and returns the
    /// updated record. Fails with `NotFound` if the record is not live.
    async fn merge_settings(&self, id: Uuid, values: &Map<String, Value>) -> AppResult<Installation>;

    /// Lists live records of an application in install order.
    async fn list_by_app(&self, app_id: &str) -> AppResult<Vec<Installation>>;

    /// Lists records in `state` across all applications, in install order.
    async fn list_by_state(&self, state: InstallationState) -> AppResult<Vec<Installation>>;

    /// Lists every record ever created for the pair, oldest first.
    async fn history(&self, app_id: &str, plugin_id: &str) -> AppResult<Vec<Installation>>;
}
