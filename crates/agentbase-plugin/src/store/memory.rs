//! In-process installation store.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use agentbase_core::error::AppError;
use agentbase_core::result::AppResult;

use super::InstallationStore;
use crate::installation::{Installation, InstallationState};

/// Installation store backed by a vector in memory; records keep insertion order.
#[derive(Debug, Default)]
pub struct MemoryInstallationStore {
    records: RwLock<Vec<Installation>>,
}

impl MemoryInstallationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstallationStore for MemoryInstallationStore {
    async fn insert(&self, installation: &Installation) -> AppResult<()> {
        let mut records = self.records.write().await;

        let exists = records.iter().any(|r| {
            r.state.is_live()
                && r.app_id == installation.app_id
                && r.plugin_id == installation.plugin_id
        });
        if exists {
            return Err(AppError::conflict(format!(
                "Plugin '{}' is already installed in application '{}'",
                installation.plugin_id, installation.app_id
            )));
        }

        records.push(installation.clone());
        Ok(())
    }

    async fn find_live(&self, app_id: &str, plugin_id: &str) -> AppResult<Option<Installation>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.state.is_live() && r.app_id == app_id && r.plugin_id == plugin_id)
            .cloned())
    }

    async fn save_lifecycle(&self, installation: &Installation) -> AppResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == installation.id)
            .ok_or_else(|| {
                AppError::not_found(format!("Installation {} not found", installation.id))
            })?;

        record.state = installation.state;
        record.activated_at = installation.activated_at;
        record.deactivated_at = installation.deactivated_at;
        record.uninstalled_at = installation.uninstalled_at;
        record.updated_at = installation.updated_at;
        Ok(())
    }

    async fn merge_settings(&self, id: Uuid, values: &Map<String, Value>) -> AppResult<Installation> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id && r.state.is_live())
            .ok_or_else(|| AppError::not_found(format!("Installation {id} not found")))?;

        for (key, value) in values {
            record.settings.insert(key.clone(), value.clone());
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn list_by_app(&self, app_id: &str) -> AppResult<Vec<Installation>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.state.is_live() && r.app_id == app_id)
            .cloned()
            .collect())
    }

    async fn list_by_state(&self, state: InstallationState) -> AppResult<Vec<Installation>> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| r.state == state).cloned().collect())
    }

    async fn history(&self, app_id: &str, plugin_id: &str) -> AppResult<Vec<Installation>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.app_id == app_id && r.plugin_id == plugin_id)
            .cloned()
            .collect())
    }
}
