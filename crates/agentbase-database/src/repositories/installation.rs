//! Installation repository: the PostgreSQL [`InstallationStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use agentbase_core::error::{AppError, ErrorKind};
use agentbase_core::result::AppResult;
use agentbase_plugin::installation::{Installation, InstallationState};
use agentbase_plugin::store::InstallationStore;

const COLUMNS: &str = "id, app_id, plugin_id, plugin_version, installed_by, state, settings, \
     installed_at, activated_at, deactivated_at, uninstalled_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct InstallationRow {
    id: Uuid,
    app_id: String,
    plugin_id: String,
    plugin_version: String,
    installed_by: String,
    state: String,
    settings: Json<Map<String, Value>>,
    installed_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
    deactivated_at: Option<DateTime<Utc>>,
    uninstalled_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InstallationRow> for Installation {
    type Error = AppError;

    fn try_from(row: InstallationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            app_id: row.app_id,
            plugin_id: row.plugin_id,
            plugin_version: row.plugin_version,
            installed_by: row.installed_by,
            state: row.state.parse()?,
            settings: row.settings.0,
            installed_at: row.installed_at,
            activated_at: row.activated_at,
            deactivated_at: row.deactivated_at,
            uninstalled_at: row.uninstalled_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_installations(rows: Vec<InstallationRow>) -> AppResult<Vec<Installation>> {
    rows.into_iter().map(Installation::try_from).collect()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Installation store backed by the `plugin_installations` table.
#[derive(Debug, Clone)]
pub struct PgInstallationStore {
    pool: PgPool,
}

impl PgInstallationStore {
    /// Create a new installation repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstallationStore for PgInstallationStore {
    async fn insert(&self, installation: &Installation) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO plugin_installations ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(installation.id)
        .bind(&installation.app_id)
        .bind(&installation.plugin_id)
        .bind(&installation.plugin_version)
        .bind(&installation.installed_by)
        .bind(installation.state.as_str())
        .bind(Json(&installation.settings))
        .bind(installation.installed_at)
        .bind(installation.activated_at)
        .bind(installation.deactivated_at)
        .bind(installation.uninstalled_at)
        .bind(installation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::conflict(format!(
                    "Plugin '{}' is already installed in application '{}'",
                    installation.plugin_id, installation.app_id
                ))
            } else {
                AppError::with_source(ErrorKind::Database, "Failed to insert installation", e)
            }
        })?;
        Ok(())
    }

    async fn find_live(&self, app_id: &str, plugin_id: &str) -> AppResult<Option<Installation>> {
        let row = sqlx::query_as::<_, InstallationRow>(&format!(
            "SELECT {COLUMNS} FROM plugin_installations \
             WHERE app_id = $1 AND plugin_id = $2 AND state <> 'uninstalled'"
        ))
        .bind(app_id)
        .bind(plugin_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find installation", e))?;

        row.map(Installation::try_from).transpose()
    }

    async fn save_lifecycle(&self, installation: &Installation) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE plugin_installations \
             SET state = $2, activated_at = $3, deactivated_at = $4, uninstalled_at = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(installation.id)
        .bind(installation.state.as_str())
        .bind(installation.activated_at)
        .bind(installation.deactivated_at)
        .bind(installation.uninstalled_at)
        .bind(installation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update installation state", e)
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "Installation {} not found",
                installation.id
            )));
        }
        Ok(())
    }

    async fn merge_settings(&self, id: Uuid, values: &Map<String, Value>) -> AppResult<Installation> {
        let row = sqlx::query_as::<_, InstallationRow>(&format!(
            "UPDATE plugin_installations \
             SET settings = settings || $2, updated_at = NOW() \
             WHERE id = $1 AND state <> 'uninstalled' \
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(Json(values))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update installation settings", e)
        })?;

        row.ok_or_else(|| AppError::not_found(format!("Installation {id} not found")))?
            .try_into()
    }

    async fn list_by_app(&self, app_id: &str) -> AppResult<Vec<Installation>> {
        let rows = sqlx::query_as::<_, InstallationRow>(&format!(
            "SELECT {COLUMNS} FROM plugin_installations \
             WHERE app_id = $1 AND state <> 'uninstalled' \
             ORDER BY installed_at ASC"
        ))
        .bind(app_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list installations", e))?;

        into_installations(rows)
    }

    async fn list_by_state(&self, state: InstallationState) -> AppResult<Vec<Installation>> {
        let rows = sqlx::query_as::<_, InstallationRow>(&format!(
            "SELECT {COLUMNS} FROM plugin_installations \
             WHERE state = $1 \
             ORDER BY installed_at ASC"
        ))
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list installations by state", e)
        })?;

        into_installations(rows)
    }

    async fn history(&self, app_id: &str, plugin_id: &str) -> AppResult<Vec<Installation>> {
        let rows = sqlx::query_as::<_, InstallationRow>(&format!(
            "SELECT {COLUMNS} FROM plugin_installations \
             WHERE app_id = $1 AND plugin_id = $2 \
             ORDER BY installed_at ASC"
        ))
        .bind(app_id)
        .bind(plugin_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to load installation history", e)
        })?;

        into_installations(rows)
    }
}
