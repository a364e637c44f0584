// ABOUTME: Versioned stage persistence
// ABOUTME: Each regeneration inserts a new version; JSON payloads are stored as TEXT documents

use chrono::{DateTime, Utc};
use pmstation_core::{generate_id, Stage, StageStatus, StageType};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::{Result, StorageError};

/// Fields for a new stage version; the version number is assigned on insert
#[derive(Debug, Clone)]
pub struct NewStage {
    pub project_id: String,
    pub stage_type: StageType,
    pub status: StageStatus,
    pub input_data: Option<Value>,
    pub output_data: Option<Value>,
    pub selected_option: Option<Value>,
}

impl NewStage {
    pub fn new(project_id: impl Into<String>, stage_type: StageType, status: StageStatus) -> Self {
        Self {
            project_id: project_id.into(),
            stage_type,
            status,
            input_data: None,
            output_data: None,
            selected_option: None,
        }
    }
}

/// Storage layer for stage versions
#[derive(Clone)]
pub struct StageStorage {
    pool: SqlitePool,
}

impl StageStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert `new` as version max+1 for its (project, type)
    pub async fn create_version(&self, new: NewStage) -> Result<Stage> {
        let id = generate_id(16);
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO stages (id, project_id, stage_type, status, input_data, output_data, selected_option, version, created_at, updated_at)
            SELECT ?, ?, ?, ?, ?, ?, ?, COALESCE(MAX(version), 0) + 1, ?, ?
            FROM stages WHERE project_id = ? AND stage_type = ?
            "#,
        )
        .bind(&id)
        .bind(&new.project_id)
        .bind(new.stage_type)
        .bind(new.status)
        .bind(to_json_text(&new.input_data)?)
        .bind(to_json_text(&new.output_data)?)
        .bind(to_json_text(&new.selected_option)?)
        .bind(now)
        .bind(now)
        .bind(&new.project_id)
        .bind(new.stage_type)
        .execute(&self.pool)
        .await?;

        let stage = self
            .get_stage(&id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("stage {}", id)))?;

        debug!(
            project_id = %stage.project_id,
            stage = %stage.stage_type,
            version = stage.version,
            status = %stage.status,
            "Created stage version"
        );
        Ok(stage)
    }

    pub async fn get_stage(&self, id: &str) -> Result<Option<Stage>> {
        let row = sqlx::query("SELECT * FROM stages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_stage).transpose()
    }

    /// Highest version for (project, type)
    pub async fn get_latest(&self, project_id: &str, stage_type: StageType) -> Result<Option<Stage>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM stages
            WHERE project_id = ? AND stage_type = ?
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(project_id)
        .bind(stage_type)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_stage).transpose()
    }

    pub async fn get_version(
        &self,
        project_id: &str,
        stage_type: StageType,
        version: i64,
    ) -> Result<Option<Stage>> {
        let row = sqlx::query(
            "SELECT * FROM stages WHERE project_id = ? AND stage_type = ? AND version = ?",
        )
        .bind(project_id)
        .bind(stage_type)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_stage).transpose()
    }

    /// Every version of every stage, in creation order
    pub async fn list_stages(&self, project_id: &str) -> Result<Vec<Stage>> {
        let rows = sqlx::query(
            "SELECT * FROM stages WHERE project_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_stage).collect()
    }

    pub async fn update_status(&self, id: &str, status: StageStatus) -> Result<Stage> {
        let result = sqlx::query("UPDATE stages SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.after_update(id, result.rows_affected()).await
    }

    /// Replace the output document, optionally changing status in the same write
    pub async fn update_output(
        &self,
        id: &str,
        output: &Value,
        status: Option<StageStatus>,
    ) -> Result<Stage> {
        let result = sqlx::query(
            r#"
            UPDATE stages
            SET output_data = ?, status = COALESCE(?, status), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(serde_json::to_string(output)?)
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.after_update(id, result.rows_affected()).await
    }

    /// Record the user's choice and set status
    pub async fn update_selection(
        &self,
        id: &str,
        selected: &Value,
        status: StageStatus,
    ) -> Result<Stage> {
        let result = sqlx::query(
            "UPDATE stages SET selected_option = ?, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(serde_json::to_string(selected)?)
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        self.after_update(id, result.rows_affected()).await
    }

    /// Remove a single version (used to discard failed generations)
    pub async fn delete_stage(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM stages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        debug!(stage_id = %id, "Deleted stage version");
        Ok(())
    }

    async fn after_update(&self, id: &str, rows_affected: u64) -> Result<Stage> {
        if rows_affected == 0 {
            return Err(StorageError::NotFound(format!("stage {}", id)));
        }
        self.get_stage(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("stage {}", id)))
    }
}

fn to_json_text(value: &Option<Value>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(StorageError::from)
}

fn from_json_text(text: Option<String>) -> Result<Option<Value>> {
    text.map(|t| serde_json::from_str(&t))
        .transpose()
        .map_err(StorageError::from)
}

/// Convert a database row to a Stage
fn row_to_stage(row: &SqliteRow) -> Result<Stage> {
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(Stage {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        stage_type: row.try_get("stage_type")?,
        status: row.try_get("status")?,
        input_data: from_json_text(row.try_get("input_data")?)?,
        output_data: from_json_text(row.try_get("output_data")?)?,
        selected_option: from_json_text(row.try_get("selected_option")?)?,
        version: row.try_get("version")?,
        created_at,
        updated_at,
    })
}
