// ABOUTME: Project persistence with soft delete
// ABOUTME: Creating a project also writes its completed idea stage in the same transaction

use chrono::Utc;
use pmstation_core::{
    generate_id, generate_project_id, Project, ProjectStatus, ProjectWithStages, StageStatus,
    StageType,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::stages::StageStorage;
use crate::{Result, StorageError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub idea: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
}

/// Storage layer for projects
#[derive(Clone)]
pub struct ProjectStorage {
    pool: SqlitePool,
}

impl ProjectStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a project at the idea stage together with its idea record (v1, completed)
    pub async fn create_project(&self, input: NewProject) -> Result<ProjectWithStages> {
        if input.title.trim().is_empty() {
            return Err(StorageError::InvalidInput("title must not be empty".into()));
        }
        if input.idea.trim().is_empty() {
            return Err(StorageError::InvalidInput("idea must not be empty".into()));
        }

        let project_id = generate_project_id();
        let stage_id = generate_id(16);
        let now = Utc::now();
        let idea_input = serde_json::json!({ "content": input.idea });

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO projects (id, owner_id, title, description, status, current_stage, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&project_id)
        .bind(&input.owner_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(ProjectStatus::Active)
        .bind(StageType::Idea)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO stages (id, project_id, stage_type, status, input_data, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(&stage_id)
        .bind(&project_id)
        .bind(StageType::Idea)
        .bind(StageStatus::Completed)
        .bind(serde_json::to_string(&idea_input)?)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(project_id = %project_id, owner_id = %input.owner_id, "Created project");

        self.get_project_with_stages(&project_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("project {}", project_id)))
    }

    /// Fetch a project that has not been deleted
    pub async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>(
            "SELECT * FROM projects WHERE id = ? AND status != 'deleted'",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(project)
    }

    pub async fn get_project_with_stages(&self, id: &str) -> Result<Option<ProjectWithStages>> {
        let Some(project) = self.get_project(id).await? else {
            return Ok(None);
        };
        let stages = StageStorage::new(self.pool.clone())
            .list_stages(id)
            .await?;
        Ok(Some(ProjectWithStages { project, stages }))
    }

    /// Projects owned by `owner_id`, most recently updated first, excluding deleted ones
    pub async fn list_projects(&self, owner_id: &str) -> Result<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT * FROM projects
            WHERE owner_id = ? AND status != 'deleted'
            ORDER BY updated_at DESC, rowid DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }

    pub async fn update_project(&self, id: &str, update: ProjectUpdate) -> Result<Project> {
        let existing = self
            .get_project(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("project {}", id)))?;

        let title = update.title.unwrap_or(existing.title);
        if title.trim().is_empty() {
            return Err(StorageError::InvalidInput("title must not be empty".into()));
        }
        let description = update.description.or(existing.description);
        let status = update.status.unwrap_or(existing.status);

        sqlx::query(
            "UPDATE projects SET title = ?, description = ?, status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&title)
        .bind(&description)
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        debug!(project_id = %id, status = %status, "Updated project");

        self.fetch_any(id).await
    }

    /// Move the project's workflow pointer
    pub async fn set_current_stage(&self, id: &str, stage: StageType) -> Result<()> {
        let result =
            sqlx::query("UPDATE projects SET current_stage = ?, updated_at = ? WHERE id = ?")
                .bind(stage)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("project {}", id)));
        }
        debug!(project_id = %id, stage = %stage, "Advanced current stage");
        Ok(())
    }

    /// Soft delete: the row and its stages stay in place with status `deleted`
    pub async fn delete_project(&self, id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE projects SET status = 'deleted', updated_at = ? WHERE id = ? AND status != 'deleted'",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("project {}", id)));
        }
        info!(project_id = %id, "Soft-deleted project");
        Ok(())
    }

    async fn fetch_any(&self, id: &str) -> Result<Project> {
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("project {}", id)))
    }
}
