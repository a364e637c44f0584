// ABOUTME: HTTP request handlers for project lifecycle operations
// ABOUTME: Create with an idea, list by owner, read with stages, update and soft delete

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use pmstation_core::{Project, ProjectWithStages};
use pmstation_storage::{NewProject, ProjectUpdate};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::response::{respond, ApiError, ApiResponse, ApiResult};
use crate::AppState;

/// Liveness check
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "pmstation"
    }))
}

/// Request body for creating a project
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub idea: String,
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProjectWithStages>>), ApiError> {
    if request.idea.trim().is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_input",
            "idea must not be empty",
        ));
    }
    if request.owner_id.trim().is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_input",
            "ownerId must not be empty",
        ));
    }
    info!(owner_id = %request.owner_id, "Creating project");

    let project = state
        .orchestrator
        .create_project(NewProject {
            owner_id: request.owner_id,
            title: request.title,
            description: request.description,
            idea: request.idea,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(project))))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProjectsQuery {
    pub owner_id: String,
}

pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListProjectsQuery>,
) -> ApiResult<Vec<Project>> {
    respond(state.orchestrator.list_projects(&query.owner_id).await)
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<ProjectWithStages> {
    respond(state.orchestrator.get_project(&project_id).await)
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(update): Json<ProjectUpdate>,
) -> ApiResult<Project> {
    info!(project_id = %project_id, "Updating project");
    respond(state.orchestrator.update_project(&project_id, update).await)
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Value> {
    info!(project_id = %project_id, "Deleting project");
    respond(
        state
            .orchestrator
            .delete_project(&project_id)
            .await
            .map(|()| json!({ "id": project_id, "deleted": true })),
    )
}
