// ABOUTME: HTTP request handlers for stage versions and workflow transitions
// ABOUTME: Stage queries plus generate, confirm and the three selection endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use pmstation_core::{Stage, StageType};
use pmstation_workflow::{FeatureSelection, PlatformSelection, SelectionInput};
use tracing::info;

use crate::response::{respond, ApiResult};
use crate::AppState;

pub async fn list_stages(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Vec<Stage>> {
    respond(state.orchestrator.list_stages(&project_id).await)
}

pub async fn get_latest_stage(
    State(state): State<AppState>,
    Path((project_id, stage_type)): Path<(String, StageType)>,
) -> ApiResult<Stage> {
    respond(
        state
            .orchestrator
            .get_latest_stage(&project_id, stage_type)
            .await,
    )
}

pub async fn get_stage_version(
    State(state): State<AppState>,
    Path((project_id, stage_type, version)): Path<(String, StageType, i64)>,
) -> ApiResult<Stage> {
    respond(
        state
            .orchestrator
            .get_stage_version(&project_id, stage_type, version)
            .await,
    )
}

pub async fn generate_stage(
    State(state): State<AppState>,
    Path((project_id, stage_type)): Path<(String, StageType)>,
) -> ApiResult<Stage> {
    info!(project_id = %project_id, stage = %stage_type, "Generate requested");
    respond(state.orchestrator.generate(&project_id, stage_type).await)
}

pub async fn confirm_stage(
    State(state): State<AppState>,
    Path((project_id, stage_type)): Path<(String, StageType)>,
) -> ApiResult<Stage> {
    respond(state.orchestrator.confirm(&project_id, stage_type).await)
}

pub async fn select_option(
    State(state): State<AppState>,
    Path((project_id, stage_type)): Path<(String, StageType)>,
    Json(input): Json<SelectionInput>,
) -> ApiResult<Stage> {
    respond(
        state
            .orchestrator
            .select(&project_id, stage_type, input)
            .await,
    )
}

pub async fn select_features(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(selection): Json<FeatureSelection>,
) -> ApiResult<Stage> {
    respond(
        state
            .orchestrator
            .select_features(&project_id, selection)
            .await,
    )
}

pub async fn select_platform(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(selection): Json<PlatformSelection>,
) -> ApiResult<Stage> {
    respond(
        state
            .orchestrator
            .select_platform(&project_id, selection)
            .await,
    )
}
