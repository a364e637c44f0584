// ABOUTME: Workflow preconditions shared by the orchestrator and the demo pipeline
// ABOUTME: Project existence and the prerequisite-stage status rule

use pmstation_core::{Project, Stage, StageStatus, StageType};
use pmstation_storage::{ProjectStorage, StageStorage};

use crate::error::{Result, WorkflowError};

pub(crate) async fn require_project(projects: &ProjectStorage, project_id: &str) -> Result<Project> {
    projects
        .get_project(project_id)
        .await?
        .ok_or_else(|| WorkflowError::ProjectNotFound(project_id.to_string()))
}

pub(crate) async fn require_latest(
    stages: &StageStorage,
    project_id: &str,
    stage_type: StageType,
) -> Result<Stage> {
    stages
        .get_latest(project_id, stage_type)
        .await?
        .ok_or(WorkflowError::StageNotFound(stage_type))
}

/// Latest version of `stage_type` with exactly `status`
pub(crate) async fn require_latest_in(
    stages: &StageStorage,
    project_id: &str,
    stage_type: StageType,
    status: StageStatus,
) -> Result<Stage> {
    let stage = require_latest(stages, project_id, stage_type).await?;
    if stage.status != status {
        return Err(WorkflowError::Precondition(format!(
            "latest {} version is {}, expected {}",
            stage_type, stage.status, status
        )));
    }
    Ok(stage)
}

/// A stage may be generated once its prerequisite's latest version is completed or confirmed
pub(crate) async fn ensure_can_generate(
    stages: &StageStorage,
    project_id: &str,
    stage_type: StageType,
) -> Result<()> {
    match stage_type {
        StageType::Idea => {
            return Err(WorkflowError::Precondition(
                "the idea stage is created together with the project".to_string(),
            ))
        }
        StageType::Platform => {
            return Err(WorkflowError::Precondition(
                "platforms are chosen through the platform selection endpoint".to_string(),
            ))
        }
        _ => {}
    }

    let Some(prerequisite) = stage_type.prerequisite() else {
        return Ok(());
    };

    match stages.get_latest(project_id, prerequisite).await? {
        Some(stage) if stage.status.is_settled() => Ok(()),
        Some(stage) => Err(WorkflowError::Precondition(format!(
            "{} must be completed or confirmed before generating {} (latest version is {})",
            prerequisite, stage_type, stage.status
        ))),
        None => Err(WorkflowError::Precondition(format!(
            "{} must be completed or confirmed before generating {}",
            prerequisite, stage_type
        ))),
    }
}
