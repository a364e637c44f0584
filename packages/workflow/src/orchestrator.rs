// ABOUTME: Stage orchestrator enforcing the fixed workflow order and stage status machine
// ABOUTME: Generates, confirms and records selections; failed generations leave no version behind

use std::sync::Arc;

use pmstation_ai::GatewayRegistry;
use pmstation_core::{Project, ProjectWithStages, Stage, StageStatus, StageType};
use pmstation_prompts::PromptManager;
use pmstation_storage::{
    NewProject, NewStage, ProjectStorage, ProjectUpdate, SqlitePool, StageStorage,
};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::agents::{AgentDeps, AgentRegistry};
use crate::demo::DemoPipeline;
use crate::error::{Result, WorkflowError};
use crate::guards;
use crate::types::{
    Direction, FeatureSelection, PlatformSelection, Selection, SelectionInput, StagePayload,
};

pub struct StageOrchestrator {
    projects: ProjectStorage,
    stages: StageStorage,
    agents: AgentRegistry,
    demo: DemoPipeline,
}

impl StageOrchestrator {
    pub fn new(pool: SqlitePool, prompts: Arc<PromptManager>, gateways: GatewayRegistry) -> Self {
        let deps = AgentDeps::new(StageStorage::new(pool.clone()), prompts, gateways);
        let agents = AgentRegistry::standard(&deps);
        Self::with_agents(ProjectStorage::new(pool), deps, agents)
    }

    /// Orchestrator using a caller-supplied agent set
    pub fn with_agents(projects: ProjectStorage, deps: AgentDeps, agents: AgentRegistry) -> Self {
        Self {
            stages: deps.stages.clone(),
            demo: DemoPipeline::new(deps, projects.clone()),
            projects,
            agents,
        }
    }

    pub fn demo(&self) -> &DemoPipeline {
        &self.demo
    }

    pub async fn create_project(&self, input: NewProject) -> Result<ProjectWithStages> {
        let project = self.projects.create_project(input).await?;
        info!(project_id = %project.project.id, "Project created");
        Ok(project)
    }

    pub async fn get_project(&self, project_id: &str) -> Result<ProjectWithStages> {
        self.projects
            .get_project_with_stages(project_id)
            .await?
            .ok_or_else(|| WorkflowError::ProjectNotFound(project_id.to_string()))
    }

    pub async fn list_projects(&self, owner_id: &str) -> Result<Vec<Project>> {
        Ok(self.projects.list_projects(owner_id).await?)
    }

    pub async fn update_project(&self, project_id: &str, update: ProjectUpdate) -> Result<Project> {
        guards::require_project(&self.projects, project_id).await?;
        Ok(self.projects.update_project(project_id, update).await?)
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<()> {
        guards::require_project(&self.projects, project_id).await?;
        self.projects.delete_project(project_id).await?;
        info!(project_id = %project_id, "Project deleted");
        Ok(())
    }

    pub async fn list_stages(&self, project_id: &str) -> Result<Vec<Stage>> {
        guards::require_project(&self.projects, project_id).await?;
        Ok(self.stages.list_stages(project_id).await?)
    }

    pub async fn get_latest_stage(&self, project_id: &str, stage_type: StageType) -> Result<Stage> {
        guards::require_project(&self.projects, project_id).await?;
        guards::require_latest(&self.stages, project_id, stage_type).await
    }

    pub async fn get_stage_version(
        &self,
        project_id: &str,
        stage_type: StageType,
        version: i64,
    ) -> Result<Stage> {
        guards::require_project(&self.projects, project_id).await?;
        self.stages
            .get_version(project_id, stage_type, version)
            .await?
            .ok_or(WorkflowError::StageNotFound(stage_type))
    }

    /// Generate a new version of `stage_type`.
    ///
    /// The version is created as `generating` and becomes `completed` with
    /// the agent's document. If the agent fails the version is deleted and
    /// the error is returned unchanged.
    pub async fn generate(&self, project_id: &str, stage_type: StageType) -> Result<Stage> {
        guards::require_project(&self.projects, project_id).await?;
        guards::ensure_can_generate(&self.stages, project_id, stage_type).await?;
        let agent = self.agents.get(stage_type).ok_or_else(|| {
            WorkflowError::Precondition(format!("no agent generates {}", stage_type))
        })?;

        let version = self
            .stages
            .create_version(NewStage::new(
                project_id,
                stage_type,
                StageStatus::Generating,
            ))
            .await?;
        info!(
            project_id = %project_id,
            stage = %stage_type,
            version = version.version,
            "Stage generation started"
        );

        let document = match agent.generate(project_id).await {
            Ok(payload) if payload.stage_type() == stage_type => payload.to_document(),
            Ok(payload) => Err(WorkflowError::Generation(format!(
                "{} agent returned a {} document",
                stage_type,
                payload.stage_type()
            ))),
            Err(e) => Err(e),
        };
        let document = match document {
            Ok(document) => document,
            Err(e) => {
                self.discard(project_id, stage_type, &version.id, &e).await;
                return Err(e);
            }
        };

        let stage = match self
            .stages
            .update_output(&version.id, &document, Some(StageStatus::Completed))
            .await
        {
            Ok(stage) => stage,
            Err(e) => {
                let e = WorkflowError::from(e);
                self.discard(project_id, stage_type, &version.id, &e).await;
                return Err(e);
            }
        };

        if !stage_type.is_auxiliary() {
            self.projects.set_current_stage(project_id, stage_type).await?;
        }
        info!(
            project_id = %project_id,
            stage = %stage_type,
            version = stage.version,
            "Stage generation completed"
        );
        Ok(stage)
    }

    /// Confirm the latest version, which must be `completed`
    pub async fn confirm(&self, project_id: &str, stage_type: StageType) -> Result<Stage> {
        guards::require_project(&self.projects, project_id).await?;
        let latest = guards::require_latest_in(
            &self.stages,
            project_id,
            stage_type,
            StageStatus::Completed,
        )
        .await?;

        let stage = self
            .stages
            .update_status(&latest.id, StageStatus::Confirmed)
            .await?;
        self.advance(project_id, stage_type).await?;
        info!(project_id = %project_id, stage = %stage_type, version = stage.version, "Stage confirmed");
        Ok(stage)
    }

    /// Record a choice on the latest `completed` version and confirm it.
    ///
    /// A single id picks a direction, stored whole as the selected option; an
    /// id list is stored as `{"selected_ids": [...]}`.
    pub async fn select(
        &self,
        project_id: &str,
        stage_type: StageType,
        input: SelectionInput,
    ) -> Result<Stage> {
        let selection = input.into_selection()?;
        guards::require_project(&self.projects, project_id).await?;
        let latest = guards::require_latest_in(
            &self.stages,
            project_id,
            stage_type,
            StageStatus::Completed,
        )
        .await?;

        let selected = match selection {
            Selection::Single(id) => find_direction(latest.output_data.as_ref(), id)?,
            Selection::Many(ids) => json!({ "selected_ids": ids }),
        };

        let stage = self
            .stages
            .update_selection(&latest.id, &selected, StageStatus::Confirmed)
            .await?;
        self.advance(project_id, stage_type).await?;
        info!(project_id = %project_id, stage = %stage_type, version = stage.version, "Selection recorded");
        Ok(stage)
    }

    /// Choose the features to carry into the demo and prototype
    pub async fn select_features(
        &self,
        project_id: &str,
        selection: FeatureSelection,
    ) -> Result<Stage> {
        self.select(
            project_id,
            StageType::Features,
            SelectionInput {
                selected_id: None,
                selected_ids: Some(selection.selected_ids),
            },
        )
        .await
    }

    /// Record target platforms as a new confirmed platform version
    pub async fn select_platform(
        &self,
        project_id: &str,
        selection: PlatformSelection,
    ) -> Result<Stage> {
        selection.validate()?;
        guards::require_project(&self.projects, project_id).await?;

        match self.stages.get_latest(project_id, StageType::Direction).await? {
            Some(direction) if direction.status == StageStatus::Confirmed => {}
            _ => {
                return Err(WorkflowError::Precondition(
                    "direction must be confirmed before choosing platforms".to_string(),
                ))
            }
        }

        let document = StagePayload::Platform(selection).to_document()?;
        let mut new = NewStage::new(project_id, StageType::Platform, StageStatus::Confirmed);
        new.output_data = Some(document.clone());
        new.selected_option = Some(document);

        let stage = self.stages.create_version(new).await?;
        self.advance(project_id, StageType::Platform).await?;
        info!(project_id = %project_id, version = stage.version, "Platforms selected");
        Ok(stage)
    }

    /// Move the project pointer past `stage_type`; terminal and auxiliary stages stay put
    async fn advance(&self, project_id: &str, stage_type: StageType) -> Result<()> {
        if let Some(next) = stage_type.next() {
            self.projects.set_current_stage(project_id, next).await?;
        }
        Ok(())
    }

    async fn discard(
        &self,
        project_id: &str,
        stage_type: StageType,
        stage_id: &str,
        cause: &WorkflowError,
    ) {
        error!(
            project_id = %project_id,
            stage = %stage_type,
            error = %cause,
            "Stage generation failed, discarding version"
        );
        if let Err(e) = self.stages.delete_stage(stage_id).await {
            warn!(project_id = %project_id, stage_id = %stage_id, error = %e, "Failed to discard stage version");
        }
    }
}

/// The direction object with `id` from a `{"directions": [...]}` document
fn find_direction(output: Option<&Value>, id: i64) -> Result<Value> {
    let directions = output
        .and_then(|o| o.get("directions"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            WorkflowError::InvalidSelection(
                "selected_id requires a stage with a directions list".to_string(),
            )
        })?;

    directions
        .iter()
        .find(|candidate| {
            serde_json::from_value::<Direction>((*candidate).clone())
                .ok()
                .and_then(|d| d.id)
                == Some(id)
        })
        .cloned()
        .ok_or_else(|| WorkflowError::InvalidSelection(format!("direction {} does not exist", id)))
}
