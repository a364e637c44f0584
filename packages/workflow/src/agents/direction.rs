// ABOUTME: Direction agent proposing several product directions for an idea
// ABOUTME: High-temperature structured call; every returned direction carries an integer id

use async_trait::async_trait;
use pmstation_core::StageType;
use tracing::info;

use super::{AgentDeps, StageAgent, DIRECTION_PROFILE};
use crate::error::Result;
use crate::normalize::normalize_directions;
use crate::types::StagePayload;

pub struct DirectionAgent {
    deps: AgentDeps,
}

impl DirectionAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StageAgent for DirectionAgent {
    fn stage_type(&self) -> StageType {
        StageType::Direction
    }

    async fn generate(&self, project_id: &str) -> Result<StagePayload> {
        let context = self.deps.context(project_id).await?;
        let idea = context.idea()?;

        let request = self
            .deps
            .request("direction", &[("idea", &idea)], DIRECTION_PROFILE)?;
        let raw = self
            .deps
            .gateway(DIRECTION_PROFILE)
            .generate_structured(request)
            .await?;

        let output = normalize_directions(raw)?;
        info!(
            project_id = %project_id,
            count = output.directions.len(),
            "Generated directions"
        );
        Ok(StagePayload::Direction(output))
    }
}
