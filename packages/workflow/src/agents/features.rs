// ABOUTME: Features agent designing the feature-module tree for the chosen direction
// ABOUTME: Needs the selected direction and platform; ids are assigned in pre-order

use async_trait::async_trait;
use pmstation_core::StageType;
use tracing::info;

use super::{AgentDeps, StageAgent, FEATURES_PROFILE};
use crate::error::Result;
use crate::normalize::normalize_features;
use crate::types::StagePayload;

pub struct FeaturesAgent {
    deps: AgentDeps,
}

impl FeaturesAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StageAgent for FeaturesAgent {
    fn stage_type(&self) -> StageType {
        StageType::Features
    }

    async fn generate(&self, project_id: &str) -> Result<StagePayload> {
        let context = self.deps.context(project_id).await?;
        let idea = context.idea()?;
        let direction = context.selected_direction()?;
        let platform = context.platform_selection()?;

        let platforms = platform.labels();
        let pc_type = platform.pc_role();
        let mobile_type = platform.mobile_role();

        let request = self.deps.request(
            "features",
            &[
                ("idea", &idea),
                ("direction_title", &direction.title),
                (
                    "direction_positioning",
                    direction.positioning.as_deref().unwrap_or(""),
                ),
                ("target_users", direction.target_users.as_deref().unwrap_or("")),
                (
                    "value_proposition",
                    direction.value_proposition.as_deref().unwrap_or(""),
                ),
                ("platforms", &platforms),
                ("pc_type", &pc_type),
                ("mobile_type", &mobile_type),
            ],
            FEATURES_PROFILE,
        )?;
        let raw = self
            .deps
            .gateway(FEATURES_PROFILE)
            .generate_structured(request)
            .await?;

        let output = normalize_features(raw)?;
        info!(
            project_id = %project_id,
            modules = output.modules.len(),
            "Generated feature modules"
        );
        Ok(StagePayload::Features(output))
    }
}
