// ABOUTME: PRD agent writing the long-form requirements document
// ABOUTME: Combines the direction, full feature outline and any prototype screens

use async_trait::async_trait;
use pmstation_core::StageType;
use tracing::info;

use super::{AgentDeps, StageAgent, PRD_PROFILE};
use crate::error::Result;
use crate::feature_tree::format_outline;
use crate::normalize::normalize_prd;
use crate::types::{Screen, StagePayload};

pub struct PrdAgent {
    deps: AgentDeps,
}

impl PrdAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StageAgent for PrdAgent {
    fn stage_type(&self) -> StageType {
        StageType::Prd
    }

    async fn generate(&self, project_id: &str) -> Result<StagePayload> {
        let context = self.deps.context(project_id).await?;
        let idea = context.idea()?;
        let direction = context.selected_direction()?;
        let features = context.features()?;
        let screens = context.prototype_screens()?;

        let modules = format_outline(&features.modules);
        let screens = format_screens(&screens);

        let request = self.deps.request(
            "prd",
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
                ("modules", &modules),
                ("screens", &screens),
            ],
            PRD_PROFILE,
        )?;
        let raw = self
            .deps
            .gateway(PRD_PROFILE)
            .generate_structured(request)
            .await?;

        let document = normalize_prd(raw)?;
        info!(
            project_id = %project_id,
            modules = document.modules.len(),
            "Generated PRD"
        );
        Ok(StagePayload::Prd(document))
    }
}

fn format_screens(screens: &[Screen]) -> String {
    screens
        .iter()
        .map(|s| format!("- {}: {}", s.name, s.description))
        .collect::<Vec<_>>()
        .join("\n")
}
