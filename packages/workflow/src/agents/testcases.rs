// ABOUTME: Test-case agent deriving test suites from the latest PRD
// ABOUTME: Uses the fast tier with a low temperature

use async_trait::async_trait;
use pmstation_core::StageType;
use tracing::info;

use super::{AgentDeps, StageAgent, TESTCASES_PROFILE};
use crate::error::Result;
use crate::normalize::normalize_testcases;
use crate::types::{PrdDocument, StagePayload};

pub struct TestcasesAgent {
    deps: AgentDeps,
}

impl TestcasesAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl StageAgent for TestcasesAgent {
    fn stage_type(&self) -> StageType {
        StageType::Testcases
    }

    async fn generate(&self, project_id: &str) -> Result<StagePayload> {
        let context = self.deps.context(project_id).await?;
        let prd = format_prd(&context.prd()?);

        let request = self
            .deps
            .request("testcases", &[("prd", &prd)], TESTCASES_PROFILE)?;
        let raw = self
            .deps
            .gateway(TESTCASES_PROFILE)
            .generate_structured(request)
            .await?;

        let output = normalize_testcases(raw)?;
        info!(
            project_id = %project_id,
            suites = output.test_suites.len(),
            "Generated test cases"
        );
        Ok(StagePayload::Testcases(output))
    }
}

/// Markdown rendering of the PRD modules, features and acceptance criteria
pub fn format_prd(prd: &PrdDocument) -> String {
    let mut lines = Vec::new();
    if let Some(title) = &prd.title {
        lines.push(format!("# {}", title));
    }
    for module in &prd.modules {
        lines.push(format!("\n## {}", module.name));
        for feature in &module.features {
            lines.push(format!("### {}", feature.name));
            lines.push(format!(
                "Description: {}",
                feature.description.as_deref().unwrap_or("")
            ));
            if !feature.acceptance_criteria.is_empty() {
                lines.push("Acceptance Criteria:".to_string());
                for criterion in &feature.acceptance_criteria {
                    lines.push(format!("  - {}", criterion));
                }
            }
        }
    }
    lines.join("\n")
}
