// ABOUTME: Non-streaming page operations and read-side queries on the latest demo version
// ABOUTME: Every write re-reads the latest version and rewrites the whole structure document

use pmstation_core::StageType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::pipeline::DemoPipeline;
use crate::error::{Result, WorkflowError};
use crate::guards;
use crate::types::{DemoStructure, Page, PageStatus, StagePayload};

/// Page counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoStatusSummary {
    pub total: usize,
    pub completed: usize,
    pub error: usize,
    pub skipped: usize,
    pub pending: usize,
    pub generating: usize,
}

impl DemoStatusSummary {
    pub fn from_structure(structure: &DemoStructure) -> Self {
        let mut summary = Self::default();
        for page in structure.platforms.iter().flat_map(|p| p.pages.iter()) {
            summary.total += 1;
            match page.status {
                PageStatus::Pending => summary.pending += 1,
                PageStatus::Generating => summary.generating += 1,
                PageStatus::Completed => summary.completed += 1,
                PageStatus::Error => summary.error += 1,
                PageStatus::Skipped => summary.skipped += 1,
            }
        }
        summary
    }
}

impl DemoPipeline {
    /// Latest demo version id and its decoded structure
    async fn latest_structure(&self, project_id: &str) -> Result<(String, DemoStructure)> {
        let stage = guards::require_latest(&self.stages, project_id, StageType::Demo).await?;
        let output = stage
            .output_data
            .ok_or(WorkflowError::StageNotFound(StageType::Demo))?;
        match StagePayload::from_document(StageType::Demo, output)? {
            StagePayload::Demo(structure) => Ok((stage.id, structure)),
            other => Err(WorkflowError::decode(
                StageType::Demo,
                format!("unexpected {} document", other.stage_type()),
            )),
        }
    }

    /// Read-modify-write of one page in the latest demo version
    pub(crate) async fn update_page_with<F>(
        &self,
        project_id: &str,
        page_id: &str,
        apply: F,
    ) -> Result<(DemoStructure, Page)>
    where
        F: FnOnce(&mut Page) -> Result<()>,
    {
        let (stage_id, mut structure) = self.latest_structure(project_id).await?;
        let page = {
            let (_, page) = structure
                .find_page_mut(page_id)
                .ok_or_else(|| WorkflowError::PageNotFound(page_id.to_string()))?;
            apply(page)?;
            page.clone()
        };

        let document = StagePayload::Demo(structure.clone()).to_document()?;
        self.stages.update_output(&stage_id, &document, None).await?;
        Ok((structure, page))
    }

    /// Mark a page skipped without calling the model; allowed from any status
    pub async fn skip_page(
        &self,
        project_id: &str,
        page_id: &str,
        reason: Option<String>,
    ) -> Result<Page> {
        guards::require_project(&self.projects, project_id).await?;
        let (_, page) = self
            .update_page_with(project_id, page_id, |page| {
                page.status = PageStatus::Skipped;
                page.skip_reason = reason;
                Ok(())
            })
            .await?;
        info!(project_id = %project_id, page_id = %page_id, "Page skipped");
        Ok(page)
    }

    /// Overwrite a page's code by hand; the page becomes completed
    pub async fn update_page(&self, project_id: &str, page_id: &str, code: String) -> Result<Page> {
        guards::require_project(&self.projects, project_id).await?;
        let (_, page) = self
            .update_page_with(project_id, page_id, |page| {
                page.code = code;
                page.status = PageStatus::Completed;
                page.error = None;
                page.skip_reason = None;
                Ok(())
            })
            .await?;
        info!(project_id = %project_id, page_id = %page_id, "Page code updated manually");
        Ok(page)
    }

    /// Latest structure with page code removed
    pub async fn get_structure(&self, project_id: &str) -> Result<Value> {
        guards::require_project(&self.projects, project_id).await?;
        let (_, structure) = self.latest_structure(project_id).await?;
        Ok(structure.without_code())
    }

    pub async fn get_page(&self, project_id: &str, page_id: &str) -> Result<Page> {
        guards::require_project(&self.projects, project_id).await?;
        let (_, structure) = self.latest_structure(project_id).await?;
        structure
            .find_page(page_id)
            .map(|(_, page)| page.clone())
            .ok_or_else(|| WorkflowError::PageNotFound(page_id.to_string()))
    }

    /// Page counts of the latest demo; all zero when no demo exists
    pub async fn status_summary(&self, project_id: &str) -> Result<DemoStatusSummary> {
        guards::require_project(&self.projects, project_id).await?;
        match self.latest_structure(project_id).await {
            Ok((_, structure)) => Ok(DemoStatusSummary::from_structure(&structure)),
            Err(WorkflowError::StageNotFound(_)) => Ok(DemoStatusSummary::default()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_counts_each_status() {
        let structure: DemoStructure = serde_json::from_value(json!({
            "platforms": [
                {"type": "pc", "pages": [
                    {"id": "a", "status": "completed"},
                    {"id": "b", "status": "error"}
                ]},
                {"type": "mobile", "pages": [
                    {"id": "c", "status": "skipped"},
                    {"id": "d"}
                ]}
            ]
        }))
        .unwrap();

        assert_eq!(
            DemoStatusSummary::from_structure(&structure),
            DemoStatusSummary {
                total: 4,
                completed: 1,
                error: 1,
                skipped: 1,
                pending: 1,
                generating: 0,
            }
        );
    }
}
