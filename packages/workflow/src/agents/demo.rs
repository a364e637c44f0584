// ABOUTME: Demo agent: page-structure planning and per-page code streaming
// ABOUTME: Building blocks shared by the non-streaming stage agent and the streaming demo pipeline

use async_trait::async_trait;
use futures::StreamExt;
use pmstation_ai::{extract_json_object, TextStream};
use pmstation_core::StageType;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use super::{AgentDeps, StageAgent, DEMO_PAGE_PROFILE, DEMO_STRUCTURE_PROFILE};
use crate::context::ProjectContext;
use crate::demo::code::strip_code_fences;
use crate::error::{Result, WorkflowError};
use crate::feature_tree::format_features_text;
use crate::normalize::normalize_demo_structure;
use crate::types::{DemoStructure, Page, PageStatus, PlatformKind, StagePayload, Transition};

/// Project data every demo prompt is built from
#[derive(Debug, Clone, PartialEq)]
pub struct DemoContext {
    pub idea: String,
    pub direction: String,
    pub features_text: String,
    pub platform_info: String,
}

impl DemoContext {
    pub fn from_project(context: &ProjectContext) -> Result<Self> {
        let idea = context.idea()?;
        let modules = context.selected_modules()?;
        let direction = context
            .selected_direction()
            .map(|d| d.title)
            .unwrap_or_default();

        Ok(Self {
            idea,
            direction,
            features_text: format_features_text(&modules),
            platform_info: context.platform_info(),
        })
    }
}

pub struct DemoAgent {
    deps: AgentDeps,
}

impl DemoAgent {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }

    pub async fn context(&self, project_id: &str) -> Result<DemoContext> {
        let context = self.deps.context(project_id).await?;
        DemoContext::from_project(&context)
    }

    /// Phase 1: plan platforms and pages.
    ///
    /// Falls back to a plain-text call when the structured call fails, taking
    /// the first `{` through the last `}` of the reply.
    pub async fn generate_structure(&self, context: &DemoContext) -> Result<DemoStructure> {
        let request = self.deps.request(
            "demo_structure",
            &[
                ("idea", &context.idea),
                ("direction", &context.direction),
                ("platform_info", &context.platform_info),
                ("features", &context.features_text),
            ],
            DEMO_STRUCTURE_PROFILE,
        )?;
        let gateway = self.deps.gateway(DEMO_STRUCTURE_PROFILE);

        let raw = match gateway.generate_structured(request.clone()).await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Structured demo plan failed, falling back to text");
                let text = gateway.generate_text(request).await?;
                extract_json_object(&text)
                    .map_err(|e| WorkflowError::NoStructuredOutput(e.to_string()))?
            }
        };

        let structure = normalize_demo_structure(raw)?;
        info!(
            platforms = structure.platforms.len(),
            pages = structure.total_pages(),
            "Planned demo structure"
        );
        Ok(structure)
    }

    /// Phase 2: open the code stream for a single page
    pub async fn page_stream(
        &self,
        context: &DemoContext,
        platform: PlatformKind,
        page: &Page,
        shared_state: &Map<String, Value>,
    ) -> Result<TextStream> {
        let transitions = format_transitions(&page.transitions);
        let shared_state = Value::Object(shared_state.clone()).to_string();

        let request = self.deps.request(
            "demo_page",
            &[
                ("page_name", &page.name),
                ("page_path", &page.path),
                ("page_description", &page.description),
                ("transitions", &transitions),
                ("idea", &context.idea),
                ("direction", &context.direction),
                ("platform_type", platform.as_str()),
                ("related_features", &context.features_text),
                ("shared_state", &shared_state),
            ],
            DEMO_PAGE_PROFILE,
        )?;
        Ok(self
            .deps
            .gateway(DEMO_PAGE_PROFILE)
            .generate_text_stream(request)
            .await?)
    }

    /// Stream replacement code for a page given a natural-language instruction
    pub async fn modify_stream(&self, page: &Page, instruction: &str) -> Result<TextStream> {
        let request = self.deps.request(
            "demo_modify",
            &[
                ("instruction", instruction),
                ("current_code", &page.code),
                ("page_name", &page.name),
                ("page_description", &page.description),
            ],
            DEMO_PAGE_PROFILE,
        )?;
        Ok(self
            .deps
            .gateway(DEMO_PAGE_PROFILE)
            .generate_text_stream(request)
            .await?)
    }

    /// Drain a page stream into fence-stripped code
    async fn render_page(
        &self,
        context: &DemoContext,
        platform: PlatformKind,
        page: &Page,
        shared_state: &Map<String, Value>,
    ) -> Result<String> {
        let mut stream = self
            .page_stream(context, platform, page, shared_state)
            .await?;
        let mut code = String::new();
        while let Some(chunk) = stream.next().await {
            code.push_str(&chunk?);
        }
        Ok(strip_code_fences(&code))
    }
}

#[async_trait]
impl StageAgent for DemoAgent {
    fn stage_type(&self) -> StageType {
        StageType::Demo
    }

    /// Both phases without events; a failed page is recorded on the page
    async fn generate(&self, project_id: &str) -> Result<StagePayload> {
        let context = self.context(project_id).await?;
        let mut structure = self.generate_structure(&context).await?;
        let shared_state = structure.shared_state.clone();

        for platform in structure.platforms.iter_mut() {
            let kind = platform.kind;
            for page in platform.pages.iter_mut() {
                match self.render_page(&context, kind, page, &shared_state).await {
                    Ok(code) => {
                        page.code = code;
                        page.status = PageStatus::Completed;
                    }
                    Err(e) => {
                        error!(project_id = %project_id, page_id = %page.id, error = %e, "Page generation failed");
                        page.status = PageStatus::Error;
                        page.error = Some(e.to_string());
                    }
                }
            }
        }

        Ok(StagePayload::Demo(structure))
    }
}

/// One "- trigger → target" line per transition, or an explicit marker when there are none
pub fn format_transitions(transitions: &[Transition]) -> String {
    if transitions.is_empty() {
        return "No page transitions".to_string();
    }
    let mut text = String::from("Page transitions:\n");
    for transition in transitions {
        let trigger = if transition.trigger.is_empty() {
            "action"
        } else {
            transition.trigger.as_str()
        };
        text.push_str(&format!("- {} → {}\n", trigger, transition.target_page_id));
    }
    text
}
