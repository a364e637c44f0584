// ABOUTME: Streaming interactive-demo pipeline: plan the pages, then stream each page's code
// ABOUTME: Pages run strictly one after another and the structure is persisted after each page

use std::sync::Arc;

use async_stream::stream;
use futures::StreamExt;
use pmstation_core::{StageStatus, StageType};
use pmstation_storage::{NewStage, ProjectStorage, StageStorage};
use tracing::{error, info, warn};

use super::code::strip_code_fences;
use super::events::{DemoEvent, DemoEventStream};
use crate::agents::{AgentDeps, DemoAgent, DemoContext};
use crate::context::ProjectContext;
use crate::error::{Result, WorkflowError};
use crate::guards;
use crate::types::{DemoStructure, PageStatus, StagePayload};

/// Drives demo generation and every page-level operation on the latest demo version
#[derive(Clone)]
pub struct DemoPipeline {
    pub(crate) agent: Arc<DemoAgent>,
    pub(crate) stages: StageStorage,
    pub(crate) projects: ProjectStorage,
}

impl DemoPipeline {
    pub fn new(deps: AgentDeps, projects: ProjectStorage) -> Self {
        Self {
            stages: deps.stages.clone(),
            agent: Arc::new(DemoAgent::new(deps)),
            projects,
        }
    }

    /// Full two-phase generation as an event stream.
    ///
    /// Preconditions are checked before the stream is returned. The stream
    /// creates a new demo version, persists the planned structure before any
    /// page is generated and again after every page, and marks the version
    /// completed at the end. A failed page is recorded on the page and the
    /// next page proceeds. Any other failure discards the version and ends
    /// the stream with an `error` event.
    pub async fn generate_stream(&self, project_id: &str) -> Result<DemoEventStream> {
        guards::require_project(&self.projects, project_id).await?;
        guards::ensure_can_generate(&self.stages, project_id, StageType::Demo).await?;

        let pipeline = self.clone();
        let project_id = project_id.to_string();

        let events = stream! {
            let version = match pipeline
                .stages
                .create_version(NewStage::new(&project_id, StageType::Demo, StageStatus::Generating))
                .await
            {
                Ok(version) => version,
                Err(e) => {
                    yield DemoEvent::error(e);
                    return;
                }
            };
            info!(project_id = %project_id, version = version.version, "Demo generation started");

            // Phase 1
            let planned = match pipeline.agent.context(&project_id).await {
                Ok(context) => pipeline
                    .agent
                    .generate_structure(&context)
                    .await
                    .map(|structure| (context, structure)),
                Err(e) => Err(e),
            };
            let (context, mut structure): (DemoContext, DemoStructure) = match planned {
                Ok(planned) => planned,
                Err(e) => {
                    pipeline.discard(&project_id, &version.id, &e).await;
                    yield DemoEvent::error(e);
                    return;
                }
            };
            if let Err(e) = pipeline.persist(&version.id, &structure, None).await {
                pipeline.discard(&project_id, &version.id, &e).await;
                yield DemoEvent::error(e);
                return;
            }

            yield DemoEvent::Init {
                total_pages: structure.total_pages(),
                project_name: structure.project_name.clone(),
                platforms: structure.platforms.clone(),
                shared_state: structure.shared_state.clone(),
            };

            // Phase 2
            for p in 0..structure.platforms.len() {
                let kind = structure.platforms[p].kind;
                for i in 0..structure.platforms[p].pages.len() {
                    structure.platforms[p].pages[i].status = PageStatus::Generating;
                    let page = structure.platforms[p].pages[i].clone();
                    if let Err(e) = pipeline.persist(&version.id, &structure, None).await {
                        pipeline.discard(&project_id, &version.id, &e).await;
                        yield DemoEvent::error(e);
                        return;
                    }

                    yield DemoEvent::PageStart {
                        platform: Some(kind),
                        page_id: page.id.clone(),
                        page_name: page.name.clone(),
                    };

                    let mut code = String::new();
                    let mut failure: Option<String> = None;
                    match pipeline
                        .agent
                        .page_stream(&context, kind, &page, &structure.shared_state)
                        .await
                    {
                        Ok(mut chunks) => {
                            while let Some(chunk) = chunks.next().await {
                                match chunk {
                                    Ok(chunk) => {
                                        code.push_str(&chunk);
                                        yield DemoEvent::PageProgress {
                                            page_id: page.id.clone(),
                                            chunk,
                                        };
                                    }
                                    Err(e) => {
                                        failure = Some(e.to_string());
                                        break;
                                    }
                                }
                            }
                        }
                        Err(e) => failure = Some(e.to_string()),
                    }

                    let target = &mut structure.platforms[p].pages[i];
                    let event = match failure {
                        None => {
                            let code = strip_code_fences(&code);
                            target.code = code.clone();
                            target.status = PageStatus::Completed;
                            target.error = None;
                            DemoEvent::PageComplete { page_id: page.id.clone(), code }
                        }
                        Some(message) => {
                            error!(project_id = %project_id, page_id = %page.id, error = %message, "Page generation failed");
                            target.status = PageStatus::Error;
                            target.error = Some(message.clone());
                            DemoEvent::PageError { page_id: page.id.clone(), error: message }
                        }
                    };

                    if let Err(e) = pipeline.persist(&version.id, &structure, None).await {
                        pipeline.discard(&project_id, &version.id, &e).await;
                        yield DemoEvent::error(e);
                        return;
                    }
                    yield event;
                }
            }

            let finished = match pipeline
                .persist(&version.id, &structure, Some(StageStatus::Completed))
                .await
            {
                Ok(()) => pipeline
                    .projects
                    .set_current_stage(&project_id, StageType::Demo)
                    .await
                    .map_err(WorkflowError::from),
                Err(e) => Err(e),
            };
            if let Err(e) = finished {
                pipeline.discard(&project_id, &version.id, &e).await;
                yield DemoEvent::error(e);
                return;
            }

            info!(
                project_id = %project_id,
                pages = structure.total_pages(),
                "Demo generation complete"
            );
            yield DemoEvent::Complete { demo_project: structure };
        };

        Ok(Box::pin(events))
    }

    /// Re-stream one page's code.
    ///
    /// Ends with `page_complete` and `complete`, or with `page_error` and
    /// `error`; either outcome is written back to the latest demo version.
    pub async fn regenerate_stream(&self, project_id: &str, page_id: &str) -> Result<DemoEventStream> {
        guards::require_project(&self.projects, project_id).await?;
        let project = ProjectContext::load(&self.stages, project_id).await?;
        let (_, structure) = project.demo()?;
        let (kind, page) = structure
            .find_page(page_id)
            .map(|(kind, page)| (kind, page.clone()))
            .ok_or_else(|| WorkflowError::PageNotFound(page_id.to_string()))?;
        let context = DemoContext::from_project(&project)?;
        let shared_state = structure.shared_state.clone();

        let pipeline = self.clone();
        let project_id = project_id.to_string();

        let events = stream! {
            let entered = pipeline
                .update_page_with(&project_id, &page.id, |target| {
                    target.status = PageStatus::Generating;
                    target.error = None;
                    Ok(())
                })
                .await;
            if let Err(e) = entered {
                yield DemoEvent::error(e);
                return;
            }

            yield DemoEvent::PageStart {
                platform: Some(kind),
                page_id: page.id.clone(),
                page_name: page.name.clone(),
            };

            let mut code = String::new();
            let mut failure: Option<String> = None;
            match pipeline.agent.page_stream(&context, kind, &page, &shared_state).await {
                Ok(mut chunks) => {
                    while let Some(chunk) = chunks.next().await {
                        match chunk {
                            Ok(chunk) => {
                                code.push_str(&chunk);
                                yield DemoEvent::PageProgress { page_id: page.id.clone(), chunk };
                            }
                            Err(e) => {
                                failure = Some(e.to_string());
                                break;
                            }
                        }
                    }
                }
                Err(e) => failure = Some(e.to_string()),
            }

            match failure {
                None => {
                    let code = strip_code_fences(&code);
                    let written = pipeline
                        .update_page_with(&project_id, &page.id, |target| {
                            target.code = code.clone();
                            target.status = PageStatus::Completed;
                            target.error = None;
                            target.skip_reason = None;
                            Ok(())
                        })
                        .await;
                    match written {
                        Ok((structure, _)) => {
                            info!(project_id = %project_id, page_id = %page.id, "Page regenerated");
                            yield DemoEvent::PageComplete { page_id: page.id.clone(), code };
                            yield DemoEvent::Complete { demo_project: structure };
                        }
                        Err(e) => yield DemoEvent::error(e),
                    }
                }
                Some(message) => {
                    error!(project_id = %project_id, page_id = %page.id, error = %message, "Page regeneration failed");
                    let recorded = message.clone();
                    let written = pipeline
                        .update_page_with(&project_id, &page.id, |target| {
                            target.status = PageStatus::Error;
                            target.error = Some(recorded);
                            Ok(())
                        })
                        .await;
                    if let Err(e) = written {
                        warn!(project_id = %project_id, page_id = %page.id, error = %e, "Could not record page error");
                    }
                    yield DemoEvent::PageError { page_id: page.id.clone(), error: message.clone() };
                    yield DemoEvent::error(message);
                }
            }
        };

        Ok(Box::pin(events))
    }

    /// Stream replacement code for a page from an instruction.
    ///
    /// The page is only rewritten after the whole stream succeeded; a failure
    /// leaves the stored code untouched.
    pub async fn modify_stream(
        &self,
        project_id: &str,
        page_id: &str,
        instruction: &str,
    ) -> Result<DemoEventStream> {
        guards::require_project(&self.projects, project_id).await?;
        let project = ProjectContext::load(&self.stages, project_id).await?;
        let (_, structure) = project.demo()?;
        let page = structure
            .find_page(page_id)
            .map(|(_, page)| page.clone())
            .ok_or_else(|| WorkflowError::PageNotFound(page_id.to_string()))?;
        if page.code.trim().is_empty() {
            return Err(WorkflowError::InvalidSelection(
                "page has no code to modify".to_string(),
            ));
        }

        let pipeline = self.clone();
        let project_id = project_id.to_string();
        let instruction = instruction.to_string();

        let events = stream! {
            yield DemoEvent::ModifyStart {
                page_id: page.id.clone(),
                instruction: instruction.clone(),
            };

            let mut code = String::new();
            let mut failure: Option<String> = None;
            match pipeline.agent.modify_stream(&page, &instruction).await {
                Ok(mut chunks) => {
                    while let Some(chunk) = chunks.next().await {
                        match chunk {
                            Ok(chunk) => {
                                code.push_str(&chunk);
                                yield DemoEvent::ModifyProgress { page_id: page.id.clone(), chunk };
                            }
                            Err(e) => {
                                failure = Some(e.to_string());
                                break;
                            }
                        }
                    }
                }
                Err(e) => failure = Some(e.to_string()),
            }

            if let Some(message) = failure {
                error!(project_id = %project_id, page_id = %page.id, error = %message, "Page modification failed");
                yield DemoEvent::error(message);
                return;
            }

            let code = strip_code_fences(&code);
            let written = pipeline
                .update_page_with(&project_id, &page.id, |target| {
                    target.code = code.clone();
                    target.status = PageStatus::Completed;
                    target.error = None;
                    target.skip_reason = None;
                    Ok(())
                })
                .await;
            match written {
                Ok(_) => {
                    info!(project_id = %project_id, page_id = %page.id, "Page modified");
                    yield DemoEvent::ModifyComplete { page_id: page.id.clone(), code };
                }
                Err(e) => yield DemoEvent::error(e),
            }
        };

        Ok(Box::pin(events))
    }

    async fn persist(
        &self,
        stage_id: &str,
        structure: &DemoStructure,
        status: Option<StageStatus>,
    ) -> Result<()> {
        let document = StagePayload::Demo(structure.clone()).to_document()?;
        self.stages.update_output(stage_id, &document, status).await?;
        Ok(())
    }

    async fn discard(&self, project_id: &str, stage_id: &str, cause: &WorkflowError) {
        error!(project_id = %project_id, error = %cause, "Demo generation failed, discarding version");
        if let Err(e) = self.stages.delete_stage(stage_id).await {
            warn!(project_id = %project_id, stage_id = %stage_id, error = %e, "Failed to discard demo version");
        }
    }
}
