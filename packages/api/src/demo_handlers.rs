// ABOUTME: HTTP request handlers for the interactive demo
// ABOUTME: SSE endpoints for generate, regenerate and modify plus page reads and edits

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, State},
    Json,
};
use pmstation_workflow::{DemoStatusSummary, Page};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::response::{respond, ApiError, ApiResult};
use crate::sse::{stream_demo_events, DemoSse, SseConnectionGuard};
use crate::AppState;

fn acquire_stream_slot(state: &AppState, addr: SocketAddr) -> Result<SseConnectionGuard, ApiError> {
    state
        .sse
        .try_acquire(addr.ip())
        .map_err(|_| ApiError::too_many_streams())
}

/// Full demo generation as an event stream
pub async fn generate_stream(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(project_id): Path<String>,
) -> Result<DemoSse, ApiError> {
    let guard = acquire_stream_slot(&state, addr)?;
    info!(project_id = %project_id, "Demo generation stream opened");
    let events = state.orchestrator.demo().generate_stream(&project_id).await?;
    Ok(stream_demo_events(events, guard))
}

pub async fn regenerate_page(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path((project_id, page_id)): Path<(String, String)>,
) -> Result<DemoSse, ApiError> {
    let guard = acquire_stream_slot(&state, addr)?;
    info!(project_id = %project_id, page_id = %page_id, "Page regeneration stream opened");
    let events = state
        .orchestrator
        .demo()
        .regenerate_stream(&project_id, &page_id)
        .await?;
    Ok(stream_demo_events(events, guard))
}

#[derive(Deserialize)]
pub struct ModifyPageRequest {
    pub page_id: String,
    pub instruction: String,
}

pub async fn modify_page(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(project_id): Path<String>,
    Json(request): Json<ModifyPageRequest>,
) -> Result<DemoSse, ApiError> {
    let guard = acquire_stream_slot(&state, addr)?;
    info!(project_id = %project_id, page_id = %request.page_id, "Page modification stream opened");
    let events = state
        .orchestrator
        .demo()
        .modify_stream(&project_id, &request.page_id, &request.instruction)
        .await?;
    Ok(stream_demo_events(events, guard))
}

pub async fn get_structure(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Value> {
    respond(state.orchestrator.demo().get_structure(&project_id).await)
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<DemoStatusSummary> {
    respond(state.orchestrator.demo().status_summary(&project_id).await)
}

pub async fn get_page(
    State(state): State<AppState>,
    Path((project_id, page_id)): Path<(String, String)>,
) -> ApiResult<Page> {
    respond(state.orchestrator.demo().get_page(&project_id, &page_id).await)
}

#[derive(Deserialize, Default)]
pub struct SkipPageRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn skip_page(
    State(state): State<AppState>,
    Path((project_id, page_id)): Path<(String, String)>,
    body: Option<Json<SkipPageRequest>>,
) -> ApiResult<Page> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    respond(
        state
            .orchestrator
            .demo()
            .skip_page(&project_id, &page_id, request.reason)
            .await,
    )
}

#[derive(Deserialize)]
pub struct UpdatePageRequest {
    pub code: String,
}

pub async fn update_page(
    State(state): State<AppState>,
    Path((project_id, page_id)): Path<(String, String)>,
    Json(request): Json<UpdatePageRequest>,
) -> ApiResult<Page> {
    respond(
        state
            .orchestrator
            .demo()
            .update_page(&project_id, &page_id, request.code)
            .await,
    )
}
