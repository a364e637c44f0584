// ABOUTME: HTTP API layer for PMStation providing REST and SSE endpoints
// ABOUTME: Routes projects, stage transitions and the interactive demo onto the stage orchestrator

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use pmstation_workflow::StageOrchestrator;
use tower_http::trace::TraceLayer;

pub mod demo_handlers;
pub mod projects_handlers;
pub mod response;
pub mod sse;
pub mod stages_handlers;

pub use response::{ApiError, ApiResponse};
pub use sse::SseConnectionTracker;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<StageOrchestrator>,
    pub sse: SseConnectionTracker,
}

impl AppState {
    pub fn new(orchestrator: Arc<StageOrchestrator>, sse: SseConnectionTracker) -> Self {
        Self { orchestrator, sse }
    }
}

/// Creates the projects API router (nested under /api/projects)
pub fn create_projects_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(projects_handlers::list_projects).post(projects_handlers::create_project),
        )
        .route(
            "/{id}",
            get(projects_handlers::get_project)
                .put(projects_handlers::update_project)
                .delete(projects_handlers::delete_project),
        )
        .nest("/{id}/stages", create_stages_router())
        .nest("/{id}/demo", create_demo_router())
}

/// Creates the stages API router (nested under /api/projects/{id}/stages)
pub fn create_stages_router() -> Router<AppState> {
    Router::new()
        .route("/", get(stages_handlers::list_stages))
        .route(
            "/features/select-features",
            put(stages_handlers::select_features),
        )
        .route("/platform/select", put(stages_handlers::select_platform))
        .route("/{type}", get(stages_handlers::get_latest_stage))
        .route(
            "/{type}/versions/{version}",
            get(stages_handlers::get_stage_version),
        )
        .route("/{type}/generate", post(stages_handlers::generate_stage))
        .route("/{type}/confirm", put(stages_handlers::confirm_stage))
        .route("/{type}/select", put(stages_handlers::select_option))
}

/// Creates the demo API router (nested under /api/projects/{id}/demo)
pub fn create_demo_router() -> Router<AppState> {
    Router::new()
        .route("/generate/stream", post(demo_handlers::generate_stream))
        .route("/structure", get(demo_handlers::get_structure))
        .route("/status", get(demo_handlers::get_status))
        .route("/modify", post(demo_handlers::modify_page))
        .route(
            "/pages/{page_id}",
            get(demo_handlers::get_page).put(demo_handlers::update_page),
        )
        .route(
            "/pages/{page_id}/regenerate",
            post(demo_handlers::regenerate_page),
        )
        .route("/pages/{page_id}/skip", post(demo_handlers::skip_page))
}

/// The full application router under /api
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(projects_handlers::health))
        .nest("/api/projects", create_projects_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
