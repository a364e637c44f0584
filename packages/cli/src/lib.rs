// ABOUTME: Server bootstrap for PMStation
// ABOUTME: Opens the database, builds the gateways and orchestrator, then serves the API

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use axum::Router;
use pmstation_ai::{GatewayRegistry, GeminiSettings};
use pmstation_api::{create_router, AppState, SseConnectionTracker};
use pmstation_prompts::PromptManager;
use pmstation_workflow::StageOrchestrator;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub mod config;

pub use config::{Config, ConfigError};

/// Assemble the application with CORS and panic recovery
pub fn build_app(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("invalid CORS origin {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Ok(create_router(state)
        .layer(CatchPanicLayer::new())
        .layer(cors))
}

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    info!(database = %config.database_path.display(), "Opening database");
    let pool = pmstation_storage::init_pool(&config.database_path)
        .await
        .context("failed to initialise database")?;

    let prompts = Arc::new(load_prompts(&config)?);
    let gateways = GatewayRegistry::gemini(&GeminiSettings::from_env())
        .context("failed to build LLM gateways")?;

    let orchestrator = Arc::new(StageOrchestrator::new(pool, prompts, gateways));
    let state = AppState::new(orchestrator, SseConnectionTracker::from_env());
    let app = build_app(state, &config.cors_origin)?;

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("Server stopped");
    Ok(())
}

/// Built-in templates, with files from the configured override directory taking precedence
pub fn load_prompts(config: &Config) -> anyhow::Result<PromptManager> {
    match &config.prompts_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "Loading prompt overrides");
            PromptManager::with_overrides(dir)
                .with_context(|| format!("failed to load prompt overrides from {}", dir.display()))
        }
        None => PromptManager::embedded().context("failed to load prompt templates"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
