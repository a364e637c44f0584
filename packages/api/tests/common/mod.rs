// ABOUTME: Common test utilities for API integration tests
// ABOUTME: Spawns the router on an ephemeral port backed by in-memory SQLite and a scripted gateway

use std::net::SocketAddr;
use std::sync::Arc;

use pmstation_ai::GatewayRegistry;
use pmstation_api::{create_router, AppState, SseConnectionTracker};
use pmstation_prompts::PromptManager;
use pmstation_storage::init_memory_pool;
use pmstation_workflow::testing::ScriptedGateway;
use pmstation_workflow::StageOrchestrator;
use serde_json::{json, Value};

pub struct TestContext {
    pub base_url: String,
    pub client: reqwest::Client,
    pub gateway: Arc<ScriptedGateway>,
}

impl TestContext {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST a JSON body and return (status, parsed envelope)
    pub async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let response = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    pub async fn put(&self, path: &str, body: Value) -> (u16, Value) {
        let response = self.client.put(self.url(path)).json(&body).send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    pub async fn get(&self, path: &str) -> (u16, Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    /// Create a project and return its id
    pub async fn create_project(&self) -> String {
        let (status, body) = self
            .post(
                "/api/projects",
                json!({"ownerId": "owner-1", "title": "Planner", "idea": "时间管理App"}),
            )
            .await;
        assert_eq!(status, 201);
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

pub async fn setup_test_server(max_streams_per_ip: usize) -> TestContext {
    let pool = init_memory_pool().await.unwrap();
    let gateway = Arc::new(ScriptedGateway::new());
    let prompts = Arc::new(PromptManager::embedded().unwrap());
    let orchestrator = Arc::new(StageOrchestrator::new(
        pool,
        prompts,
        GatewayRegistry::single(gateway.clone()),
    ));
    let state = AppState::new(orchestrator, SseConnectionTracker::new(max_streams_per_ip));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestContext {
        base_url: format!("http://{}", addr),
        client: reqwest::Client::new(),
        gateway,
    }
}

/// Split an SSE body into (event, data) pairs, skipping comments
pub fn parse_sse(body: &str) -> Vec<(String, Value)> {
    let mut events = Vec::new();
    for block in body.split("\n\n") {
        let mut name = None;
        let mut data = String::new();
        for line in block.lines() {
            if let Some(rest) = line.strip_prefix("event:") {
                name = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("data:") {
                data.push_str(rest.trim_start());
            }
        }
        if let Some(name) = name {
            events.push((name, serde_json::from_str(&data).unwrap_or(Value::Null)));
        }
    }
    events
}
