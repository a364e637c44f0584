// ABOUTME: Common helpers for workflow integration tests
// ABOUTME: In-memory database, scripted gateway and a project driven up to the features stage

use std::sync::Arc;

use pmstation_ai::GatewayRegistry;
use pmstation_prompts::PromptManager;
use pmstation_storage::{init_memory_pool, NewProject};
use pmstation_workflow::testing::ScriptedGateway;
use pmstation_workflow::{PlatformKind, PlatformSelection, SelectionInput, StageOrchestrator};
use pmstation_core::StageType;
use serde_json::{json, Value};

pub struct TestContext {
    pub orchestrator: StageOrchestrator,
    pub gateway: Arc<ScriptedGateway>,
    pub project_id: String,
}

pub async fn setup() -> TestContext {
    let pool = init_memory_pool().await.unwrap();
    let gateway = Arc::new(ScriptedGateway::new());
    let prompts = Arc::new(PromptManager::embedded().unwrap());
    let orchestrator =
        StageOrchestrator::new(pool, prompts, GatewayRegistry::single(gateway.clone()));

    let project = orchestrator
        .create_project(NewProject {
            owner_id: "owner-1".to_string(),
            title: "Planner".to_string(),
            description: None,
            idea: "时间管理App".to_string(),
        })
        .await
        .unwrap();

    TestContext {
        orchestrator,
        gateway,
        project_id: project.project.id,
    }
}

/// Generate and select a direction, then choose platforms
#[allow(dead_code)]
pub async fn through_platform(ctx: &TestContext) {
    ctx.gateway.push_structured(json!({
        "directions": [
            {"title": "Focus timer", "positioning": "Deep work", "target_users": "Students"},
            {"title": "Team planner"}
        ]
    }));
    ctx.orchestrator
        .generate(&ctx.project_id, StageType::Direction)
        .await
        .unwrap();
    ctx.orchestrator
        .select(
            &ctx.project_id,
            StageType::Direction,
            SelectionInput {
                selected_id: Some(1),
                selected_ids: None,
            },
        )
        .await
        .unwrap();
    ctx.orchestrator
        .select_platform(
            &ctx.project_id,
            PlatformSelection {
                platforms: vec![PlatformKind::Pc, PlatformKind::Mobile],
                pc_type: Some("admin".to_string()),
                mobile_type: None,
            },
        )
        .await
        .unwrap();
}

/// Feature tree without ids
#[allow(dead_code)]
pub fn feature_tree() -> Value {
    json!([
        {"name": "A", "description": "Tasks"},
        {"name": "B", "description": "Stats", "sub_features": [{"name": "B1", "description": "Charts"}]}
    ])
}

/// Project with generated (completed) features
#[allow(dead_code)]
pub async fn through_features(ctx: &TestContext) {
    through_platform(ctx).await;
    ctx.gateway.push_structured(feature_tree());
    ctx.orchestrator
        .generate(&ctx.project_id, StageType::Features)
        .await
        .unwrap();
}

/// Two pc pages, p1 linking to p2
#[allow(dead_code)]
pub fn demo_structure() -> Value {
    json!({
        "project_name": "Planner",
        "platforms": [{
            "type": "pc",
            "pages": [
                {
                    "id": "p1", "name": "Home", "path": "/", "description": "Landing", "order": 1,
                    "transitions": [{"trigger": "Open settings", "target_page_id": "p2"}],
                    "status": "completed", "code": "stale"
                },
                {"id": "p2", "name": "Settings", "path": "/settings", "description": "Prefs", "order": 2}
            ]
        }],
        "shared_state": {"user": null}
    })
}
