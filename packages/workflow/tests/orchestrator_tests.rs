// ABOUTME: Integration tests for the stage orchestrator and the stage agents
// ABOUTME: Workflow order, versioning, discard-on-failure, selections and agent normalisation

mod common;

use base64::Engine;
use pmstation_ai::AIServiceError;
use pmstation_core::{StageStatus, StageType};
use pmstation_storage::ProjectUpdate;
use pmstation_workflow::types::PlatformKind;
use pmstation_workflow::{
    FeatureSelection, PlatformSelection, SelectionInput, StagePayload, WorkflowError,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{setup, through_features, through_platform};

#[tokio::test]
async fn test_generated_direction_gets_id() {
    let ctx = setup().await;
    ctx.gateway
        .push_structured(json!({"directions": [{"title": "X", "positioning": "Solo"}]}));

    let stage = ctx
        .orchestrator
        .generate(&ctx.project_id, StageType::Direction)
        .await
        .unwrap();

    assert_eq!(stage.status, StageStatus::Completed);
    assert_eq!(stage.version, 1);
    let output = stage.output_data.unwrap();
    assert_eq!(output["directions"][0]["id"], 1);
    assert_eq!(output["directions"][0]["title"], "X");

    let project = ctx.orchestrator.get_project(&ctx.project_id).await.unwrap();
    assert_eq!(project.project.current_stage, StageType::Direction);

    let requests = ctx.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].prompt.contains("时间管理App"));
    assert_eq!(requests[0].temperature, 0.8);
}

#[tokio::test]
async fn test_idea_and_platform_cannot_be_generated() {
    let ctx = setup().await;
    for stage_type in [StageType::Idea, StageType::Platform] {
        let result = ctx.orchestrator.generate(&ctx.project_id, stage_type).await;
        assert!(matches!(result, Err(WorkflowError::Precondition(_))));
    }
}

#[tokio::test]
async fn test_generate_requires_settled_prerequisite() {
    let ctx = setup().await;

    let result = ctx
        .orchestrator
        .generate(&ctx.project_id, StageType::Features)
        .await;
    assert!(matches!(result, Err(WorkflowError::Precondition(_))));

    let result = ctx.orchestrator.generate(&ctx.project_id, StageType::Prd).await;
    assert!(matches!(result, Err(WorkflowError::Precondition(_))));
    assert!(ctx.gateway.requests().is_empty());
}

#[tokio::test]
async fn test_regeneration_increments_version_and_keeps_history() {
    let ctx = setup().await;
    ctx.gateway
        .push_structured(json!({"directions": [{"title": "First"}]}))
        .push_structured(json!({"directions": [{"title": "Second"}]}));

    ctx.orchestrator
        .generate(&ctx.project_id, StageType::Direction)
        .await
        .unwrap();
    let second = ctx
        .orchestrator
        .generate(&ctx.project_id, StageType::Direction)
        .await
        .unwrap();
    assert_eq!(second.version, 2);

    let first = ctx
        .orchestrator
        .get_stage_version(&ctx.project_id, StageType::Direction, 1)
        .await
        .unwrap();
    assert_eq!(first.output_data.unwrap()["directions"][0]["title"], "First");

    let latest = ctx
        .orchestrator
        .get_latest_stage(&ctx.project_id, StageType::Direction)
        .await
        .unwrap();
    assert_eq!(latest.id, second.id);
}

#[tokio::test]
async fn test_failed_generation_discards_version() {
    let ctx = setup().await;
    ctx.gateway
        .push_structured_error(AIServiceError::Decode("not json".to_string()));

    let result = ctx
        .orchestrator
        .generate(&ctx.project_id, StageType::Direction)
        .await;
    assert!(matches!(
        result,
        Err(WorkflowError::AIService(AIServiceError::Decode(_)))
    ));

    let stages = ctx.orchestrator.list_stages(&ctx.project_id).await.unwrap();
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[0].stage_type, StageType::Idea);

    let project = ctx.orchestrator.get_project(&ctx.project_id).await.unwrap();
    assert_eq!(project.project.current_stage, StageType::Idea);

    // The next attempt reuses version 1
    ctx.gateway
        .push_structured(json!({"directions": [{"title": "Retry"}]}));
    let stage = ctx
        .orchestrator
        .generate(&ctx.project_id, StageType::Direction)
        .await
        .unwrap();
    assert_eq!(stage.version, 1);
}

#[tokio::test]
async fn test_confirm_requires_completed_latest() {
    let ctx = setup().await;

    let missing = ctx
        .orchestrator
        .confirm(&ctx.project_id, StageType::Direction)
        .await;
    assert!(matches!(
        missing,
        Err(WorkflowError::StageNotFound(StageType::Direction))
    ));

    ctx.gateway
        .push_structured(json!({"directions": [{"title": "X"}]}));
    ctx.orchestrator
        .generate(&ctx.project_id, StageType::Direction)
        .await
        .unwrap();

    let confirmed = ctx
        .orchestrator
        .confirm(&ctx.project_id, StageType::Direction)
        .await
        .unwrap();
    assert_eq!(confirmed.status, StageStatus::Confirmed);

    let project = ctx.orchestrator.get_project(&ctx.project_id).await.unwrap();
    assert_eq!(project.project.current_stage, StageType::Platform);

    let again = ctx
        .orchestrator
        .confirm(&ctx.project_id, StageType::Direction)
        .await;
    assert!(matches!(again, Err(WorkflowError::Precondition(_))));
}

#[tokio::test]
async fn test_select_requires_exactly_one_field() {
    let ctx = setup().await;
    ctx.gateway
        .push_structured(json!({"directions": [{"title": "X"}]}));
    ctx.orchestrator
        .generate(&ctx.project_id, StageType::Direction)
        .await
        .unwrap();

    for input in [
        SelectionInput {
            selected_id: Some(1),
            selected_ids: Some(vec![1]),
        },
        SelectionInput::default(),
    ] {
        let result = ctx
            .orchestrator
            .select(&ctx.project_id, StageType::Direction, input)
            .await;
        assert!(matches!(result, Err(WorkflowError::InvalidSelection(_))));
    }

    let unknown = ctx
        .orchestrator
        .select(
            &ctx.project_id,
            StageType::Direction,
            SelectionInput {
                selected_id: Some(42),
                selected_ids: None,
            },
        )
        .await;
    assert!(matches!(unknown, Err(WorkflowError::InvalidSelection(_))));

    // Nothing was confirmed by the rejected attempts
    let latest = ctx
        .orchestrator
        .get_latest_stage(&ctx.project_id, StageType::Direction)
        .await
        .unwrap();
    assert_eq!(latest.status, StageStatus::Completed);
}

#[tokio::test]
async fn test_select_direction_stores_whole_direction_and_confirms() {
    let ctx = setup().await;
    ctx.gateway.push_structured(json!({"directions": [
        {"title": "A"},
        {"title": "B", "target_users": "Teams"}
    ]}));
    ctx.orchestrator
        .generate(&ctx.project_id, StageType::Direction)
        .await
        .unwrap();

    let stage = ctx
        .orchestrator
        .select(
            &ctx.project_id,
            StageType::Direction,
            SelectionInput {
                selected_id: Some(2),
                selected_ids: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(stage.status, StageStatus::Confirmed);
    assert_eq!(
        stage.selected_option,
        Some(json!({"id": 2, "title": "B", "target_users": "Teams"}))
    );
    let project = ctx.orchestrator.get_project(&ctx.project_id).await.unwrap();
    assert_eq!(project.project.current_stage, StageType::Platform);
}

#[tokio::test]
async fn test_select_platform_requires_confirmed_direction() {
    let ctx = setup().await;
    let selection = PlatformSelection {
        platforms: vec![PlatformKind::Mobile],
        pc_type: None,
        mobile_type: None,
    };

    let result = ctx
        .orchestrator
        .select_platform(&ctx.project_id, selection.clone())
        .await;
    assert!(matches!(result, Err(WorkflowError::Precondition(_))));

    let empty = ctx
        .orchestrator
        .select_platform(
            &ctx.project_id,
            PlatformSelection {
                platforms: vec![],
                pc_type: None,
                mobile_type: None,
            },
        )
        .await;
    assert!(matches!(empty, Err(WorkflowError::InvalidSelection(_))));
}

#[tokio::test]
async fn test_platform_selection_creates_confirmed_version() {
    let ctx = setup().await;
    through_platform(&ctx).await;

    let platform = ctx
        .orchestrator
        .get_latest_stage(&ctx.project_id, StageType::Platform)
        .await
        .unwrap();
    assert_eq!(platform.status, StageStatus::Confirmed);
    assert_eq!(platform.output_data, platform.selected_option);
    assert_eq!(
        platform.selected_option.unwrap()["platforms"],
        json!(["pc", "mobile"])
    );

    let project = ctx.orchestrator.get_project(&ctx.project_id).await.unwrap();
    assert_eq!(project.project.current_stage, StageType::Features);
}

#[tokio::test]
async fn test_features_agent_assigns_ids_and_uses_platform_roles() {
    let ctx = setup().await;
    through_features(&ctx).await;

    let features = ctx
        .orchestrator
        .get_latest_stage(&ctx.project_id, StageType::Features)
        .await
        .unwrap();
    let output = features.output_data.unwrap();
    assert_eq!(output["modules"][0]["id"], 1);
    assert_eq!(output["modules"][1]["id"], 2);
    assert_eq!(output["modules"][1]["sub_features"][0]["id"], 3);
    assert_eq!(output["modules"][1]["sub_features"][0]["selected"], true);

    let requests = ctx.gateway.requests();
    let prompt = &requests.last().unwrap().prompt;
    assert!(prompt.contains("Focus timer"));
    assert!(prompt.contains("Platforms: pc, mobile"));
    assert!(prompt.contains("PC: admin"));
    assert!(prompt.contains("Mobile: user"));
}

#[tokio::test]
async fn test_features_without_direction_selection_is_missing_dependency() {
    let ctx = setup().await;
    ctx.gateway
        .push_structured(json!({"directions": [{"title": "X"}]}));
    ctx.orchestrator
        .generate(&ctx.project_id, StageType::Direction)
        .await
        .unwrap();
    // Confirmed without choosing a direction
    ctx.orchestrator
        .confirm(&ctx.project_id, StageType::Direction)
        .await
        .unwrap();
    ctx.orchestrator
        .select_platform(
            &ctx.project_id,
            PlatformSelection {
                platforms: vec![PlatformKind::Pc],
                pc_type: None,
                mobile_type: None,
            },
        )
        .await
        .unwrap();

    let result = ctx
        .orchestrator
        .generate(&ctx.project_id, StageType::Features)
        .await;
    assert!(matches!(
        result,
        Err(WorkflowError::MissingDependency {
            stage: StageType::Direction,
            ..
        })
    ));
    let latest = ctx
        .orchestrator
        .get_latest_stage(&ctx.project_id, StageType::Features)
        .await;
    assert!(matches!(latest, Err(WorkflowError::StageNotFound(_))));
}

#[tokio::test]
async fn test_feature_selection_confirms_and_advances() {
    let ctx = setup().await;
    through_features(&ctx).await;

    let stage = ctx
        .orchestrator
        .select_features(
            &ctx.project_id,
            FeatureSelection {
                selected_ids: vec![2],
            },
        )
        .await
        .unwrap();
    assert_eq!(stage.status, StageStatus::Confirmed);
    assert_eq!(stage.selected_option, Some(json!({"selected_ids": [2]})));

    let project = ctx.orchestrator.get_project(&ctx.project_id).await.unwrap();
    assert_eq!(project.project.current_stage, StageType::Demo);
}

#[tokio::test]
async fn test_prototype_images_and_auxiliary_stage() {
    let ctx = setup().await;
    through_features(&ctx).await;
    ctx.orchestrator
        .select_features(
            &ctx.project_id,
            FeatureSelection {
                selected_ids: vec![2],
            },
        )
        .await
        .unwrap();

    ctx.gateway.push_structured(json!({"screens": [
        {"name": "Home", "description": "Overview", "components": [{"type": "card", "name": "Today"}]},
        {"name": "Stats", "description": "Charts"},
        {"name": "Profile", "description": "Account"},
        {"name": "Settings", "description": "Prefs"}
    ]}));
    ctx.gateway
        .push_image(Some(vec![1, 2, 3]))
        .push_image(None)
        .push_image(Some(vec![4]))
        .push_image(Some(vec![5]));

    let stage = ctx
        .orchestrator
        .generate(&ctx.project_id, StageType::Prototype)
        .await
        .unwrap();

    let payload =
        StagePayload::from_document(StageType::Prototype, stage.output_data.unwrap()).unwrap();
    let StagePayload::Prototype(prototype) = payload else {
        panic!("expected prototype payload");
    };
    assert_eq!(prototype.screens.len(), 4);
    assert_eq!(
        prototype.screens[0].image_data.as_deref(),
        Some(base64::engine::general_purpose::STANDARD.encode([1, 2, 3]).as_str())
    );
    assert!(prototype.screens[1].image_data.is_none());
    assert!(prototype.screens[3].image_data.is_some());
    assert_eq!(ctx.gateway.image_prompts().len(), 4);
    assert!(ctx.gateway.image_prompts()[0].contains("card: Today"));

    // Only the selected subtree reached the prompt
    let screens_request = ctx.gateway.requests().last().unwrap().prompt.clone();
    assert!(screens_request.contains("B1"));
    assert!(!screens_request.contains("] A:"));

    let project = ctx.orchestrator.get_project(&ctx.project_id).await.unwrap();
    assert_eq!(project.project.current_stage, StageType::Demo);
}

#[tokio::test]
async fn test_deleted_project_is_not_found() {
    let ctx = setup().await;
    ctx.orchestrator
        .update_project(
            &ctx.project_id,
            ProjectUpdate {
                title: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    ctx.orchestrator.delete_project(&ctx.project_id).await.unwrap();

    let result = ctx
        .orchestrator
        .generate(&ctx.project_id, StageType::Direction)
        .await;
    assert!(matches!(result, Err(WorkflowError::ProjectNotFound(_))));
    assert!(ctx
        .orchestrator
        .list_projects("owner-1")
        .await
        .unwrap()
        .is_empty());
}
