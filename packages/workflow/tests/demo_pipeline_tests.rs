// ABOUTME: Integration tests for the streaming demo pipeline
// ABOUTME: Event ordering, per-page failures, fallback planning and page-level edits

mod common;

use futures::StreamExt;
use pmstation_ai::AIServiceError;
use pmstation_core::{StageStatus, StageType};
use pmstation_workflow::{
    DemoEvent, DemoEventStream, DemoStatusSummary, DemoStructure, PageStatus, StagePayload,
    WorkflowError,
};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{demo_structure, setup, through_features, TestContext};

async fn collect(stream: DemoEventStream) -> Vec<DemoEvent> {
    stream.collect().await
}

fn names(events: &[DemoEvent]) -> Vec<&'static str> {
    events.iter().map(DemoEvent::name).collect()
}

async fn latest_demo(ctx: &TestContext) -> (StageStatus, DemoStructure) {
    let stage = ctx
        .orchestrator
        .get_latest_stage(&ctx.project_id, StageType::Demo)
        .await
        .unwrap();
    let StagePayload::Demo(structure) =
        StagePayload::from_document(StageType::Demo, stage.output_data.unwrap()).unwrap()
    else {
        panic!("expected demo payload");
    };
    (stage.status, structure)
}

/// Project with a completed two-page demo
async fn with_demo(ctx: &TestContext) {
    through_features(ctx).await;
    ctx.gateway
        .push_structured(demo_structure())
        .push_stream(["<div>home</div>"])
        .push_stream(["<div>settings</div>"]);
    let stream = ctx
        .orchestrator
        .demo()
        .generate_stream(&ctx.project_id)
        .await
        .unwrap();
    let events = collect(stream).await;
    assert_eq!(events.last().map(DemoEvent::name), Some("complete"));
}

#[tokio::test]
async fn test_generation_continues_after_failed_page() {
    let ctx = setup().await;
    through_features(&ctx).await;
    ctx.gateway
        .push_structured(demo_structure())
        .push_failing_stream(["<div>"], "cut off")
        .push_stream(["```jsx\n", "<div>settings</div>", "\n```"]);

    let stream = ctx
        .orchestrator
        .demo()
        .generate_stream(&ctx.project_id)
        .await
        .unwrap();
    let events = collect(stream).await;

    assert_eq!(
        names(&events),
        vec![
            "init",
            "page_start",
            "page_progress",
            "page_error",
            "page_start",
            "page_progress",
            "page_progress",
            "page_progress",
            "page_complete",
            "complete",
        ]
    );
    match &events[0] {
        DemoEvent::Init {
            total_pages,
            project_name,
            ..
        } => {
            assert_eq!(*total_pages, 2);
            assert_eq!(project_name, "Planner");
        }
        other => panic!("unexpected first event {:?}", other),
    }
    match &events[8] {
        DemoEvent::PageComplete { page_id, code } => {
            assert_eq!(page_id, "p2");
            assert_eq!(code, "<div>settings</div>");
        }
        other => panic!("unexpected event {:?}", other),
    }

    let (status, structure) = latest_demo(&ctx).await;
    assert_eq!(status, StageStatus::Completed);
    let (_, p1) = structure.find_page("p1").unwrap();
    assert_eq!(p1.status, PageStatus::Error);
    assert!(p1.error.as_deref().unwrap().contains("cut off"));
    // Planned pages start from scratch
    assert_eq!(p1.code, "");
    let (_, p2) = structure.find_page("p2").unwrap();
    assert_eq!(p2.status, PageStatus::Completed);
    assert_eq!(p2.code, "<div>settings</div>");

    let project = ctx.orchestrator.get_project(&ctx.project_id).await.unwrap();
    assert_eq!(project.project.current_stage, StageType::Demo);

    // p1's prompt lists its outgoing transition
    let requests = ctx.gateway.requests();
    let first_page_prompt = &requests[requests.len() - 2].prompt;
    assert!(first_page_prompt.contains("Open settings → p2"));
}

#[tokio::test]
async fn test_page_is_stored_as_generating_while_it_streams() {
    let ctx = setup().await;
    through_features(&ctx).await;
    ctx.gateway
        .push_structured(demo_structure())
        .push_stream(["<div>home</div>"])
        .push_stream(["<div>settings</div>"]);
    let demo = ctx.orchestrator.demo();

    let mut stream = demo.generate_stream(&ctx.project_id).await.unwrap();
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        if matches!(&event, DemoEvent::PageStart { page_id, .. } if page_id == "p1") {
            let page = demo.get_page(&ctx.project_id, "p1").await.unwrap();
            assert_eq!(page.status, PageStatus::Generating);
            let summary = demo.status_summary(&ctx.project_id).await.unwrap();
            assert_eq!(summary.generating, 1);
            assert_eq!(summary.pending, 1);

            // skip overrides any status
            let skipped = demo.skip_page(&ctx.project_id, "p2", None).await.unwrap();
            assert_eq!(skipped.status, PageStatus::Skipped);
        }
        events.push(event);
    }
    assert_eq!(events.last().map(DemoEvent::name), Some("complete"));
}

#[tokio::test]
async fn test_structure_falls_back_to_text() {
    let ctx = setup().await;
    through_features(&ctx).await;
    let reply = format!("Here is the plan:\n```json\n{}\n```", demo_structure());
    ctx.gateway
        .push_structured_error(AIServiceError::Decode("schema".to_string()))
        .push_text(reply)
        .push_stream(["<a/>"])
        .push_stream(["<b/>"]);

    let stream = ctx
        .orchestrator
        .demo()
        .generate_stream(&ctx.project_id)
        .await
        .unwrap();
    let events = collect(stream).await;
    assert_eq!(events.first().map(DemoEvent::name), Some("init"));
    assert_eq!(events.last().map(DemoEvent::name), Some("complete"));
}

#[tokio::test]
async fn test_unplannable_demo_discards_version() {
    let ctx = setup().await;
    through_features(&ctx).await;
    ctx.gateway
        .push_structured_error(AIServiceError::Decode("schema".to_string()))
        .push_text("I cannot help with that");

    let stream = ctx
        .orchestrator
        .demo()
        .generate_stream(&ctx.project_id)
        .await
        .unwrap();
    let events = collect(stream).await;

    assert_eq!(names(&events), vec!["error"]);
    let latest = ctx
        .orchestrator
        .get_latest_stage(&ctx.project_id, StageType::Demo)
        .await;
    assert!(matches!(latest, Err(WorkflowError::StageNotFound(_))));
}

#[tokio::test]
async fn test_demo_requires_features() {
    let ctx = setup().await;
    let result = ctx.orchestrator.demo().generate_stream(&ctx.project_id).await;
    assert!(matches!(result, Err(WorkflowError::Precondition(_))));
}

#[tokio::test]
async fn test_page_operations_on_unknown_page() {
    let ctx = setup().await;
    with_demo(&ctx).await;
    let demo = ctx.orchestrator.demo();

    let regenerate = demo.regenerate_stream(&ctx.project_id, "nope").await;
    assert!(matches!(regenerate, Err(WorkflowError::PageNotFound(_))));
    let modify = demo.modify_stream(&ctx.project_id, "nope", "bigger").await;
    assert!(matches!(modify, Err(WorkflowError::PageNotFound(_))));
    let skip = demo.skip_page(&ctx.project_id, "nope", None).await;
    assert!(matches!(skip, Err(WorkflowError::PageNotFound(_))));
    let page = demo.get_page(&ctx.project_id, "nope").await;
    assert!(matches!(page, Err(WorkflowError::PageNotFound(_))));
}

#[tokio::test]
async fn test_regenerate_page_success_and_failure() {
    let ctx = setup().await;
    with_demo(&ctx).await;
    let demo = ctx.orchestrator.demo();

    ctx.gateway.push_stream(["<div>", "new home</div>"]);
    let events = collect(demo.regenerate_stream(&ctx.project_id, "p1").await.unwrap()).await;
    assert_eq!(
        names(&events),
        vec![
            "page_start",
            "page_progress",
            "page_progress",
            "page_complete",
            "complete"
        ]
    );
    let page = demo.get_page(&ctx.project_id, "p1").await.unwrap();
    assert_eq!(page.code, "<div>new home</div>");

    ctx.gateway.push_stream_open_error("overloaded");
    let events = collect(demo.regenerate_stream(&ctx.project_id, "p1").await.unwrap()).await;
    assert_eq!(names(&events), vec!["page_start", "page_error", "error"]);
    let page = demo.get_page(&ctx.project_id, "p1").await.unwrap();
    assert_eq!(page.status, PageStatus::Error);
    assert!(page.error.is_some());
}

#[tokio::test]
async fn test_regenerate_error_page_reenters_generating() {
    let ctx = setup().await;
    with_demo(&ctx).await;
    let demo = ctx.orchestrator.demo();

    ctx.gateway.push_stream_open_error("overloaded");
    collect(demo.regenerate_stream(&ctx.project_id, "p2").await.unwrap()).await;
    let page = demo.get_page(&ctx.project_id, "p2").await.unwrap();
    assert_eq!(page.status, PageStatus::Error);

    ctx.gateway.push_stream(["<div>settings v2</div>"]);
    let mut stream = demo.regenerate_stream(&ctx.project_id, "p2").await.unwrap();
    let first = stream.next().await.unwrap();
    assert_eq!(first.name(), "page_start");
    let page = demo.get_page(&ctx.project_id, "p2").await.unwrap();
    assert_eq!(page.status, PageStatus::Generating);
    assert_eq!(page.error, None);

    let rest: Vec<DemoEvent> = stream.collect().await;
    assert_eq!(rest.last().map(DemoEvent::name), Some("complete"));
    let page = demo.get_page(&ctx.project_id, "p2").await.unwrap();
    assert_eq!(page.status, PageStatus::Completed);
    assert_eq!(page.code, "<div>settings v2</div>");
}

#[tokio::test]
async fn test_modify_applies_code_only_after_success() {
    let ctx = setup().await;
    with_demo(&ctx).await;
    let demo = ctx.orchestrator.demo();

    ctx.gateway.push_failing_stream(["<div>half"], "dropped");
    let events = collect(
        demo.modify_stream(&ctx.project_id, "p2", "make it blue")
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(
        names(&events),
        vec!["modify_start", "modify_progress", "error"]
    );
    let page = demo.get_page(&ctx.project_id, "p2").await.unwrap();
    assert_eq!(page.code, "<div>settings</div>");

    demo.skip_page(&ctx.project_id, "p2", Some("later".to_string()))
        .await
        .unwrap();
    ctx.gateway.push_stream(["```html\n<div class=\"blue\">settings</div>\n```"]);
    let events = collect(
        demo.modify_stream(&ctx.project_id, "p2", "make it blue")
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(
        names(&events),
        vec!["modify_start", "modify_progress", "modify_complete"]
    );
    let page = demo.get_page(&ctx.project_id, "p2").await.unwrap();
    assert_eq!(page.code, "<div class=\"blue\">settings</div>");
    assert_eq!(page.status, PageStatus::Completed);
    assert_eq!(page.skip_reason, None);

    let request = ctx.gateway.requests().last().unwrap().clone();
    assert!(request.prompt.contains("make it blue"));
    assert!(request.prompt.contains("<div>settings</div>"));
}

#[tokio::test]
async fn test_modify_rejects_page_without_code() {
    let ctx = setup().await;
    with_demo(&ctx).await;
    let demo = ctx.orchestrator.demo();
    demo.update_page(&ctx.project_id, "p1", "   ".to_string())
        .await
        .unwrap();

    let result = demo.modify_stream(&ctx.project_id, "p1", "anything").await;
    assert!(matches!(result, Err(WorkflowError::InvalidSelection(_))));
}

#[tokio::test]
async fn test_skip_update_and_summary() {
    let ctx = setup().await;
    let demo = ctx.orchestrator.demo();
    assert_eq!(
        demo.status_summary(&ctx.project_id).await.unwrap(),
        DemoStatusSummary::default()
    );

    with_demo(&ctx).await;
    let skipped = demo
        .skip_page(&ctx.project_id, "p1", Some("not needed".to_string()))
        .await
        .unwrap();
    assert_eq!(skipped.status, PageStatus::Skipped);
    assert_eq!(skipped.skip_reason.as_deref(), Some("not needed"));

    let summary = demo.status_summary(&ctx.project_id).await.unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.completed, 1);

    let updated = demo
        .update_page(&ctx.project_id, "p1", "<main/>".to_string())
        .await
        .unwrap();
    assert_eq!(updated.status, PageStatus::Completed);
    assert_eq!(updated.skip_reason, None);
    assert_eq!(demo.status_summary(&ctx.project_id).await.unwrap().completed, 2);

    let structure = demo.get_structure(&ctx.project_id).await.unwrap();
    let page = &structure["platforms"][0]["pages"][0];
    assert_eq!(page["id"], json!("p1"));
    assert!(page.get("code").is_none());
}
