// ABOUTME: Integration tests for the HTTP surface over a live server
// ABOUTME: Envelope shape, error status mapping, workflow endpoints and SSE demo streams

mod common;

use common::{parse_sse, setup_test_server, TestContext};
use pmstation_ai::AIServiceError;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

async fn drive_to_features(ctx: &TestContext, project_id: &str) {
    ctx.gateway
        .push_structured(json!({"directions": [{"title": "Focus timer"}]}))
        .push_structured(json!([
            {"name": "Tasks", "description": "Lists"},
            {"name": "Stats", "description": "Charts"}
        ]));

    let (status, _) = ctx
        .post(
            &format!("/api/projects/{}/stages/direction/generate", project_id),
            json!({}),
        )
        .await;
    assert_eq!(status, 200);
    let (status, _) = ctx
        .put(
            &format!("/api/projects/{}/stages/direction/select", project_id),
            json!({"selected_id": 1}),
        )
        .await;
    assert_eq!(status, 200);
    let (status, _) = ctx
        .put(
            &format!("/api/projects/{}/stages/platform/select", project_id),
            json!({"platforms": ["pc"]}),
        )
        .await;
    assert_eq!(status, 200);
    let (status, _) = ctx
        .post(
            &format!("/api/projects/{}/stages/features/generate", project_id),
            json!({}),
        )
        .await;
    assert_eq!(status, 200);
}

async fn read_stream(ctx: &TestContext, path: &str, body: Value) -> (u16, Vec<(String, Value)>) {
    let response = ctx
        .client
        .post(ctx.url(path))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    let text = response.text().await.unwrap();
    (status, parse_sse(&text))
}

fn event_names(events: &[(String, Value)]) -> Vec<&str> {
    events.iter().map(|(name, _)| name.as_str()).collect()
}

#[tokio::test]
async fn test_health() {
    let ctx = setup_test_server(3).await;
    let (status, body) = ctx.get("/api/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_project_lifecycle() {
    let ctx = setup_test_server(3).await;
    let project_id = ctx.create_project().await;

    let (status, body) = ctx.get(&format!("/api/projects/{}", project_id)).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["currentStage"], "idea");
    assert_eq!(body["data"]["stages"][0]["type"], "idea");

    let (status, body) = ctx
        .put(
            &format!("/api/projects/{}", project_id),
            json!({"title": "Renamed"}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["title"], "Renamed");

    let (_, body) = ctx.get("/api/projects?ownerId=owner-1").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let response = ctx
        .client
        .delete(ctx.url(&format!("/api/projects/{}", project_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let (_, body) = ctx.get("/api/projects?ownerId=owner-1").await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_idea_is_rejected() {
    let ctx = setup_test_server(3).await;
    let (status, body) = ctx
        .post(
            "/api/projects",
            json!({"ownerId": "owner-1", "title": "Empty", "idea": "  "}),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn test_unknown_project_is_404() {
    let ctx = setup_test_server(3).await;
    let (status, body) = ctx.get("/api/projects/missing").await;
    assert_eq!(status, 404);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "project_not_found");
}

#[tokio::test]
async fn test_workflow_errors_map_to_status_codes() {
    let ctx = setup_test_server(3).await;
    let project_id = ctx.create_project().await;

    let (status, body) = ctx
        .post(
            &format!("/api/projects/{}/stages/idea/generate", project_id),
            json!({}),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "precondition_failed");

    let (status, body) = ctx
        .get(&format!("/api/projects/{}/stages/direction", project_id))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["code"], "stage_not_found");

    ctx.gateway
        .push_structured_error(AIServiceError::ApiError {
            status: 503,
            message: "overloaded".to_string(),
        });
    let (status, body) = ctx
        .post(
            &format!("/api/projects/{}/stages/direction/generate", project_id),
            json!({}),
        )
        .await;
    assert_eq!(status, 502);
    assert_eq!(body["code"], "gateway_failed");

    ctx.gateway
        .push_structured(json!({"directions": [{"title": "X"}]}));
    ctx.post(
        &format!("/api/projects/{}/stages/direction/generate", project_id),
        json!({}),
    )
    .await;
    let (status, body) = ctx
        .put(
            &format!("/api/projects/{}/stages/direction/select", project_id),
            json!({"selected_id": 1, "selected_ids": [1]}),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "invalid_selection");
}

#[tokio::test]
async fn test_stage_versions_endpoint() {
    let ctx = setup_test_server(3).await;
    let project_id = ctx.create_project().await;
    ctx.gateway
        .push_structured(json!({"directions": [{"title": "One"}]}))
        .push_structured(json!({"directions": [{"title": "Two"}]}));

    for _ in 0..2 {
        ctx.post(
            &format!("/api/projects/{}/stages/direction/generate", project_id),
            json!({}),
        )
        .await;
    }

    let (status, body) = ctx
        .get(&format!(
            "/api/projects/{}/stages/direction/versions/1",
            project_id
        ))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["outputData"]["directions"][0]["title"], "One");

    let (_, body) = ctx
        .get(&format!("/api/projects/{}/stages/direction", project_id))
        .await;
    assert_eq!(body["data"]["version"], 2);

    let (_, body) = ctx
        .get(&format!("/api/projects/{}/stages", project_id))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_feature_selection_endpoint() {
    let ctx = setup_test_server(3).await;
    let project_id = ctx.create_project().await;
    drive_to_features(&ctx, &project_id).await;

    let (status, body) = ctx
        .put(
            &format!(
                "/api/projects/{}/stages/features/select-features",
                project_id
            ),
            json!({"selected_ids": [1]}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "confirmed");
    assert_eq!(body["data"]["selectedOption"], json!({"selected_ids": [1]}));
}

#[tokio::test]
async fn test_demo_generation_stream() {
    let ctx = setup_test_server(3).await;
    let project_id = ctx.create_project().await;
    drive_to_features(&ctx, &project_id).await;

    ctx.gateway
        .push_structured(json!({
            "project_name": "Planner",
            "platforms": [{"type": "pc", "pages": [
                {"id": "p1", "name": "Home", "path": "/", "description": "Landing", "order": 1},
                {"id": "p2", "name": "Stats", "path": "/stats", "description": "Charts", "order": 2}
            ]}]
        }))
        .push_stream(["<div>home</div>"])
        .push_stream(["```jsx\n<div>stats</div>\n```"]);

    let (status, events) = read_stream(
        &ctx,
        &format!("/api/projects/{}/demo/generate/stream", project_id),
        json!({}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(
        event_names(&events),
        vec![
            "init",
            "page_start",
            "page_progress",
            "page_complete",
            "page_start",
            "page_progress",
            "page_complete",
            "complete"
        ]
    );
    assert_eq!(events[0].1["total_pages"], 2);
    assert_eq!(events[6].1["code"], "<div>stats</div>");

    let (_, body) = ctx
        .get(&format!("/api/projects/{}/demo/status", project_id))
        .await;
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["completed"], 2);

    let (_, body) = ctx
        .get(&format!("/api/projects/{}/demo/structure", project_id))
        .await;
    assert!(body["data"]["platforms"][0]["pages"][0].get("code").is_none());

    let (status, body) = ctx
        .get(&format!("/api/projects/{}/demo/pages/p1", project_id))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["code"], "<div>home</div>");

    // Page edits
    let (status, body) = ctx
        .post(
            &format!("/api/projects/{}/demo/pages/p2/skip", project_id),
            json!({"reason": "later"}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "skipped");

    let (status, body) = ctx
        .put(
            &format!("/api/projects/{}/demo/pages/p2", project_id),
            json!({"code": "<main/>"}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "completed");

    ctx.gateway.push_stream(["<div>home v2</div>"]);
    let (_, events) = read_stream(
        &ctx,
        &format!("/api/projects/{}/demo/modify", project_id),
        json!({"page_id": "p1", "instruction": "add a header"}),
    )
    .await;
    assert_eq!(
        event_names(&events),
        vec!["modify_start", "modify_progress", "modify_complete"]
    );
    assert_eq!(events[0].1["instruction"], "add a header");
}

#[tokio::test]
async fn test_stream_errors_before_streaming_are_json() {
    let ctx = setup_test_server(3).await;
    let project_id = ctx.create_project().await;

    let (status, body) = ctx
        .post(
            &format!("/api/projects/{}/demo/generate/stream", project_id),
            json!({}),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "precondition_failed");

    let (status, body) = ctx
        .post(
            &format!("/api/projects/{}/demo/pages/nope/regenerate", project_id),
            json!({}),
        )
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["code"], "stage_not_found");
}

#[tokio::test]
async fn test_stream_limit_returns_429() {
    let ctx = setup_test_server(0).await;
    let project_id = ctx.create_project().await;

    let (status, body) = ctx
        .post(
            &format!("/api/projects/{}/demo/generate/stream", project_id),
            json!({}),
        )
        .await;
    assert_eq!(status, 429);
    assert_eq!(body["code"], "too_many_streams");
}
