mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use montage_core::domain::node::NodeStatus;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_create_and_get_node() {
    let app = TestApp::new();
    let pipeline_id = app.create_pipeline().await;

    let id = app
        .create_node(json!({
            "pipeline_id": pipeline_id,
            "title": "voice",
            "type": "generate-voiceover",
            "config": { "voice_id": "v1" },
        }))
        .await;

    let (status, body) = app.get(&format!("/node/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "generate-voiceover");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["is_valid"], false);
    assert_eq!(body["validation_errors"]["text"], "text is required");
}

#[tokio::test]
async fn test_unknown_node_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app.get(&format!("/node/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_node_in_unknown_pipeline_is_rejected() {
    let app = TestApp::new();
    let (status, _) = app
        .post(
            "/node/create",
            json!({ "pipeline_id": Uuid::new_v4(), "title": "x", "type": "asset" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_schema_endpoints() {
    let app = TestApp::new();

    let (status, body) = app.get("/schema").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 8);

    let (status, body) = app.get("/schema/merge-videos").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["node_type"], "merge-videos");
    assert_eq!(body["inputs"][0]["name"], "segments");

    let (status, _) = app.get("/schema/generate-hologram").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_execute_not_ready_is_conflict() {
    let app = TestApp::new();
    let pipeline_id = app.create_pipeline().await;
    let voice = app
        .create_node(json!({
            "pipeline_id": pipeline_id,
            "title": "voice",
            "type": "generate-voiceover",
            "config": { "voice_id": "v1", "text": "hello" },
        }))
        .await;
    let head = app
        .create_node(json!({
            "pipeline_id": pipeline_id,
            "title": "head",
            "type": "generate-talking-head",
            "inputs": { "audio": voice },
            "config": { "avatar_id": "anna", "resolution": "8k" },
        }))
        .await;

    let (status, body) = app.execute(head).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("node is invalid"));
    assert!(message.contains("resolution"));
    assert!(message.contains(&format!("{voice} is pending")));
    assert!(app.talking_head.submitted().is_empty());
}

#[tokio::test]
async fn test_execute_unknown_type_is_unprocessable() {
    let app = TestApp::new();
    let pipeline_id = app.create_pipeline().await;
    let id = app
        .create_node(json!({ "pipeline_id": pipeline_id, "title": "x", "type": "generate-hologram" }))
        .await;

    let (status, _) = app.execute(id).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_delete_node_detaches_references() {
    let app = TestApp::new();
    let pipeline_id = app.create_pipeline().await;
    let a = app
        .create_node(json!({ "pipeline_id": pipeline_id, "title": "a", "type": "asset", "config": { "media_type": "video" } }))
        .await;
    let b = app
        .create_node(json!({ "pipeline_id": pipeline_id, "title": "b", "type": "asset", "config": { "media_type": "video" } }))
        .await;
    let merged = app
        .create_node(json!({
            "pipeline_id": pipeline_id,
            "title": "merged",
            "type": "merge-videos",
            "inputs": { "segments": [a, b] },
        }))
        .await;
    assert!(app.node(merged).await.is_valid);

    let (status, _) = app
        .request(Method::DELETE, &format!("/node/{a}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.get(&format!("/node/{merged}")).await;
    assert_eq!(body["inputs"]["segments"], json!([b]));
    assert_eq!(body["is_valid"], false);
}

#[tokio::test]
async fn test_update_node_revalidates() {
    let app = TestApp::new();
    let pipeline_id = app.create_pipeline().await;
    let id = app
        .create_node(json!({ "pipeline_id": pipeline_id, "title": "logo", "type": "asset" }))
        .await;

    let (status, body) = app
        .request(
            Method::PATCH,
            &format!("/node/{id}"),
            Some(json!({ "config": { "media_type": "image" } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_valid"], true);
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn test_callback_errors() {
    let app = TestApp::new();
    let pipeline_id = app.create_pipeline().await;
    let id = app
        .create_node(json!({
            "pipeline_id": pipeline_id,
            "title": "mix",
            "type": "mix-audio",
        }))
        .await;

    let (status, _) = app
        .post(
            "/callback",
            json!({ "node_id": id, "executor_type": "teleport", "result": {} }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .post(
            "/callback",
            json!({ "node_id": Uuid::new_v4(), "executor_type": "audio_mix", "result": {} }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post("/callback", json!({ "node_id": id, "executor_type": "audio_mix" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.node(id).await.status(), NodeStatus::Pending);
}

#[tokio::test]
async fn test_pipeline_progress_and_delete() {
    let app = TestApp::new();
    let pipeline_id = app.create_pipeline().await;
    app.create_node(json!({ "pipeline_id": pipeline_id, "title": "a", "type": "asset" }))
        .await;

    let (status, body) = app.get(&format!("/pipeline/{pipeline_id}/progress")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["pending"], 1);
    assert_eq!(body["invalid"], 1);

    let (status, _) = app
        .request(Method::DELETE, &format!("/pipeline/{pipeline_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/pipeline/{pipeline_id}/progress")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
