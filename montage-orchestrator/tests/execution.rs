mod common;

use axum::http::StatusCode;
use common::{MAX_POLL_ATTEMPTS, TestApp};
use montage_core::domain::node::NodeStatus;
use montage_core::dto::provider::{GenerationStatus, StatusResponse, SubmitResponse};
use montage_orchestrator::executor::PollOutcome;
use montage_orchestrator::scheduler::PollCheck;
use montage_orchestrator::storage::ObjectStorage;
use serde_json::json;
use uuid::Uuid;

async fn asset(app: &TestApp, pipeline_id: Uuid, key: &str) -> Uuid {
    app.storage
        .upload(key, vec![1; 32], "video/mp4", "media")
        .await
        .unwrap();
    let id = app
        .create_node(json!({
            "pipeline_id": pipeline_id,
            "title": key,
            "type": "asset",
            "config": { "media_type": "video" },
            "asset": { "key": key },
        }))
        .await;

    let (status, _) = app.execute(id).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    app.wait_for(id, NodeStatus::Completed).await;
    id
}

async fn voiceover(app: &TestApp, pipeline_id: Uuid) -> Uuid {
    app.create_node(json!({
        "pipeline_id": pipeline_id,
        "title": "narration",
        "type": "generate-voiceover",
        "config": { "voice_id": "v1", "text": "Welcome to the launch" },
    }))
    .await
}

#[tokio::test]
async fn test_merge_videos_invocation_and_callback() {
    let app = TestApp::new();
    let pipeline_id = app.create_pipeline().await;
    let intro = asset(&app, pipeline_id, "clips/intro.mp4").await;
    let demo = asset(&app, pipeline_id, "clips/demo.mp4").await;
    let outro = asset(&app, pipeline_id, "clips/outro.mp4").await;

    let merged = app
        .create_node(json!({
            "pipeline_id": pipeline_id,
            "title": "merged",
            "type": "merge-videos",
            "inputs": { "segments": [outro, intro, demo] },
            "config": { "transition": "fade" },
        }))
        .await;

    let (status, body) = app.execute(merged).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["id"], merged.to_string());
    assert_eq!(body["status"], "in_progress");

    let invocation = app.invocation(0).await;
    assert_eq!(app.node(merged).await.status(), NodeStatus::InProgress);
    assert_eq!(
        invocation.input_refs,
        vec!["clips/outro.mp4", "clips/intro.mp4", "clips/demo.mp4"]
    );
    assert_eq!(invocation.output_location.bucket, "media");

    let (status, body) = app
        .post(
            "/callback",
            json!({
                "node_id": merged,
                "executor_type": "video_merge",
                "result": { "outputKey": invocation.output_location.key, "sizeBytes": 2048 },
                "process_token": invocation.token.to_string(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["output"]["key"], invocation.output_location.key);

    // A duplicate delivery changes nothing
    let (status, _) = app
        .post(
            "/callback",
            json!({
                "node_id": merged,
                "executor_type": "video_merge",
                "error": { "message": "late", "type": "RenderError" },
                "process_token": invocation.token.to_string(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.node(merged).await.status(), NodeStatus::Completed);

    let (_, progress) = app.get(&format!("/pipeline/{pipeline_id}/progress")).await;
    assert_eq!(progress["completed"], 4);
}

#[tokio::test]
async fn test_retry_makes_earlier_callback_stale() {
    let app = TestApp::new();
    let pipeline_id = app.create_pipeline().await;
    let track = asset(&app, pipeline_id, "audio/track.mp3").await;
    let mix = app
        .create_node(json!({
            "pipeline_id": pipeline_id,
            "title": "mix",
            "type": "mix-audio",
            "inputs": { "tracks": [track] },
        }))
        .await;

    app.execute(mix).await;
    let first = app.invocation(0).await;

    let (status, _) = app
        .post(
            "/callback",
            json!({
                "node_id": mix,
                "executor_type": "audio_mix",
                "error": { "message": "out of memory" },
                "process_token": first.token.to_string(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.node(mix).await.execution.error(),
        Some("Error: out of memory")
    );

    let (status, _) = app.execute(mix).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let second = app.invocation(1).await;
    assert_ne!(first.token, second.token);

    let (status, _) = app
        .post(
            "/callback",
            json!({
                "node_id": mix,
                "executor_type": "audio_mix",
                "result": { "output_key": "late/first.mp3" },
                "process_token": first.token.to_string(),
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let node = app.node(mix).await;
    assert_eq!(node.status(), NodeStatus::InProgress);
    assert_eq!(node.execution.token(), Some(second.token));
}

#[tokio::test]
async fn test_second_execute_of_running_node_conflicts() {
    let app = TestApp::new();
    let pipeline_id = app.create_pipeline().await;
    let voice = voiceover(&app, pipeline_id).await;

    let (first, accepted) = app.execute(voice).await;
    let (second, rejected) = app.execute(voice).await;
    assert_eq!(first, StatusCode::ACCEPTED);
    assert_eq!(second, StatusCode::CONFLICT, "{rejected}");

    app.next_check().await;
    assert_eq!(app.voiceover.submitted().len(), 1);
    let node = app.node(voice).await;
    assert_eq!(node.status(), NodeStatus::InProgress);
    assert_eq!(
        accepted["metadata"]["execution_token"],
        node.execution.token().unwrap().to_string()
    );
}

#[tokio::test]
async fn test_voiceover_polls_until_complete() {
    let app = TestApp::new();
    let pipeline_id = app.create_pipeline().await;
    let voice = voiceover(&app, pipeline_id).await;
    app.voiceover.on_submit(SubmitResponse {
        job_id: Some("vo-42".to_string()),
        cost: Some(0.25),
        ..SubmitResponse::default()
    });

    app.execute(voice).await;
    let check = app.next_check().await;
    assert_eq!(check.provider_job_id, "vo-42");
    assert_eq!(check.attempt, 1);

    app.voiceover.on_status(Ok(StatusResponse {
        status: GenerationStatus::Processing,
        ..StatusResponse::pending()
    }));
    let outcome = app.app.dispatcher.check(check).await.unwrap();
    assert_eq!(outcome, PollOutcome::Rescheduled);

    let check = app.next_check().await;
    assert_eq!(check.attempt, 2);
    app.fetcher
        .serve("https://voice.example/vo-42.mp3", b"mp3-bytes", Some("audio/mpeg"));
    app.voiceover.on_status(Ok(StatusResponse {
        status: GenerationStatus::Completed,
        url: Some("https://voice.example/vo-42.mp3".to_string()),
        duration_seconds: Some(3.2),
        ..StatusResponse::pending()
    }));
    let outcome = app.app.dispatcher.check(check).await.unwrap();
    assert_eq!(outcome, PollOutcome::Completed);

    let node = app.node(voice).await;
    let output = node.output().unwrap();
    assert_eq!(output.media_type, "audio/mpeg");
    assert_eq!(output.size_bytes, 9);
    assert_eq!(node.metadata.provider_job_id.as_deref(), Some("vo-42"));

    let (_, pipeline) = app.get(&format!("/pipeline/{pipeline_id}")).await;
    assert_eq!(pipeline["metadata"]["total_cost"], 0.25);
}

#[tokio::test]
async fn test_polling_times_out_after_max_attempts() {
    let app = TestApp::new();
    let pipeline_id = app.create_pipeline().await;
    let voice = voiceover(&app, pipeline_id).await;

    app.execute(voice).await;
    let mut check = app.next_check().await;
    for attempt in 1..MAX_POLL_ATTEMPTS {
        assert_eq!(check.attempt, attempt);
        let outcome = app.app.dispatcher.check(check).await.unwrap();
        assert_eq!(outcome, PollOutcome::Rescheduled);
        check = app.next_check().await;
    }

    let outcome = app.app.dispatcher.check(check).await.unwrap();
    assert_eq!(outcome, PollOutcome::TimedOut);
    assert_eq!(app.voiceover.status_calls(), MAX_POLL_ATTEMPTS as usize);
    assert!(app.scheduler.take().is_empty());

    let node = app.node(voice).await;
    assert_eq!(node.status(), NodeStatus::Failed);
    assert_eq!(
        node.execution.error(),
        Some(format!("Polling timeout after {MAX_POLL_ATTEMPTS} attempts").as_str())
    );
}

#[tokio::test]
async fn test_check_past_limit_never_queries_provider() {
    let app = TestApp::new();
    let pipeline_id = app.create_pipeline().await;
    let voice = voiceover(&app, pipeline_id).await;

    app.execute(voice).await;
    let check = app.next_check().await;
    let outcome = app
        .app
        .dispatcher
        .check(PollCheck {
            attempt: MAX_POLL_ATTEMPTS + 1,
            ..check
        })
        .await
        .unwrap();

    assert_eq!(outcome, PollOutcome::TimedOut);
    assert_eq!(app.voiceover.status_calls(), 0);
    assert_eq!(app.node(voice).await.status(), NodeStatus::Failed);
}

#[tokio::test]
async fn test_talking_head_waits_for_voiceover() {
    let app = TestApp::new();
    let pipeline_id = app.create_pipeline().await;
    let voice = voiceover(&app, pipeline_id).await;
    let head = app
        .create_node(json!({
            "pipeline_id": pipeline_id,
            "title": "presenter",
            "type": "generate-talking-head",
            "inputs": { "audio": voice },
            "config": { "avatar_id": "anna" },
        }))
        .await;

    let (status, _) = app.execute(head).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.fetcher.serve("https://voice.example/inline.mp3", b"abc", None);
    app.voiceover.on_submit(SubmitResponse {
        status: Some(GenerationStatus::Completed),
        url: Some("https://voice.example/inline.mp3".to_string()),
        ..SubmitResponse::default()
    });
    app.execute(voice).await;
    let voice_node = app.wait_for(voice, NodeStatus::Completed).await;

    let (status, _) = app.execute(head).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    app.next_check().await;

    let requests = app.talking_head.submitted();
    assert_eq!(requests.len(), 1);
    let audio_url = serde_json::to_value(&requests[0].inputs["audio"]).unwrap();
    assert_eq!(
        audio_url,
        json!(format!(
            "memory://media/{}?ttl=600",
            voice_node.output().unwrap().key
        ))
    );
}
