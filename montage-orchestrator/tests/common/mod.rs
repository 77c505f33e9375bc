#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use montage_core::domain::node::{Node, NodeStatus};
use montage_core::dto::provider::ComputeInvocation;
use montage_orchestrator::app::{App, Backends};
use montage_orchestrator::executor::{ExecutorSettings, Providers};
use montage_orchestrator::repository::{InMemoryRepository, NodeRepository};
use montage_orchestrator::scheduler::PollCheck;
use montage_orchestrator::storage::MemoryStorage;
use montage_orchestrator::testing::{
    RecordingInvoker, RecordingScheduler, ScriptedProvider, StaticFetcher,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

pub const MAX_POLL_ATTEMPTS: u32 = 4;

pub struct TestApp {
    pub app: App,
    pub repo: Arc<InMemoryRepository>,
    pub storage: Arc<MemoryStorage>,
    pub scheduler: Arc<RecordingScheduler>,
    pub fetcher: Arc<StaticFetcher>,
    pub talking_head: Arc<ScriptedProvider>,
    pub voiceover: Arc<ScriptedProvider>,
    pub animation: Arc<ScriptedProvider>,
    pub compute: Arc<RecordingInvoker>,
}

impl TestApp {
    pub fn new() -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let storage = Arc::new(MemoryStorage::new());
        let scheduler = Arc::new(RecordingScheduler::new());
        let fetcher = Arc::new(StaticFetcher::new());
        let talking_head = Arc::new(ScriptedProvider::new());
        let voiceover = Arc::new(ScriptedProvider::new());
        let animation = Arc::new(ScriptedProvider::new());
        let compute = Arc::new(RecordingInvoker::new());

        let settings = ExecutorSettings {
            default_bucket: "media".to_string(),
            callback_url: "http://orchestrator.test/callback".to_string(),
            presign_ttl: Duration::from_secs(600),
            poll_interval: Duration::from_secs(10),
            max_poll_attempts: MAX_POLL_ATTEMPTS,
        };
        let app = App::new(
            settings,
            Backends {
                repo: repo.clone(),
                storage: storage.clone(),
                fetcher: fetcher.clone(),
                scheduler: scheduler.clone(),
                providers: Providers {
                    talking_head: talking_head.clone(),
                    voiceover: voiceover.clone(),
                    animation: animation.clone(),
                    compute: compute.clone(),
                },
            },
        );

        Self {
            app,
            repo,
            storage,
            scheduler,
            fetcher,
            talking_head,
            voiceover,
            animation,
            compute,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn create_pipeline(&self) -> Uuid {
        let (status, body) = self
            .post("/pipeline/create", json!({ "title": "launch video" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn create_node(&self, body: Value) -> Uuid {
        let (status, body) = self.post("/node/create", body).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn execute(&self, id: Uuid) -> (StatusCode, Value) {
        self.post(&format!("/node/{id}/execute"), json!({})).await
    }

    pub async fn node(&self, id: Uuid) -> Node {
        self.repo.find_node(id).await.unwrap().unwrap()
    }

    /// Wait for the spawned executor to move `id` into `status`
    pub async fn wait_for(&self, id: Uuid, status: NodeStatus) -> Node {
        for _ in 0..200 {
            let node = self.node(id).await;
            if node.status() == status {
                return node;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("node {id} never reached {status}, last seen {}", self.node(id).await.status());
    }

    /// Wait for the `n`th (0-based) compute invocation
    pub async fn invocation(&self, n: usize) -> ComputeInvocation {
        for _ in 0..200 {
            if let Some(invocation) = self.compute.invocations().get(n) {
                return invocation.clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("compute was never invoked {} time(s)", n + 1);
    }

    /// Wait until a polling executor has handed off to the scheduler
    pub async fn next_check(&self) -> PollCheck {
        for _ in 0..200 {
            if let Some((_, check)) = self.scheduler.take().into_iter().next() {
                return check;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no poll check was scheduled");
    }
}
