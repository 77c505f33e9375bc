//! In-process stand-ins for the external services
//!
//! Scripted providers, a recording compute invoker, a static media fetcher
//! and a scheduler that keeps its checks, used to drive executors without a
//! network. Built for this crate's tests and behind the `test-util` feature.

use async_trait::async_trait;
use montage_client::media::Media;
use montage_client::{ClientError, ComputeInvoker, GenerationProvider, MediaFetcher};
use montage_core::dto::provider::{
    ComputeInvocation, GenerationRequest, InvocationAck, StatusResponse, SubmitResponse,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::scheduler::{PollCheck, Scheduler};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Generation Provider
// =============================================================================

/// Replays queued responses
///
/// With an empty queue, submissions get a fresh job id and status queries
/// report pending.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    submits: Mutex<VecDeque<Result<SubmitResponse, ClientError>>>,
    statuses: Mutex<VecDeque<Result<StatusResponse, ClientError>>>,
    submitted: Mutex<Vec<GenerationRequest>>,
    status_calls: Mutex<usize>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_submit(&self, response: SubmitResponse) {
        lock(&self.submits).push_back(Ok(response));
    }

    pub fn fail_submit(&self, error: ClientError) {
        lock(&self.submits).push_back(Err(error));
    }

    pub fn on_status(&self, response: Result<StatusResponse, ClientError>) {
        lock(&self.statuses).push_back(response);
    }

    pub fn submitted(&self) -> Vec<GenerationRequest> {
        lock(&self.submitted).clone()
    }

    pub fn status_calls(&self) -> usize {
        *lock(&self.status_calls)
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn submit(&self, request: &GenerationRequest) -> montage_client::Result<SubmitResponse> {
        let count = {
            let mut submitted = lock(&self.submitted);
            submitted.push(request.clone());
            submitted.len()
        };

        lock(&self.submits).pop_front().unwrap_or_else(|| {
            Ok(SubmitResponse {
                job_id: Some(format!("job-{count}")),
                ..SubmitResponse::default()
            })
        })
    }

    async fn status(&self, _job_id: &str) -> montage_client::Result<StatusResponse> {
        *lock(&self.status_calls) += 1;
        lock(&self.statuses)
            .pop_front()
            .unwrap_or_else(|| Ok(StatusResponse::pending()))
    }
}

// =============================================================================
// Compute Invoker
// =============================================================================

#[derive(Debug, Default)]
pub struct RecordingInvoker {
    invocations: Mutex<Vec<ComputeInvocation>>,
    failures: Mutex<VecDeque<ClientError>>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next invocation fail with `error`
    pub fn fail_next(&self, error: ClientError) {
        lock(&self.failures).push_back(error);
    }

    pub fn invocations(&self) -> Vec<ComputeInvocation> {
        lock(&self.invocations).clone()
    }
}

#[async_trait]
impl ComputeInvoker for RecordingInvoker {
    async fn invoke(&self, invocation: &ComputeInvocation) -> montage_client::Result<InvocationAck> {
        if let Some(error) = lock(&self.failures).pop_front() {
            return Err(error);
        }
        lock(&self.invocations).push(invocation.clone());
        Ok(InvocationAck {
            status: InvocationAck::INVOKED.to_string(),
        })
    }
}

// =============================================================================
// Media Fetcher
// =============================================================================

/// Serves fixed bytes per URL; anything else is a 404
#[derive(Debug, Default)]
pub struct StaticFetcher {
    media: Mutex<HashMap<String, Media>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: impl Into<String>, bytes: &[u8], content_type: Option<&str>) {
        lock(&self.media).insert(
            url.into(),
            Media {
                bytes: bytes.to_vec(),
                content_type: content_type.map(str::to_string),
            },
        );
    }
}

#[async_trait]
impl MediaFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> montage_client::Result<Media> {
        lock(&self.media)
            .get(url)
            .cloned()
            .ok_or_else(|| ClientError::api_error(404, format!("No media at {url}")))
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Keeps every scheduled check instead of running it
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    scheduled: Mutex<Vec<(Duration, PollCheck)>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain everything scheduled so far
    pub fn take(&self) -> Vec<(Duration, PollCheck)> {
        std::mem::take(&mut *lock(&self.scheduled))
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule(&self, after: Duration, check: PollCheck) {
        lock(&self.scheduled).push((after, check));
    }
}

// =============================================================================
// Unit Test Harness
// =============================================================================

#[cfg(test)]
pub(crate) use harness::Harness;

#[cfg(test)]
mod harness {
    use super::*;
    use crate::executor::{Dispatcher, ExecutorContext, ExecutorError, ExecutorSettings, Providers};
    use crate::lifecycle::{LifecycleTracker, Started};
    use crate::repository::{InMemoryRepository, NodeRepository, PipelineRepository};
    use crate::storage::{MemoryStorage, ObjectStorage};
    use montage_core::domain::execution::{ExecutionState, OutputDescriptor};
    use montage_core::domain::node::{Node, NodeMetadata};
    use montage_core::domain::pipeline::Pipeline;
    use std::sync::Arc;
    use uuid::Uuid;

    pub(crate) struct Harness {
        pub repo: Arc<InMemoryRepository>,
        pub storage: Arc<MemoryStorage>,
        pub scheduler: Arc<RecordingScheduler>,
        pub fetcher: Arc<StaticFetcher>,
        pub talking_head: Arc<ScriptedProvider>,
        pub voiceover: Arc<ScriptedProvider>,
        pub animation: Arc<ScriptedProvider>,
        pub compute: Arc<RecordingInvoker>,
        pub pipeline: Pipeline,
        dispatcher: Arc<Dispatcher>,
    }

    impl Harness {
        pub async fn new() -> Self {
            let repo = Arc::new(InMemoryRepository::new());
            let pipeline = Pipeline::new("harness");
            repo.insert_pipeline(&pipeline).await.unwrap();

            let storage = Arc::new(MemoryStorage::new());
            let scheduler = Arc::new(RecordingScheduler::new());
            let fetcher = Arc::new(StaticFetcher::new());
            let talking_head = Arc::new(ScriptedProvider::new());
            let voiceover = Arc::new(ScriptedProvider::new());
            let animation = Arc::new(ScriptedProvider::new());
            let compute = Arc::new(RecordingInvoker::new());

            let ctx = ExecutorContext {
                repo: repo.clone(),
                lifecycle: LifecycleTracker::new(repo.clone()),
                storage: storage.clone(),
                fetcher: fetcher.clone(),
                scheduler: scheduler.clone(),
                settings: ExecutorSettings {
                    default_bucket: "media".to_string(),
                    callback_url: "http://orchestrator.test/callback".to_string(),
                    presign_ttl: Duration::from_secs(3600),
                    poll_interval: Duration::from_secs(5),
                    max_poll_attempts: 3,
                },
            };
            let providers = Providers {
                talking_head: talking_head.clone(),
                voiceover: voiceover.clone(),
                animation: animation.clone(),
                compute: compute.clone(),
            };

            Self {
                repo,
                storage,
                scheduler,
                fetcher,
                talking_head,
                voiceover,
                animation,
                compute,
                pipeline,
                dispatcher: Arc::new(Dispatcher::new(ctx, providers)),
            }
        }

        pub fn context(&self) -> &ExecutorContext {
            self.dispatcher.context()
        }

        pub fn dispatcher(&self) -> &Arc<Dispatcher> {
            &self.dispatcher
        }

        pub fn bucket(&self) -> String {
            self.context().settings.default_bucket.clone()
        }

        pub async fn insert(&self, node: Node) -> Node {
            self.repo.insert_node(&node).await.unwrap();
            node
        }

        pub async fn storage_object(&self, key: &str, bytes: &[u8]) {
            self.storage
                .upload(key, bytes.to_vec(), "application/octet-stream", &self.bucket())
                .await
                .unwrap();
        }

        /// Insert a node that already completed with an artifact at `key`
        pub async fn completed(&self, title: &str, node_type: &str, key: &str) -> Node {
            self.storage_object(key, &[0; 8]).await;

            let mut node = Node::new(self.pipeline.id, title, node_type);
            node.is_valid = true;
            node.execution = ExecutionState::Completed {
                token: None,
                started_at: None,
                completed_at: chrono::Utc::now(),
                output: OutputDescriptor {
                    key: key.to_string(),
                    media_type: "application/octet-stream".to_string(),
                    size_bytes: 8,
                    duration_seconds: None,
                },
            };
            self.insert(node).await
        }

        pub async fn start(&self, node: &Node) -> Started {
            self.context()
                .lifecycle
                .start(node.id, NodeMetadata::default())
                .await
                .unwrap()
        }

        /// Start `node` and hand it to its executor
        pub async fn run(&self, node: &Node) -> Result<(), ExecutorError> {
            let started = self.start(node).await;
            self.dispatcher.run(started.node, started.token).await
        }

        pub async fn node(&self, id: Uuid) -> Node {
            self.repo.find_node(id).await.unwrap().unwrap()
        }

        pub async fn reload_pipeline(&self) -> Pipeline {
            self.repo.find_pipeline(self.pipeline.id).await.unwrap().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_core::domain::execution::ExecutionToken;
    use montage_core::domain::executor::ExecutorType;
    use uuid::Uuid;

    #[test]
    fn test_recording_scheduler_drains() {
        let scheduler = RecordingScheduler::new();
        scheduler.schedule(
            Duration::from_secs(5),
            PollCheck {
                node_id: Uuid::new_v4(),
                token: ExecutionToken::generate(),
                executor_type: ExecutorType::Voiceover,
                provider_job_id: "job-1".to_string(),
                attempt: 1,
            },
        );

        assert_eq!(scheduler.take().len(), 1);
        assert!(scheduler.take().is_empty());
    }
}
