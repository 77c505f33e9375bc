//! Executor Dispatch
//!
//! Every node type maps to exactly one [`ExecutorType`], and every executor
//! type to one adapter:
//!
//! - `asset`: resolves synchronously from the node's asset payload
//! - polling providers (talking head, voiceover, animation): submit, then
//!   poll on a schedule
//! - callback compute (code render, audio mix, video merge, video compose):
//!   invoke once and wait for the callback
//!
//! The attempt is started before dispatch. Adapters never report completion by
//! return value; they write through the [`LifecycleTracker`] with the token of
//! that attempt.

pub mod asset;
pub mod compute;
mod inputs;
pub mod polling;

pub use polling::PollOutcome;

use montage_client::{ClientError, ComputeInvoker, GenerationProvider, MediaFetcher};
use montage_core::domain::execution::ExecutionToken;
use montage_core::domain::executor::ExecutorType;
use montage_core::domain::node::Node;
use montage_core::domain::pipeline::Pipeline;
use montage_core::schema::schema_for;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::lifecycle::LifecycleTracker;
use crate::repository::{Repository, RepositoryError};
use crate::scheduler::{PollCheck, Scheduler};
use crate::storage::{ObjectStorage, StorageError};

/// Metadata key under which callback executors record where output will land
pub const OUTPUT_KEY: &str = "output_key";

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Pipeline {0} not found")]
    PipelineNotFound(Uuid),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Input node {0} has no output")]
    InputUnavailable(Uuid),

    #[error("{0} is not a polling executor")]
    NotPolling(ExecutorType),

    #[error("{0}")]
    Asset(String),

    #[error("Invalid provider response: {0}")]
    InvalidProviderResponse(String),
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub default_bucket: String,
    pub callback_url: String,
    pub presign_ttl: Duration,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

impl From<&Config> for ExecutorSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_bucket: config.storage_bucket.clone(),
            callback_url: config.callback_url(),
            presign_ttl: config.presign_ttl,
            poll_interval: config.poll_interval,
            max_poll_attempts: config.max_poll_attempts,
        }
    }
}

/// Collaborators shared by every adapter
#[derive(Clone)]
pub struct ExecutorContext {
    pub repo: Arc<dyn Repository>,
    pub lifecycle: LifecycleTracker,
    pub storage: Arc<dyn ObjectStorage>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub scheduler: Arc<dyn Scheduler>,
    pub settings: ExecutorSettings,
}

impl ExecutorContext {
    async fn pipeline(&self, id: Uuid) -> Result<Pipeline, ExecutorError> {
        self.repo
            .find_pipeline(id)
            .await?
            .ok_or(ExecutorError::PipelineNotFound(id))
    }

    /// The pipeline of a running attempt; the attempt fails if it is gone
    async fn attempt_pipeline(
        &self,
        node: &Node,
        token: ExecutionToken,
    ) -> Result<Pipeline, ExecutorError> {
        match self.pipeline(node.pipeline_id).await {
            Ok(pipeline) => Ok(pipeline),
            Err(e) => {
                self.lifecycle.fail(node.id, e.to_string(), token).await?;
                Err(e)
            }
        }
    }

    fn bucket<'a>(&'a self, pipeline: &'a Pipeline) -> &'a str {
        pipeline.bucket(&self.settings.default_bucket)
    }

    /// Fresh storage key for one artifact of `node`
    ///
    /// Every attempt writes to its own key, so a superseded attempt can never
    /// overwrite the output of the one that replaced it.
    fn output_key(&self, pipeline: &Pipeline, node: &Node, media_type: &str) -> String {
        format!(
            "{}/{}/{}.{}",
            pipeline.output_prefix(),
            node.id,
            Uuid::new_v4(),
            extension_for(media_type)
        )
    }
}

fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "text/plain" => "txt",
        _ => "bin",
    }
}

/// One client per external service
#[derive(Clone)]
pub struct Providers {
    pub talking_head: Arc<dyn GenerationProvider>,
    pub voiceover: Arc<dyn GenerationProvider>,
    pub animation: Arc<dyn GenerationProvider>,
    pub compute: Arc<dyn ComputeInvoker>,
}

pub struct Dispatcher {
    ctx: ExecutorContext,
    providers: Providers,
}

impl Dispatcher {
    pub fn new(ctx: ExecutorContext, providers: Providers) -> Self {
        Self { ctx, providers }
    }

    pub fn context(&self) -> &ExecutorContext {
        &self.ctx
    }

    /// Run the executor for `node` until it has handed off or resolved
    ///
    /// `node` must already be running under `token`.
    pub async fn run(&self, node: Node, token: ExecutionToken) -> Result<(), ExecutorError> {
        let kind = node
            .kind()
            .ok_or_else(|| ExecutorError::UnknownNodeType(node.node_type.clone()))?;
        let schema = schema_for(kind);
        let executor_type = ExecutorType::for_node(kind);

        tracing::info!("Dispatching node {} to {} executor", node.id, executor_type);

        match executor_type {
            ExecutorType::Asset => asset::execute(&self.ctx, node, token).await,
            ExecutorType::TalkingHead => {
                polling::submit(
                    &self.ctx,
                    self.providers.talking_head.as_ref(),
                    executor_type,
                    schema,
                    node,
                    token,
                )
                .await
            }
            ExecutorType::Voiceover => {
                polling::submit(
                    &self.ctx,
                    self.providers.voiceover.as_ref(),
                    executor_type,
                    schema,
                    node,
                    token,
                )
                .await
            }
            ExecutorType::Animation => {
                polling::submit(
                    &self.ctx,
                    self.providers.animation.as_ref(),
                    executor_type,
                    schema,
                    node,
                    token,
                )
                .await
            }
            ExecutorType::CodeRender
            | ExecutorType::AudioMix
            | ExecutorType::VideoMerge
            | ExecutorType::VideoCompose => {
                compute::invoke(
                    &self.ctx,
                    self.providers.compute.as_ref(),
                    executor_type,
                    schema,
                    node,
                    token,
                )
                .await
            }
        }
    }

    /// Run one scheduled status check
    pub async fn check(&self, check: PollCheck) -> Result<PollOutcome, ExecutorError> {
        let provider = match check.executor_type {
            ExecutorType::TalkingHead => &self.providers.talking_head,
            ExecutorType::Voiceover => &self.providers.voiceover,
            ExecutorType::Animation => &self.providers.animation,
            other => return Err(ExecutorError::NotPolling(other)),
        };

        polling::check(&self.ctx, provider.as_ref(), check).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use montage_core::domain::node::NodeStatus;

    #[test]
    fn test_extension_for_media_types() {
        assert_eq!(extension_for("video/mp4"), "mp4");
        assert_eq!(extension_for("audio/mpeg"), "mp3");
        assert_eq!(extension_for("application/x-unknown"), "bin");
    }

    #[tokio::test]
    async fn test_output_keys_are_unique_per_attempt() {
        let harness = Harness::new().await;
        let node = Node::new(harness.pipeline.id, "voice", "generate-voiceover");
        let ctx = harness.context();

        let a = ctx.output_key(&harness.pipeline, &node, "audio/mpeg");
        let b = ctx.output_key(&harness.pipeline, &node, "audio/mpeg");

        assert_ne!(a, b);
        assert!(a.starts_with(&format!("pipelines/{}/{}/", harness.pipeline.id, node.id)));
        assert!(a.ends_with(".mp3"));
    }

    #[tokio::test]
    async fn test_unknown_node_type_is_fatal() {
        let harness = Harness::new().await;
        let node = harness
            .insert(Node::new(harness.pipeline.id, "x", "generate-hologram"))
            .await;

        let err = harness
            .dispatcher()
            .run(node.clone(), ExecutionToken::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::UnknownNodeType(t) if t == "generate-hologram"));
        assert_eq!(harness.node(node.id).await.status(), NodeStatus::Pending);
    }

    #[tokio::test]
    async fn test_check_rejects_callback_executors() {
        let harness = Harness::new().await;
        let err = harness
            .dispatcher()
            .check(PollCheck {
                node_id: Uuid::new_v4(),
                token: ExecutionToken::generate(),
                executor_type: ExecutorType::VideoMerge,
                provider_job_id: "job".to_string(),
                attempt: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::NotPolling(ExecutorType::VideoMerge)));
    }
}
