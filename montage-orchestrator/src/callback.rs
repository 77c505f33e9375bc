//! Callback Processor
//!
//! Applies completion signals posted by the compute service. A callback is
//! stale when its node has no attempt in progress or when it carries a token
//! other than the one the current attempt was started with. Tokenless
//! callbacks are still accepted for a running node. The authoritative check is
//! the guarded transition; the read beforehand only lets obviously stale
//! callbacks out early.

use montage_core::domain::execution::{ExecutionToken, OutputDescriptor, TransitionOutcome};
use montage_core::domain::executor::{ExecutorType, UnknownExecutorType};
use montage_core::domain::node::{Node, NodeStatus};
use montage_core::dto::callback::{CallbackOutcome, CallbackPayload};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::executor::OUTPUT_KEY;
use crate::lifecycle::LifecycleTracker;
use crate::repository::{Repository, RepositoryError};

pub const MISSING_OUTPUT_KEY: &str = "Callback result missing output key";

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error(transparent)]
    UnknownExecutor(#[from] UnknownExecutorType),

    #[error("Callback for node {0} carries neither a result nor an error")]
    MissingOutcome(Uuid),

    #[error("Node {0} not found")]
    NodeNotFound(Uuid),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Node {node_id} runs on {expected}, callback came from {got}")]
    ExecutorMismatch {
        node_id: Uuid,
        expected: ExecutorType,
        got: ExecutorType,
    },

    #[error("Stale callback for node {0}")]
    StaleCallback(Uuid),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Clone)]
pub struct CallbackProcessor {
    repo: Arc<dyn Repository>,
    lifecycle: LifecycleTracker,
}

impl CallbackProcessor {
    pub fn new(repo: Arc<dyn Repository>, lifecycle: LifecycleTracker) -> Self {
        Self { repo, lifecycle }
    }

    /// Apply `payload`, returning the node as it stands afterwards
    pub async fn handle(&self, payload: CallbackPayload) -> Result<Node, CallbackError> {
        let node_id = payload.node_id;
        let executor_type: ExecutorType = payload.executor_type.parse()?;
        let outcome = payload
            .outcome()
            .ok_or(CallbackError::MissingOutcome(node_id))?;

        let token = match payload.process_token.as_deref() {
            Some(raw) => match raw.parse::<ExecutionToken>() {
                Ok(token) => Some(token),
                Err(_) => {
                    tracing::warn!("Malformed token on callback for node {}", node_id);
                    return Err(CallbackError::StaleCallback(node_id));
                }
            },
            None => None,
        };

        let node = self
            .repo
            .find_node(node_id)
            .await?
            .ok_or(CallbackError::NodeNotFound(node_id))?;
        let kind = node
            .kind()
            .ok_or_else(|| CallbackError::UnknownNodeType(node.node_type.clone()))?;
        let expected = ExecutorType::for_node(kind);
        if expected != executor_type {
            return Err(CallbackError::ExecutorMismatch {
                node_id,
                expected,
                got: executor_type,
            });
        }

        let status = node.status();
        if status != NodeStatus::InProgress {
            tracing::debug!("Callback for node {} arrived while it was {}", node_id, status);
            return Err(CallbackError::StaleCallback(node_id));
        }
        match token {
            Some(token) if node.execution.token() != Some(token) => {
                tracing::debug!("Callback for node {} carries a superseded token", node_id);
                return Err(CallbackError::StaleCallback(node_id));
            }
            Some(_) => {}
            None => tracing::warn!("Accepting tokenless callback for node {}", node_id),
        }

        let report = match outcome {
            CallbackOutcome::Result(result) => {
                match descriptor(&node, executor_type, &normalize_keys(result)) {
                    Some(output) => self.lifecycle.succeed(node_id, output, token).await?,
                    None => {
                        self.lifecycle
                            .fail(node_id, MISSING_OUTPUT_KEY, token)
                            .await?
                    }
                }
            }
            CallbackOutcome::Error(error) => {
                self.lifecycle
                    .fail(node_id, format!("{}: {}", error.kind, error.message), token)
                    .await?
            }
        };

        match report.outcome {
            TransitionOutcome::Applied => Ok(report.node),
            TransitionOutcome::TokenMismatch
            | TransitionOutcome::AlreadyTerminal
            | TransitionOutcome::NotRunning
            | TransitionOutcome::NotStartable => Err(CallbackError::StaleCallback(node_id)),
        }
    }
}

fn descriptor(
    node: &Node,
    executor_type: ExecutorType,
    result: &Map<String, Value>,
) -> Option<OutputDescriptor> {
    let key = result
        .get(OUTPUT_KEY)
        .or_else(|| result.get("key"))
        .and_then(Value::as_str)
        .or_else(|| node.metadata.extra_str(OUTPUT_KEY))?;

    Some(OutputDescriptor {
        key: key.to_string(),
        media_type: result
            .get("media_type")
            .and_then(Value::as_str)
            .unwrap_or(executor_type.default_media_type())
            .to_string(),
        size_bytes: result.get("size_bytes").and_then(Value::as_u64).unwrap_or(0),
        duration_seconds: result.get("duration_seconds").and_then(Value::as_f64),
    })
}

fn normalize_keys(result: Map<String, Value>) -> Map<String, Value> {
    result
        .into_iter()
        .map(|(key, value)| (snake_case(&key), value))
        .collect()
}

/// `outputKey` and `output-key` both become `output_key`
fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        match c {
            '-' | ' ' => out.push('_'),
            c if c.is_ascii_uppercase() => {
                if i > 0 && !out.ends_with('_') {
                    out.push('_');
                }
                out.push(c.to_ascii_lowercase());
            }
            c => out.push(c),
        }
    }
    out
}
