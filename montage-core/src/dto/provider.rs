//! Provider and compute DTOs
//!
//! Request and response bodies for generation providers (submit + poll) and
//! for the asynchronous compute service that reports back via callback.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::execution::ExecutionToken;
use crate::domain::executor::ExecutorType;

/// Presigned URLs for one input slot, shaped like the slot itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotUrls {
    Single(String),
    Multiple(Vec<String>),
}

/// Submission body for a polling-style generation provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub node_id: Uuid,
    pub parameters: Map<String, Value>,
    pub inputs: BTreeMap<String, SlotUrls>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }
}

/// Provider reply to a submission
///
/// Most providers return a `job_id` to poll. Some finish inline and answer
/// with `status: completed` and the artifact `url` directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: Option<GenerationStatus>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub cost: Option<f64>,
}

/// Provider reply to a status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: GenerationStatus,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub cost: Option<f64>,
}

impl StatusResponse {
    pub fn pending() -> Self {
        Self {
            status: GenerationStatus::Pending,
            url: None,
            error: None,
            duration_seconds: None,
            cost: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLocation {
    pub bucket: String,
    pub key: String,
}

/// Invocation body for the asynchronous compute service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeInvocation {
    /// Storage keys of input artifacts, in schema slot order
    pub input_refs: Vec<String>,
    pub output_location: OutputLocation,
    pub callback_url: String,
    pub node_id: Uuid,
    pub executor_type: ExecutorType,
    pub token: ExecutionToken,
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationAck {
    pub status: String,
}

impl InvocationAck {
    pub const INVOKED: &'static str = "invoked";

    pub fn is_invoked(&self) -> bool {
        self.status == Self::INVOKED
    }
}
