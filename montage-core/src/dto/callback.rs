//! Callback DTOs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Body posted by external compute when an invocation finishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub node_id: Uuid,
    /// Kept raw so an unrecognized executor can be reported as such
    pub executor_type: String,
    #[serde(default)]
    pub result: Option<Map<String, Value>>,
    #[serde(default)]
    pub error: Option<CallbackErrorBody>,
    #[serde(default)]
    pub process_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackErrorBody {
    pub message: String,
    #[serde(rename = "type", default = "CallbackErrorBody::default_kind")]
    pub kind: String,
}

impl CallbackErrorBody {
    fn default_kind() -> String {
        "Error".to_string()
    }
}

/// What a callback reports; an error wins if a payload carries both
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Result(Map<String, Value>),
    Error(CallbackErrorBody),
}

impl CallbackPayload {
    pub fn outcome(&self) -> Option<CallbackOutcome> {
        match (&self.error, &self.result) {
            (Some(error), _) => Some(CallbackOutcome::Error(error.clone())),
            (None, Some(result)) => Some(CallbackOutcome::Result(result.clone())),
            (None, None) => None,
        }
    }
}
