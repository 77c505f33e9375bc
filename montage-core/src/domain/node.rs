//! Node domain types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::execution::{ExecutionState, OutputDescriptor};
use crate::validation::ValidationResult;

/// The closed set of node types a pipeline can contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Asset,
    GenerateTalkingHead,
    GenerateAnimation,
    GenerateVoiceover,
    RenderCode,
    MixAudio,
    MergeVideos,
    ComposeVideo,
}

impl NodeType {
    pub const ALL: [NodeType; 8] = [
        NodeType::Asset,
        NodeType::GenerateTalkingHead,
        NodeType::GenerateAnimation,
        NodeType::GenerateVoiceover,
        NodeType::RenderCode,
        NodeType::MixAudio,
        NodeType::MergeVideos,
        NodeType::ComposeVideo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Asset => "asset",
            NodeType::GenerateTalkingHead => "generate-talking-head",
            NodeType::GenerateAnimation => "generate-animation",
            NodeType::GenerateVoiceover => "generate-voiceover",
            NodeType::RenderCode => "render-code",
            NodeType::MixAudio => "mix-audio",
            NodeType::MergeVideos => "merge-videos",
            NodeType::ComposeVideo => "compose-video",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a type string is not one of [`NodeType::ALL`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown node type: {0}")]
pub struct UnknownNodeType(pub String);

impl FromStr for NodeType {
    type Err = UnknownNodeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownNodeType(s.to_string()))
    }
}

/// Node status as seen by callers
///
/// Derived from [`ExecutionState`]; never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::InProgress => "in_progress",
            NodeStatus::Completed => "completed",
            NodeStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeStatus::Completed | NodeStatus::Failed)
    }

    /// Whether a node in this status may be (re-)executed
    pub fn is_executable(&self) -> bool {
        matches!(self, NodeStatus::Pending | NodeStatus::Failed)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of one input slot: a single sibling node or an ordered list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputRef {
    Single(Uuid),
    Multiple(Vec<Uuid>),
}

impl InputRef {
    pub fn ids(&self) -> &[Uuid] {
        match self {
            InputRef::Single(id) => std::slice::from_ref(id),
            InputRef::Multiple(ids) => ids,
        }
    }

    /// This reference with `removed` stripped out
    ///
    /// A single reference to `removed` disappears entirely; a list keeps its
    /// remaining ids in order.
    pub fn without(&self, removed: Uuid) -> Option<InputRef> {
        match self {
            InputRef::Single(id) if *id == removed => None,
            InputRef::Single(id) => Some(InputRef::Single(*id)),
            InputRef::Multiple(ids) => Some(InputRef::Multiple(
                ids.iter().copied().filter(|id| *id != removed).collect(),
            )),
        }
    }
}

/// Execution bookkeeping that is not part of the state machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeMetadata {
    pub fn with_provider_job_id(job_id: impl Into<String>) -> Self {
        Self {
            provider_job_id: Some(job_id.into()),
            ..Self::default()
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Merge `patch` into this metadata; fields set in the patch win
    pub fn merge(&mut self, patch: NodeMetadata) {
        if patch.provider_job_id.is_some() {
            self.provider_job_id = patch.provider_job_id;
        }
        if patch.cost.is_some() {
            self.cost = patch.cost;
        }
        self.extra.extend(patch.extra);
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// A single generation step in a pipeline's dependency graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub title: String,
    /// Raw type string as supplied by the author; see [`Node::kind`]
    pub node_type: String,
    pub inputs: BTreeMap<String, InputRef>,
    pub config: Map<String, Value>,
    pub asset: Option<Value>,
    pub execution: ExecutionState,
    pub is_valid: bool,
    pub validation_errors: BTreeMap<String, String>,
    pub metadata: NodeMetadata,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Node {
    pub fn new(pipeline_id: Uuid, title: impl Into<String>, node_type: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            pipeline_id,
            title: title.into(),
            node_type: node_type.into(),
            inputs: BTreeMap::new(),
            config: Map::new(),
            asset: None,
            execution: ExecutionState::NotStarted,
            is_valid: false,
            validation_errors: BTreeMap::new(),
            metadata: NodeMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_input(mut self, slot: impl Into<String>, input: InputRef) -> Self {
        self.inputs.insert(slot.into(), input);
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    pub fn with_asset(mut self, asset: Value) -> Self {
        self.asset = Some(asset);
        self
    }

    /// The parsed type, or `None` for an unrecognized type string
    pub fn kind(&self) -> Option<NodeType> {
        self.node_type.parse().ok()
    }

    pub fn status(&self) -> NodeStatus {
        self.execution.status()
    }

    pub fn output(&self) -> Option<&OutputDescriptor> {
        self.execution.output()
    }

    /// Every node id referenced by any input slot, deduplicated, in slot order
    pub fn referenced_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::new();
        for input in self.inputs.values() {
            for id in input.ids() {
                if !ids.contains(id) {
                    ids.push(*id);
                }
            }
        }
        ids
    }

    /// Strip every reference to `removed` from this node's inputs
    ///
    /// Returns `true` if anything changed.
    pub fn detach(&mut self, removed: Uuid) -> bool {
        if !self.inputs.values().any(|input| input.ids().contains(&removed)) {
            return false;
        }

        self.inputs = std::mem::take(&mut self.inputs)
            .into_iter()
            .filter_map(|(slot, input)| input.without(removed).map(|input| (slot, input)))
            .collect();
        true
    }

    pub fn apply_validation(&mut self, result: ValidationResult) {
        self.is_valid = result.is_valid;
        self.validation_errors = result.errors;
    }
}
