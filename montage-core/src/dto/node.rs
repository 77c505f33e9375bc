//! Node DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::execution::{ExecutionState, ExecutionToken, OutputDescriptor};
use crate::domain::node::{InputRef, Node, NodeMetadata, NodeStatus};

/// Snapshot of a node as returned to API consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub status: NodeStatus,
    pub inputs: BTreeMap<String, InputRef>,
    pub config: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<Value>,
    pub metadata: RecordMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputDescriptor>,
    pub is_valid: bool,
    pub validation_errors: BTreeMap<String, String>,
}

/// Execution bookkeeping of the latest attempt
///
/// The token is only shown while the attempt is running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    #[serde(flatten)]
    pub attempt: NodeMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_token: Option<ExecutionToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Node> for RecordMetadata {
    fn from(node: &Node) -> Self {
        let execution_token = match &node.execution {
            ExecutionState::Running { token, .. } => Some(*token),
            _ => None,
        };
        Self {
            attempt: node.metadata.clone(),
            execution_token,
            started_at: node.execution.started_at(),
            completed_at: node.execution.completed_at(),
            error: node.execution.error().map(str::to_string),
        }
    }
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id,
            pipeline_id: node.pipeline_id,
            title: node.title.clone(),
            node_type: node.node_type.clone(),
            status: node.status(),
            inputs: node.inputs.clone(),
            config: node.config.clone(),
            asset: node.asset.clone(),
            metadata: RecordMetadata::from(node),
            output: node.output().cloned(),
            is_valid: node.is_valid,
            validation_errors: node.validation_errors.clone(),
        }
    }
}

impl From<Node> for NodeRecord {
    fn from(node: Node) -> Self {
        NodeRecord::from(&node)
    }
}

/// Request to add a node to a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNode {
    pub pipeline_id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputRef>,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub asset: Option<Value>,
}

impl CreateNode {
    pub fn into_node(self) -> Node {
        let mut node = Node::new(self.pipeline_id, self.title, self.node_type);
        node.inputs = self.inputs;
        node.config = self.config;
        node.asset = self.asset;
        node
    }
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNode {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub inputs: Option<BTreeMap<String, InputRef>>,
    #[serde(default)]
    pub config: Option<Map<String, Value>>,
    #[serde(default)]
    pub asset: Option<Value>,
}

impl UpdateNode {
    /// Merge into `node`, returning whether a structural field changed
    ///
    /// Structural fields are the ones that affect what the node produces:
    /// inputs, config and asset.
    pub fn apply_to(self, node: &mut Node) -> bool {
        let mut structural = false;

        if let Some(title) = self.title {
            node.title = title;
        }
        if let Some(inputs) = self.inputs {
            structural |= node.inputs != inputs;
            node.inputs = inputs;
        }
        if let Some(config) = self.config {
            structural |= node.config != config;
            node.config = config;
        }
        if let Some(asset) = self.asset {
            structural |= node.asset.as_ref() != Some(&asset);
            node.asset = Some(asset);
        }

        structural
    }
}
