//! Pipeline DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::node::{Node, NodeStatus};
use crate::domain::pipeline::{Pipeline, PipelineConfig};

/// Request to create a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipeline {
    pub title: String,
    #[serde(default)]
    pub config: PipelineConfig,
}

impl CreatePipeline {
    pub fn into_pipeline(self) -> Pipeline {
        let mut pipeline = Pipeline::new(self.title);
        pipeline.config = self.config;
        pipeline
    }
}

/// Aggregate execution progress of a pipeline, computed on read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineProgress {
    pub pipeline_id: Uuid,
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub invalid: usize,
    pub total_cost: f64,
}

impl PipelineProgress {
    pub fn from_nodes<'a>(pipeline_id: Uuid, nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        let mut progress = Self {
            pipeline_id,
            ..Self::default()
        };

        for node in nodes {
            progress.total += 1;
            match node.status() {
                NodeStatus::Pending => progress.pending += 1,
                NodeStatus::InProgress => progress.in_progress += 1,
                NodeStatus::Completed => progress.completed += 1,
                NodeStatus::Failed => progress.failed += 1,
            }
            if !node.is_valid {
                progress.invalid += 1;
            }
            progress.total_cost += node.metadata.cost.unwrap_or(0.0);
        }

        progress
    }

    pub fn is_finished(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }
}
