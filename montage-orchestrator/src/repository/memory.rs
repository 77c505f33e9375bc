//! In-memory repository
//!
//! Each node lives behind its own `tokio::sync::Mutex`, which is the critical
//! section lifecycle transitions run in.

use async_trait::async_trait;
use chrono::Utc;
use montage_core::domain::execution::{ExecutionState, Transition};
use montage_core::domain::node::{Node, NodeMetadata};
use montage_core::domain::pipeline::Pipeline;
use montage_core::validation::ValidationResult;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{NodeRepository, PipelineRepository, RepositoryError, TransitionReport};

type NodeCell = Arc<Mutex<Node>>;

#[derive(Default)]
pub struct InMemoryRepository {
    pipelines: RwLock<HashMap<Uuid, Pipeline>>,
    nodes: RwLock<HashMap<Uuid, NodeCell>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn cell(&self, id: Uuid) -> Option<NodeCell> {
        self.nodes.read().await.get(&id).cloned()
    }

    async fn cells(&self) -> Vec<NodeCell> {
        self.nodes.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl PipelineRepository for InMemoryRepository {
    async fn insert_pipeline(&self, pipeline: &Pipeline) -> Result<(), RepositoryError> {
        self.pipelines
            .write()
            .await
            .insert(pipeline.id, pipeline.clone());
        Ok(())
    }

    async fn find_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, RepositoryError> {
        Ok(self.pipelines.read().await.get(&id).cloned())
    }

    async fn delete_pipeline(&self, id: Uuid) -> Result<bool, RepositoryError> {
        if self.pipelines.write().await.remove(&id).is_none() {
            return Ok(false);
        }

        let mut nodes = self.nodes.write().await;
        let mut doomed = Vec::new();
        for (node_id, cell) in nodes.iter() {
            if cell.lock().await.pipeline_id == id {
                doomed.push(*node_id);
            }
        }
        for node_id in doomed {
            nodes.remove(&node_id);
        }
        Ok(true)
    }

    async fn add_cost(&self, id: Uuid, amount: f64) -> Result<(), RepositoryError> {
        let mut pipelines = self.pipelines.write().await;
        let pipeline = pipelines
            .get_mut(&id)
            .ok_or(RepositoryError::PipelineNotFound(id))?;
        pipeline.metadata.total_cost += amount;
        pipeline.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl NodeRepository for InMemoryRepository {
    async fn insert_node(&self, node: &Node) -> Result<(), RepositoryError> {
        if !self.pipelines.read().await.contains_key(&node.pipeline_id) {
            return Err(RepositoryError::PipelineNotFound(node.pipeline_id));
        }
        self.nodes
            .write()
            .await
            .insert(node.id, Arc::new(Mutex::new(node.clone())));
        Ok(())
    }

    async fn find_node(&self, id: Uuid) -> Result<Option<Node>, RepositoryError> {
        match self.cell(id).await {
            Some(cell) => Ok(Some(cell.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn find_by_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<Node>, RepositoryError> {
        let mut found = Vec::new();
        for cell in self.cells().await {
            let node = cell.lock().await;
            if node.pipeline_id == pipeline_id {
                found.push(node.clone());
            }
        }
        found.sort_by_key(|n| n.created_at);
        Ok(found)
    }

    async fn find_many(&self, pipeline_id: Uuid, ids: &[Uuid]) -> Result<Vec<Node>, RepositoryError> {
        let mut found = Vec::new();
        for id in ids {
            if let Some(cell) = self.cell(*id).await {
                let node = cell.lock().await;
                if node.pipeline_id == pipeline_id {
                    found.push(node.clone());
                }
            }
        }
        Ok(found)
    }

    async fn find_existing_ids(
        &self,
        pipeline_id: Uuid,
        ids: &[Uuid],
    ) -> Result<HashSet<Uuid>, RepositoryError> {
        Ok(self
            .find_many(pipeline_id, ids)
            .await?
            .into_iter()
            .map(|n| n.id)
            .collect())
    }

    async fn update_definition(
        &self,
        node: &Node,
        reset_execution: bool,
    ) -> Result<(), RepositoryError> {
        let cell = self
            .cell(node.id)
            .await
            .ok_or(RepositoryError::NodeNotFound(node.id))?;
        let mut stored = cell.lock().await;

        stored.title = node.title.clone();
        stored.inputs = node.inputs.clone();
        stored.config = node.config.clone();
        stored.asset = node.asset.clone();
        stored.is_valid = node.is_valid;
        stored.validation_errors = node.validation_errors.clone();
        if reset_execution {
            stored.execution = ExecutionState::NotStarted;
            stored.metadata = NodeMetadata::default();
        }
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn save_validation(
        &self,
        id: Uuid,
        result: &ValidationResult,
    ) -> Result<(), RepositoryError> {
        let cell = self.cell(id).await.ok_or(RepositoryError::NodeNotFound(id))?;
        let mut stored = cell.lock().await;
        stored.apply_validation(result.clone());
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_detaching(&self, id: Uuid) -> Result<Option<Vec<Uuid>>, RepositoryError> {
        // Holding the map write lock keeps the detach and delete atomic
        let mut nodes = self.nodes.write().await;
        let Some(removed) = nodes.get(&id).cloned() else {
            return Ok(None);
        };
        let pipeline_id = removed.lock().await.pipeline_id;

        let mut detached = Vec::new();
        for (sibling_id, cell) in nodes.iter() {
            if *sibling_id == id {
                continue;
            }
            let mut sibling = cell.lock().await;
            if sibling.pipeline_id == pipeline_id && sibling.detach(id) {
                sibling.updated_at = Utc::now();
                detached.push(*sibling_id);
            }
        }

        nodes.remove(&id);
        Ok(Some(detached))
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> Result<TransitionReport, RepositoryError> {
        let cell = self.cell(id).await.ok_or(RepositoryError::NodeNotFound(id))?;
        let mut node = cell.lock().await;

        let now = Utc::now();
        let Node {
            execution,
            metadata,
            ..
        } = &mut *node;
        let outcome = transition.apply(execution, metadata, now);
        if outcome.is_applied() {
            node.updated_at = now;
        }

        Ok(TransitionReport {
            outcome,
            node: node.clone(),
        })
    }
}
