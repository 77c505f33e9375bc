//! Node Service
//!
//! Create, update, destroy, validate and execute nodes. Every mutation
//! re-validates the affected nodes with one batched existence query per node.

use montage_core::domain::executor::ExecutorType;
use montage_core::domain::node::{Node, NodeMetadata, NodeStatus};
use montage_core::dto::node::{CreateNode, UpdateNode};
use montage_core::readiness::{NotReady, ReadinessFailure, check_readiness};
use montage_core::schema::lookup;
use montage_core::validation::{ValidationResult, validate};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::executor::Dispatcher;
use crate::lifecycle::StartError;
use crate::repository::{Repository, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("Node {0} not found")]
    NotFound(Uuid),

    #[error("Pipeline {0} not found")]
    PipelineNotFound(Uuid),

    #[error(transparent)]
    NotReady(#[from] NotReady),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for NodeError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NodeNotFound(id) => NodeError::NotFound(id),
            RepositoryError::PipelineNotFound(id) => NodeError::PipelineNotFound(id),
            other => NodeError::Repository(other),
        }
    }
}

impl From<StartError> for NodeError {
    fn from(err: StartError) -> Self {
        match err {
            StartError::NotStartable { node_id, status } => NodeError::NotReady(NotReady {
                node_id,
                failures: vec![ReadinessFailure::BadStatus(status)],
            }),
            StartError::Repository(e) => e.into(),
        }
    }
}

pub struct NodeService {
    repo: Arc<dyn Repository>,
    dispatcher: Arc<Dispatcher>,
}

impl NodeService {
    pub fn new(repo: Arc<dyn Repository>, dispatcher: Arc<Dispatcher>) -> Self {
        Self { repo, dispatcher }
    }

    async fn load(&self, id: Uuid) -> Result<Node, NodeError> {
        self.repo.find_node(id).await?.ok_or(NodeError::NotFound(id))
    }

    async fn revalidate(&self, node: &Node) -> Result<ValidationResult, NodeError> {
        let ids = node.referenced_ids();
        let existing = if ids.is_empty() {
            HashSet::new()
        } else {
            self.repo.find_existing_ids(node.pipeline_id, &ids).await?
        };
        Ok(validate(node, lookup(&node.node_type), &existing))
    }

    pub async fn get(&self, id: Uuid) -> Result<Node, NodeError> {
        self.load(id).await
    }

    pub async fn create(&self, req: CreateNode) -> Result<Node, NodeError> {
        self.repo
            .find_pipeline(req.pipeline_id)
            .await?
            .ok_or(NodeError::PipelineNotFound(req.pipeline_id))?;

        let mut node = req.into_node();
        let result = self.revalidate(&node).await?;
        node.apply_validation(result);
        self.repo.insert_node(&node).await?;

        tracing::info!(
            "Node created: {} ({}) in pipeline {}, valid: {}",
            node.id,
            node.node_type,
            node.pipeline_id,
            node.is_valid
        );
        Ok(node)
    }

    /// Merge `req` into the node
    ///
    /// A change to inputs, config or asset returns the node to pending. Nodes
    /// that consume this one are left as they are.
    pub async fn update(&self, id: Uuid, req: UpdateNode) -> Result<Node, NodeError> {
        let mut node = self.load(id).await?;
        let structural = req.apply_to(&mut node);

        let result = self.revalidate(&node).await?;
        node.apply_validation(result);
        self.repo.update_definition(&node, structural).await?;

        if structural {
            tracing::info!("Node {} definition changed, execution reset", id);
        }
        self.load(id).await
    }

    /// Delete the node after removing every reference to it
    pub async fn destroy(&self, id: Uuid) -> Result<(), NodeError> {
        let detached = self
            .repo
            .delete_detaching(id)
            .await?
            .ok_or(NodeError::NotFound(id))?;

        for sibling_id in &detached {
            if let Some(sibling) = self.repo.find_node(*sibling_id).await? {
                let result = self.revalidate(&sibling).await?;
                self.repo.save_validation(sibling.id, &result).await?;
            }
        }

        tracing::info!(
            "Node {} deleted, {} sibling(s) detached",
            id,
            detached.len()
        );
        Ok(())
    }

    /// Re-run validation and persist the result
    pub async fn validate(&self, id: Uuid) -> Result<Node, NodeError> {
        let mut node = self.load(id).await?;
        let result = self.revalidate(&node).await?;
        self.repo.save_validation(id, &result).await?;
        node.apply_validation(result);
        Ok(node)
    }

    /// Check readiness, start the attempt and hand the node to its executor
    ///
    /// Returns the running node as soon as the executor is spawned; progress
    /// shows up on the node as the executor records it. The status check is
    /// repeated by `start` under the node's lock, so of two concurrent
    /// executes only one starts an attempt.
    pub async fn execute(&self, id: Uuid) -> Result<Node, NodeError> {
        let node = self.validate(id).await?;
        let kind = node
            .kind()
            .ok_or_else(|| NodeError::UnknownNodeType(node.node_type.clone()))?;

        let ids = node.referenced_ids();
        let statuses: HashMap<Uuid, NodeStatus> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.repo
                .find_many(node.pipeline_id, &ids)
                .await?
                .iter()
                .map(|input| (input.id, input.status()))
                .collect()
        };
        check_readiness(&node, &statuses)?;

        tracing::info!(
            "Executing node {} on {} executor",
            id,
            ExecutorType::for_node(kind)
        );

        let started = self
            .dispatcher
            .context()
            .lifecycle
            .start(id, NodeMetadata::default())
            .await?;

        let dispatcher = Arc::clone(&self.dispatcher);
        let snapshot = started.node.clone();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.run(started.node, started.token).await {
                tracing::error!("Executor for node {} failed: {}", id, e);
            }
        });

        Ok(snapshot)
    }
}
