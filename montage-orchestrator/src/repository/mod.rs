//! Repository Module
//!
//! Data access layer for the orchestrator. Postgres is the production store;
//! the in-memory implementation backs tests and local experiments.
//!
//! All repositories are trait-based so services never depend on a concrete
//! store.

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PgRepository;

use async_trait::async_trait;
use montage_core::domain::execution::{Transition, TransitionOutcome};
use montage_core::domain::node::Node;
use montage_core::domain::pipeline::Pipeline;
use montage_core::validation::ValidationResult;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Node {0} not found")]
    NodeNotFound(Uuid),

    #[error("Pipeline {0} not found")]
    PipelineNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of running a [`Transition`] inside the node's critical section
#[derive(Debug, Clone)]
pub struct TransitionReport {
    pub outcome: TransitionOutcome,
    /// The node as it is after the attempt, whether or not it applied
    pub node: Node,
}

#[async_trait]
pub trait PipelineRepository: Send + Sync {
    async fn insert_pipeline(&self, pipeline: &Pipeline) -> Result<(), RepositoryError>;

    async fn find_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, RepositoryError>;

    /// Delete a pipeline and every node in it
    async fn delete_pipeline(&self, id: Uuid) -> Result<bool, RepositoryError>;

    /// Add to the pipeline's accumulated cost
    async fn add_cost(&self, id: Uuid, amount: f64) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NodeRepository: Send + Sync {
    async fn insert_node(&self, node: &Node) -> Result<(), RepositoryError>;

    async fn find_node(&self, id: Uuid) -> Result<Option<Node>, RepositoryError>;

    async fn find_by_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<Node>, RepositoryError>;

    /// Nodes of `pipeline_id` among `ids`; unknown ids are skipped
    async fn find_many(&self, pipeline_id: Uuid, ids: &[Uuid]) -> Result<Vec<Node>, RepositoryError>;

    /// Which of `ids` exist in `pipeline_id`, in one query
    async fn find_existing_ids(
        &self,
        pipeline_id: Uuid,
        ids: &[Uuid],
    ) -> Result<HashSet<Uuid>, RepositoryError>;

    /// Persist title, inputs, config, asset and validation state
    ///
    /// With `reset_execution` the node also returns to not started, which
    /// drops its token and strands any attempt still in flight.
    async fn update_definition(&self, node: &Node, reset_execution: bool)
    -> Result<(), RepositoryError>;

    async fn save_validation(&self, id: Uuid, result: &ValidationResult)
    -> Result<(), RepositoryError>;

    /// Strip references to `id` from its siblings, then delete it, atomically
    ///
    /// Returns the ids of siblings whose inputs changed, or `None` if the node
    /// did not exist.
    async fn delete_detaching(&self, id: Uuid) -> Result<Option<Vec<Uuid>>, RepositoryError>;

    /// Apply a lifecycle transition under the node's lock
    ///
    /// The token comparison and the write happen in the same critical section,
    /// so two concurrent writers can never both apply.
    async fn transition(
        &self,
        id: Uuid,
        transition: Transition,
    ) -> Result<TransitionReport, RepositoryError>;
}

/// Convenience bound for stores that hold both pipelines and nodes
pub trait Repository: NodeRepository + PipelineRepository {}

impl<T: NodeRepository + PipelineRepository> Repository for T {}
