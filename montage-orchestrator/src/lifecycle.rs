//! Execution Lifecycle Tracker
//!
//! Token-guarded writes against a node's execution state. `start` mints the
//! token for a new attempt; `update`, `succeed` and `fail` only take effect
//! when they present the node's current token.

use montage_core::domain::execution::{
    ExecutionToken, OutputDescriptor, TokenGuard, Transition, TransitionOutcome,
};
use montage_core::domain::node::{Node, NodeMetadata, NodeStatus};
use std::sync::Arc;
use uuid::Uuid;

use crate::repository::{Repository, RepositoryError, TransitionReport};

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("Node {node_id} cannot start while {status}")]
    NotStartable { node_id: Uuid, status: NodeStatus },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A running attempt
#[derive(Debug, Clone)]
pub struct Started {
    pub token: ExecutionToken,
    /// The node as it is once running
    pub node: Node,
}

#[derive(Clone)]
pub struct LifecycleTracker {
    repo: Arc<dyn Repository>,
}

impl LifecycleTracker {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Begin a new attempt on a pending or failed node
    ///
    /// The status check and the token rotation happen in one critical
    /// section, so of two concurrent starts exactly one wins.
    pub async fn start(&self, node_id: Uuid, extra: NodeMetadata) -> Result<Started, StartError> {
        let token = ExecutionToken::generate();
        let report = self
            .repo
            .transition(node_id, Transition::Start { token, extra })
            .await?;

        if !report.outcome.is_applied() {
            tracing::debug!(
                "Start refused for node {} (status {})",
                node_id,
                report.node.status()
            );
            return Err(StartError::NotStartable {
                node_id,
                status: report.node.status(),
            });
        }

        tracing::info!("Node {} started (token {})", node_id, token);
        Ok(Started {
            token,
            node: report.node,
        })
    }

    /// Merge `patch` into the node's metadata if `token` is still current
    ///
    /// Returns whether the patch was written.
    pub async fn update(
        &self,
        node_id: Uuid,
        patch: NodeMetadata,
        token: ExecutionToken,
    ) -> Result<bool, RepositoryError> {
        let report = self
            .repo
            .transition(
                node_id,
                Transition::Update {
                    guard: token.into(),
                    patch,
                },
            )
            .await?;

        Ok(self.observe(node_id, "update", &report))
    }

    pub async fn succeed(
        &self,
        node_id: Uuid,
        output: OutputDescriptor,
        guard: impl Into<TokenGuard>,
    ) -> Result<TransitionReport, RepositoryError> {
        let report = self
            .repo
            .transition(
                node_id,
                Transition::Succeed {
                    guard: guard.into(),
                    output,
                },
            )
            .await?;

        if self.observe(node_id, "succeed", &report) {
            if let Some(cost) = report.node.metadata.cost.filter(|c| *c > 0.0) {
                self.repo.add_cost(report.node.pipeline_id, cost).await?;
            }
        }
        Ok(report)
    }

    pub async fn fail(
        &self,
        node_id: Uuid,
        error: impl Into<String>,
        guard: impl Into<TokenGuard>,
    ) -> Result<TransitionReport, RepositoryError> {
        let error = error.into();
        let report = self
            .repo
            .transition(
                node_id,
                Transition::Fail {
                    guard: guard.into(),
                    error: error.clone(),
                },
            )
            .await?;

        if self.observe(node_id, "fail", &report) {
            tracing::info!("Node {} failed: {}", node_id, error);
        }
        Ok(report)
    }

    fn observe(&self, node_id: Uuid, action: &str, report: &TransitionReport) -> bool {
        match report.outcome {
            TransitionOutcome::Applied => {
                tracing::info!(
                    "Node {} {} applied (status {})",
                    node_id,
                    action,
                    report.node.status()
                );
                true
            }
            outcome => {
                tracing::warn!(
                    "Skipped {} for node {}: {:?} (status {})",
                    action,
                    node_id,
                    outcome,
                    report.node.status()
                );
                false
            }
        }
    }
}
