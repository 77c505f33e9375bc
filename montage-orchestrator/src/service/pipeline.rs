//! Pipeline Service

use montage_core::domain::pipeline::Pipeline;
use montage_core::dto::pipeline::{CreatePipeline, PipelineProgress};
use std::sync::Arc;
use uuid::Uuid;

use crate::repository::{Repository, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Pipeline {0} not found")]
    NotFound(Uuid),

    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct PipelineService {
    repo: Arc<dyn Repository>,
}

impl PipelineService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, req: CreatePipeline) -> Result<Pipeline, PipelineError> {
        if req.title.trim().is_empty() {
            return Err(PipelineError::ValidationError(
                "Pipeline title cannot be empty".to_string(),
            ));
        }

        let pipeline = req.into_pipeline();
        self.repo.insert_pipeline(&pipeline).await?;

        tracing::info!("Pipeline created: {} ({})", pipeline.title, pipeline.id);
        Ok(pipeline)
    }

    pub async fn get(&self, id: Uuid) -> Result<Pipeline, PipelineError> {
        self.repo
            .find_pipeline(id)
            .await?
            .ok_or(PipelineError::NotFound(id))
    }

    /// Delete the pipeline together with all of its nodes
    pub async fn delete(&self, id: Uuid) -> Result<(), PipelineError> {
        if !self.repo.delete_pipeline(id).await? {
            return Err(PipelineError::NotFound(id));
        }
        tracing::info!("Pipeline deleted: {}", id);
        Ok(())
    }

    pub async fn progress(&self, id: Uuid) -> Result<PipelineProgress, PipelineError> {
        let pipeline = self.get(id).await?;
        let nodes = self.repo.find_by_pipeline(id).await?;

        let mut progress = PipelineProgress::from_nodes(id, &nodes);
        // Costs of deleted nodes stay on the pipeline record
        progress.total_cost = progress.total_cost.max(pipeline.metadata.total_cost);
        Ok(progress)
    }
}
