//! Pipeline and schema API endpoints

use montage_core::domain::pipeline::Pipeline;
use montage_core::dto::pipeline::{CreatePipeline, PipelineProgress};
use serde_json::Value;
use uuid::Uuid;

use crate::OrchestratorClient;
use crate::error::Result;
use crate::response::handle_response;

impl OrchestratorClient {
    // =============================================================================
    // Pipelines
    // =============================================================================

    pub async fn create_pipeline(&self, req: &CreatePipeline) -> Result<Pipeline> {
        let url = format!("{}/pipeline/create", self.base_url);
        let response = self.client.post(&url).json(req).send().await?;

        handle_response(response).await
    }

    pub async fn get_pipeline(&self, pipeline_id: Uuid) -> Result<Pipeline> {
        let url = format!("{}/pipeline/{}", self.base_url, pipeline_id);
        let response = self.client.get(&url).send().await?;

        handle_response(response).await
    }

    /// Per-status node counts and accumulated cost of a pipeline
    pub async fn pipeline_progress(&self, pipeline_id: Uuid) -> Result<PipelineProgress> {
        let url = format!("{}/pipeline/{}/progress", self.base_url, pipeline_id);
        let response = self.client.get(&url).send().await?;

        handle_response(response).await
    }

    // =============================================================================
    // Schemas
    // =============================================================================

    /// Schema the orchestrator validates a node type against
    pub async fn get_schema(&self, node_type: &str) -> Result<Value> {
        let url = format!("{}/schema/{}", self.base_url, node_type);
        let response = self.client.get(&url).send().await?;

        handle_response(response).await
    }

    /// Every node type schema the orchestrator knows
    pub async fn list_schemas(&self) -> Result<Vec<Value>> {
        let url = format!("{}/schema", self.base_url);
        let response = self.client.get(&url).send().await?;

        handle_response(response).await
    }
}
