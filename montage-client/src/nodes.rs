//! Node-related API endpoints

use montage_core::dto::node::{CreateNode, NodeRecord};
use uuid::Uuid;

use crate::OrchestratorClient;
use crate::error::Result;
use crate::response::handle_response;

impl OrchestratorClient {
    // =============================================================================
    // Nodes
    // =============================================================================

    /// Create a node; the response carries its validation result
    pub async fn create_node(&self, req: &CreateNode) -> Result<NodeRecord> {
        let url = format!("{}/node/create", self.base_url);
        let response = self.client.post(&url).json(req).send().await?;

        handle_response(response).await
    }

    /// Get a node snapshot by ID
    pub async fn get_node(&self, node_id: Uuid) -> Result<NodeRecord> {
        let url = format!("{}/node/{}", self.base_url, node_id);
        let response = self.client.get(&url).send().await?;

        handle_response(response).await
    }

    /// Re-run validation for a node and return the refreshed snapshot
    pub async fn validate_node(&self, node_id: Uuid) -> Result<NodeRecord> {
        let url = format!("{}/node/{}/validate", self.base_url, node_id);
        let response = self.client.post(&url).send().await?;

        handle_response(response).await
    }

    /// Start executing a node
    ///
    /// Returns as soon as the executor has been dispatched; poll [`get_node`]
    /// to follow progress. A node that is not ready yields a 409 API error.
    ///
    /// [`get_node`]: OrchestratorClient::get_node
    pub async fn execute_node(&self, node_id: Uuid) -> Result<NodeRecord> {
        let url = format!("{}/node/{}/execute", self.base_url, node_id);
        let response = self.client.post(&url).send().await?;

        handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_execute_node_surfaces_conflict() {
        let mut server = Server::new_async().await;
        let node_id = Uuid::new_v4();
        let mock = server
            .mock("POST", format!("/node/{node_id}/execute").as_str())
            .with_status(409)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"Node is not ready"}"#)
            .create_async()
            .await;

        let client = OrchestratorClient::new(server.url());
        let err = client.execute_node(node_id).await.unwrap_err();

        assert!(err.is_client_error());
        assert!(err.to_string().contains("409"));
        mock.assert_async().await;
    }
}
