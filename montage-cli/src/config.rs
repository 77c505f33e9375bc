//! CLI configuration

#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,
}

impl Config {
    pub fn client(&self) -> montage_client::OrchestratorClient {
        montage_client::OrchestratorClient::new(&self.orchestrator_url)
    }
}
