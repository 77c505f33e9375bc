//! Montage HTTP Clients
//!
//! Type-safe HTTP clients for everything the Montage orchestrator talks to,
//! and for talking to the orchestrator itself:
//!
//! - [`OrchestratorClient`]: node, pipeline and schema endpoints (used by the CLI)
//! - [`generation`]: submit-and-poll generation providers
//! - [`compute`]: the asynchronous compute service that reports back via callback
//! - [`media`]: fetching finished artifacts by URL
//!
//! Provider-facing clients sit behind `async_trait` traits so the orchestrator
//! can swap in fakes for testing.
//!
//! # Example
//!
//! ```no_run
//! use montage_client::OrchestratorClient;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), montage_client::ClientError> {
//!     let client = OrchestratorClient::new("http://localhost:8080");
//!
//!     let node = client.execute_node(Uuid::new_v4()).await?;
//!     println!("Node {} is {}", node.id, node.status);
//!     Ok(())
//! }
//! ```

pub mod compute;
pub mod error;
pub mod generation;
pub mod media;
mod nodes;
mod pipelines;
mod response;

// Re-export commonly used types
pub use compute::{ComputeInvoker, HttpComputeInvoker};
pub use error::{ClientError, Result};
pub use generation::{GenerationProvider, HttpGenerationProvider};
pub use media::{HttpMediaFetcher, MediaFetcher};

use reqwest::Client;

/// HTTP client for the Montage orchestrator API
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the orchestrator API (e.g., "http://localhost:8080")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
