//! Generation providers
//!
//! Polling-style providers accept a submission and hand back a job id that is
//! queried until it reports a terminal status. Each provider (talking head,
//! voiceover, animation) speaks the same two endpoints:
//!
//! - `POST {base}/v1/generations` with a [`GenerationRequest`]
//! - `GET {base}/v1/generations/{job_id}`

use async_trait::async_trait;
use montage_core::dto::provider::{GenerationRequest, StatusResponse, SubmitResponse};
use reqwest::Client;

use crate::error::{ClientError, Result};
use crate::response::handle_response;

/// A submit-and-poll generation service
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Submit a generation job
    async fn submit(&self, request: &GenerationRequest) -> Result<SubmitResponse>;

    /// Query the status of a submitted job
    ///
    /// Rate limiting is not an error here: a throttled query reports the job
    /// as still pending.
    async fn status(&self, job_id: &str) -> Result<StatusResponse>;
}

/// HTTP implementation of [`GenerationProvider`]
#[derive(Debug, Clone)]
pub struct HttpGenerationProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpGenerationProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_client(base_url, api_key, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, api_key: Option<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    async fn submit(&self, request: &GenerationRequest) -> Result<SubmitResponse> {
        let url = format!("{}/v1/generations", self.base_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(request)
            .send()
            .await?;

        let submitted: SubmitResponse = handle_response(response).await?;
        if submitted.job_id.is_none() && submitted.url.is_none() {
            return Err(ClientError::UnexpectedResponse(
                "submission returned neither a job id nor a result url".to_string(),
            ));
        }

        tracing::debug!(
            "Submitted generation for node {} to {} (job {:?})",
            request.node_id,
            self.base_url,
            submitted.job_id
        );
        Ok(submitted)
    }

    async fn status(&self, job_id: &str) -> Result<StatusResponse> {
        let url = format!("{}/v1/generations/{}", self.base_url, job_id);
        let response = self.authorize(self.client.get(&url)).send().await?;

        match handle_response(response).await {
            Err(e) if e.is_rate_limited() => {
                tracing::debug!("Provider rate limited status query for job {}", job_id);
                Ok(StatusResponse::pending())
            }
            other => other,
        }
    }
}
