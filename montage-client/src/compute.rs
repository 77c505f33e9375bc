//! Asynchronous compute invocation
//!
//! Callback-style executors hand work to an external compute service in a
//! single request. The service acknowledges with `{"status": "invoked"}` and
//! later posts the outcome to the orchestrator's callback endpoint.

use async_trait::async_trait;
use montage_core::dto::provider::{ComputeInvocation, InvocationAck};
use reqwest::Client;

use crate::error::{ClientError, Result};
use crate::response::handle_response;

#[async_trait]
pub trait ComputeInvoker: Send + Sync {
    async fn invoke(&self, invocation: &ComputeInvocation) -> Result<InvocationAck>;
}

/// HTTP implementation of [`ComputeInvoker`]
#[derive(Debug, Clone)]
pub struct HttpComputeInvoker {
    url: String,
    api_key: Option<String>,
    client: Client,
}

impl HttpComputeInvoker {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            url: url.into(),
            api_key,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ComputeInvoker for HttpComputeInvoker {
    async fn invoke(&self, invocation: &ComputeInvocation) -> Result<InvocationAck> {
        let mut request = self.client.post(&self.url).json(invocation);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let ack: InvocationAck = handle_response(request.send().await?).await?;
        if !ack.is_invoked() {
            return Err(ClientError::UnexpectedResponse(format!(
                "compute acknowledged with status '{}'",
                ack.status
            )));
        }

        tracing::debug!(
            "Invoked {} compute for node {}",
            invocation.executor_type,
            invocation.node_id
        );
        Ok(ack)
    }
}
