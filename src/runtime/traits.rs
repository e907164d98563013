//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use async_trait::async_trait;
use std::sync::Arc;

/// Client for making completion requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete a request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

// ============================================================================
// Production implementation
// ============================================================================

/// Client backed by a configured completion service
pub struct ServiceLlmClient {
    service: Arc<dyn LlmService>,
    max_output_tokens: Option<u32>,
}

impl ServiceLlmClient {
    pub fn new(service: Arc<dyn LlmService>, max_output_tokens: Option<u32>) -> Self {
        Self {
            service,
            max_output_tokens,
        }
    }
}

#[async_trait]
impl LlmClient for ServiceLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        if request.max_tokens.is_some() || self.max_output_tokens.is_none() {
            return self.service.complete(request).await;
        }
        let request = request.clone().with_max_tokens(self.max_output_tokens);
        self.service.complete(&request).await
    }

    fn model_id(&self) -> &str {
        self.service.model_id()
    }
}
