//! HTTP Inference Gateway Implementation
//!
//! POSTs the thread context to `{base_url}/generate` on the
//! answer-generation backend using reqwest.

use reqwest::Client;

use crate::{GatewayConfig, GatewayError, GenerateRequest, GenerateResponse, InferenceGateway};

/// Inference gateway backed by the answer-generation HTTP service
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    generate_url: String,
}

impl HttpGateway {
    /// Create a new HTTP gateway
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = match config.timeout {
            Some(timeout) => Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| GatewayError::Configuration(format!("HTTP client: {}", e)))?,
            None => Client::new(),
        };

        let generate_url = format!("{}/generate", config.base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            generate_url,
        })
    }

    /// Endpoint this gateway posts to
    pub fn generate_url(&self) -> &str {
        &self.generate_url
    }
}

#[async_trait::async_trait]
impl InferenceGateway for HttpGateway {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, GatewayError> {
        tracing::debug!(
            thread_id = %request.thread_id,
            context_len = request.messages.len(),
            "Sending generate request"
        );

        let response = self
            .client
            .post(&self.generate_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::Request(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());

            return Err(GatewayError::Response(format!(
                "Gateway returned {}: {}",
                status, error_body
            )));
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Response(format!("Failed to parse response: {}", e)))?;

        tracing::debug!(
            thread_id = %request.thread_id,
            has_answer = reply.final_answer.is_some(),
            images = reply.plot_images.as_ref().map_or(0, Vec::len),
            "Generate request completed"
        );

        Ok(reply)
    }
}
