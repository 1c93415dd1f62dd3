//! Parley Inference Gateway client
//!
//! Provides the single stateless RPC that turns a thread's history into an
//! assistant reply, with support for:
//! - HTTP `POST /generate` against the answer-generation backend
//! - Scripted mock gateway for testing and development
//! - Configurable base URL and request timeout

pub mod http;
pub mod mock;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use http::HttpGateway;
pub use mock::MockGateway;

/// Answer used when the gateway reply carries no `final_answer`
pub const NO_RESPONSE: &str = "[No response]";

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway configuration error: {0}")]
    Configuration(String),

    #[error("Gateway request error: {0}")]
    Request(String),

    #[error("Gateway response error: {0}")]
    Response(String),
}

/// Author of a context message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextRole {
    User,
    Assistant,
}

/// One prior turn of the conversation, as sent to the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: ContextRole,
    pub content: Option<String>,
}

/// Body of `POST /generate`
///
/// `messages` is the whole thread history, including the newest user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub user_id: Option<Uuid>,
    pub thread_id: Uuid,
    pub messages: Vec<ContextMessage>,
}

/// Reply from `POST /generate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_images: Option<Vec<String>>,
}

impl GenerateResponse {
    /// Reply carrying only an answer
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            final_answer: Some(text.into()),
            plot_images: None,
        }
    }

    /// Answer text, defaulting to [`NO_RESPONSE`]
    pub fn final_answer_or_default(&self) -> &str {
        self.final_answer.as_deref().unwrap_or(NO_RESPONSE)
    }

    /// Split into `(answer, images)` with defaults applied
    pub fn into_parts(self) -> (String, Vec<String>) {
        let answer = self.final_answer.unwrap_or_else(|| NO_RESPONSE.to_string());
        (answer, self.plot_images.unwrap_or_default())
    }
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway provider (http, mock)
    pub provider: String,
    /// Base URL of the answer-generation backend
    pub base_url: String,
    /// Request timeout; network-layer defaults apply when unset
    pub timeout: Option<Duration>,
}

impl GatewayConfig {
    /// Create gateway config from environment variables.
    pub fn from_env() -> Result<Self, GatewayError> {
        dotenvy::dotenv().ok();

        let provider = std::env::var("GATEWAY_PROVIDER").unwrap_or_else(|_| "mock".to_string());

        let base_url =
            std::env::var("GATEWAY_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());

        let timeout = match std::env::var("GATEWAY_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    GatewayError::Configuration(format!(
                        "GATEWAY_TIMEOUT_SECS must be a whole number of seconds, got {:?}",
                        raw
                    ))
                })?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        if provider == "http" && base_url.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "GATEWAY_URL is required for the http provider".to_string(),
            ));
        }

        Ok(Self {
            provider,
            base_url,
            timeout,
        })
    }
}

/// Inference gateway trait for different implementations.
#[async_trait::async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Compute an assistant reply from the full thread context.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, GatewayError>;
}

/// Factory for creating InferenceGateway implementations.
pub struct GatewayFactory;

impl GatewayFactory {
    /// Create an InferenceGateway based on configuration.
    pub fn create(config: GatewayConfig) -> Result<Box<dyn InferenceGateway>, GatewayError> {
        match config.provider.as_str() {
            "http" => {
                tracing::info!(base_url = %config.base_url, "Creating HTTP inference gateway");
                Ok(Box::new(HttpGateway::new(config)?))
            }
            "mock" => {
                tracing::info!("Creating mock inference gateway");
                Ok(Box::new(MockGateway::new()))
            }
            provider => Err(GatewayError::Configuration(format!(
                "Unknown gateway provider: {}. Supported providers: http, mock",
                provider
            ))),
        }
    }
}
