//! Model gateway
//!
//! Prompt in, text out. Backends return `Result`; the [`ModelGateway`] wrapper
//! applies the timeout and converts every failure to [`GATEWAY_FAILURE`] so
//! nothing raised by a transport ever crosses the agent boundary.

pub mod gemini;
pub mod ollama;
pub mod scripted;

use crate::config::{GatewayConfig, Provider};
use crate::error::OrchestrationError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;
pub use scripted::ScriptedBackend;

/// Sentinel returned in place of a completion when the backend fails.
pub const GATEWAY_FAILURE: &str = "ERROR";

pub fn is_gateway_failure(text: &str) -> bool {
    text.trim() == GATEWAY_FAILURE
}

/// A single-shot completion oracle. No retries here; retry policy belongs to
/// the orchestration layer.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> crate::Result<String>;

    fn name(&self) -> &str;
}

/// Fail-open wrapper around a backend.
pub struct ModelGateway {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
}

impl ModelGateway {
    pub fn new(backend: Arc<dyn CompletionBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Build the configured HTTP backend.
    pub fn from_config(config: &GatewayConfig) -> crate::Result<Self> {
        let backend: Arc<dyn CompletionBackend> = match config.provider {
            Provider::Ollama => Arc::new(OllamaBackend::new(
                config.base_url.clone(),
                config.model.clone(),
                config.temperature,
            )?),
            Provider::Gemini => {
                let api_key = config.api_key.clone().ok_or_else(|| {
                    OrchestrationError::InvalidConfig(
                        "gateway.api_key (or GEMINI_API_KEY) is required for the gemini provider"
                            .to_string(),
                    )
                })?;
                Arc::new(GeminiBackend::new(api_key, config.model.clone(), config.temperature)?)
            }
        };

        Ok(Self::new(backend, Duration::from_secs(config.timeout_secs)))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Query the backend. Returns [`GATEWAY_FAILURE`] on error or timeout.
    pub async fn query(&self, prompt: &str) -> String {
        debug!(backend = self.backend.name(), prompt_len = prompt.len(), "Querying model");

        let outcome = match tokio::time::timeout(self.timeout, self.backend.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(OrchestrationError::GatewayTimeout(self.timeout.as_secs())),
        };

        match outcome {
            Ok(text) => {
                debug!(response_len = text.len(), "Model responded");
                text
            }
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "Gateway call failed");
                GATEWAY_FAILURE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backend_error_becomes_sentinel() {
        let backend = ScriptedBackend::new("unused").failing();
        let gateway = ModelGateway::new(Arc::new(backend), Duration::from_secs(5));

        let reply = gateway.query("anything").await;
        assert!(is_gateway_failure(&reply));
    }

    #[tokio::test]
    async fn test_timeout_becomes_sentinel() {
        let backend = ScriptedBackend::new("too late").with_delay(Duration::from_millis(200));
        let gateway = ModelGateway::new(Arc::new(backend), Duration::from_millis(20));

        assert_eq!(gateway.query("anything").await, GATEWAY_FAILURE);
    }

    #[tokio::test]
    async fn test_passthrough() {
        let backend = ScriptedBackend::new("fallback").rule("ping", "pong");
        let gateway = ModelGateway::new(Arc::new(backend), Duration::from_secs(5));

        assert_eq!(gateway.query("say ping").await, "pong");
        assert_eq!(gateway.query("other").await, "fallback");
    }

    #[test]
    fn test_gemini_requires_key() {
        let config = GatewayConfig {
            provider: Provider::Gemini,
            api_key: None,
            ..GatewayConfig::default()
        };
        assert!(ModelGateway::from_config(&config).is_err());
    }
}
