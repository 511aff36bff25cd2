//! Pluggable LLM backend abstraction
//!
//! A narrow interface over chat-completion servers: one prompt in, one
//! answer out. The gateway never touches balances or reservations; the
//! inquiry pipeline owns that sequencing.
//!
//! # Configuration
//!
//! Environment variables:
//! - `LLM_BACKEND`: Backend to use (openai_compatible, mock). Default: mock
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-3.5-turbo)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)
//! - `LLM_TIMEOUT_SECS`: Per-request deadline in seconds (default: 60)

mod mock;
mod openai_compatible;

pub use mock::MockBackend;
pub use openai_compatible::OpenAICompatibleBackend;

use async_trait::async_trait;

use crate::error::Result;

/// Trait defining the interface for all LLM backends
///
/// Backends are Send + Sync so one client can serve every request.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Submit a prompt and wait for the model's answer
    async fn ask(&self, prompt: &str) -> Result<String>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete LLM client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum LlmClient {
    /// Any server implementing the OpenAI chat completions API
    OpenAICompatible(OpenAICompatibleBackend),
    /// Deterministic stub for testing and offline development
    Mock(MockBackend),
}

impl LlmClient {
    /// Create an LLM client from environment variables.
    ///
    /// Checks `LLM_BACKEND` to determine which backend to use. Anything
    /// unrecognized, and an `openai_compatible` selection with no host
    /// configured, falls back to the mock so the service stays usable
    /// without a model server.
    pub fn from_env() -> Self {
        let backend = std::env::var("LLM_BACKEND").unwrap_or_else(|_| "mock".to_string());

        match backend.to_lowercase().as_str() {
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                match OpenAICompatibleBackend::from_env() {
                    Some(b) => LlmClient::OpenAICompatible(b),
                    None => {
                        tracing::warn!(
                            "OPENAI_COMPATIBLE_HOST not set, falling back to mock backend"
                        );
                        LlmClient::Mock(MockBackend::new())
                    }
                }
            }
            "mock" => LlmClient::Mock(MockBackend::new()),
            other => {
                tracing::warn!(backend = %other, "Unknown LLM_BACKEND, falling back to mock");
                LlmClient::Mock(MockBackend::new())
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        LlmClient::Mock(MockBackend::new())
    }

    /// Create a mock backend whose `ask` always fails, for exercising
    /// refund paths
    pub fn failing_mock() -> Self {
        LlmClient::Mock(MockBackend::failing())
    }
}

#[async_trait]
impl LlmBackend for LlmClient {
    async fn ask(&self, prompt: &str) -> Result<String> {
        match self {
            LlmClient::OpenAICompatible(b) => b.ask(prompt).await,
            LlmClient::Mock(b) => b.ask(prompt).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            LlmClient::OpenAICompatible(b) => b.health_check().await,
            LlmClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            LlmClient::OpenAICompatible(b) => b.model(),
            LlmClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            LlmClient::OpenAICompatible(b) => b.host(),
            LlmClient::Mock(b) => b.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_client_identity() {
        let client = LlmClient::mock();
        assert_eq!(client.model(), "mock");
        assert_eq!(client.host(), "mock://localhost");
    }

    #[tokio::test]
    async fn mock_health_check() {
        assert!(LlmClient::mock().health_check().await);
        assert!(!LlmClient::failing_mock().health_check().await);
    }

    #[tokio::test]
    async fn failing_mock_rejects_prompts() {
        let err = LlmClient::failing_mock().ask("anything").await.unwrap_err();
        assert!(matches!(err, crate::error::Error::ProviderUnavailable(_)));
    }
}
