//! Mock backend for testing and offline development
//!
//! Returns a deterministic echo of the prompt, so the full inquiry flow
//! can run without a model server. A failing variant exercises the
//! refund path.

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::LlmBackend;

/// Prompts are truncated to this many characters in the echo
const ECHO_LIMIT: usize = 200;

/// Mock LLM backend
#[derive(Clone, Default)]
pub struct MockBackend {
    /// When true, `ask` fails with `ProviderUnavailable` and
    /// `health_check` reports unhealthy
    pub fail: bool,
}

impl MockBackend {
    /// Create a healthy mock backend
    pub fn new() -> Self {
        Self { fail: false }
    }

    /// Create a mock backend whose `ask` always fails
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn ask(&self, prompt: &str) -> Result<String> {
        if self.fail {
            return Err(Error::ProviderUnavailable(
                "mock backend configured to fail".into(),
            ));
        }

        let head: String = prompt.chars().take(ECHO_LIMIT).collect();
        let ellipsis = if prompt.chars().count() > ECHO_LIMIT {
            "..."
        } else {
            ""
        };
        Ok(format!(
            "[Stubbed LLM response]\nYou asked: {}{}",
            head, ellipsis
        ))
    }

    async fn health_check(&self) -> bool {
        !self.fail
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_the_prompt() {
        let answer = MockBackend::new().ask("What does the chart say?").await.unwrap();
        assert!(answer.starts_with("[Stubbed LLM response]"));
        assert!(answer.contains("What does the chart say?"));
        assert!(!answer.ends_with("..."));
    }

    #[tokio::test]
    async fn truncates_long_prompts() {
        let prompt = "帝".repeat(500);
        let answer = MockBackend::new().ask(&prompt).await.unwrap();
        assert!(answer.ends_with("..."));
    }

    #[tokio::test]
    async fn answers_are_deterministic() {
        let mock = MockBackend::new();
        assert_eq!(mock.ask("same").await.unwrap(), mock.ask("same").await.unwrap());
    }

    #[tokio::test]
    async fn failing_variant() {
        let mock = MockBackend::failing();
        assert!(!mock.health_check().await);
        assert!(mock.ask("anything").await.is_err());
    }
}
