//! Cluster summarization.

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatRequest, system_message, user_message};
use crate::agent::prompt::SUMMARIZER_SYSTEM_PROMPT;
use crate::agent::provider::LlmProvider;
use crate::core::text::clip;
use crate::error::RetrievalError;

/// Separator between inputs in an [`LlmSummarizer`] prompt.
const LLM_INPUT_SEPARATOR: &str = "\n\n---\n\n";

/// Turns several texts into one summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarizes `texts`. An empty slice yields an empty summary.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Summarization`] when the backend fails.
    async fn summarize(&self, texts: &[String]) -> Result<String, RetrievalError>;
}

/// Truncate-and-join summarizer.
///
/// Each input contributes at most `max(200 / n, 50)` characters (followed by
/// `"..."` when cut), joined with `" | "`. Needs no model, so it is the
/// default for offline trees.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatSummarizer;

impl ConcatSummarizer {
    /// Summarizes without going through the async trait.
    #[must_use]
    pub fn summarize_sync(texts: &[String]) -> String {
        if texts.is_empty() {
            return String::new();
        }
        let per_text = (200 / texts.len()).max(50);
        texts
            .iter()
            .map(|t| clip(t, per_text))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

#[async_trait]
impl Summarizer for ConcatSummarizer {
    async fn summarize(&self, texts: &[String]) -> Result<String, RetrievalError> {
        Ok(Self::summarize_sync(texts))
    }
}

/// Summarizer backed by a chat model.
///
/// Inputs are joined with a `---` separator and sent as one user message
/// under the summarizer system prompt.
pub struct LlmSummarizer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl LlmSummarizer {
    /// Creates a summarizer using the worker model from `config`.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, config: &AgentConfig) -> Self {
        Self {
            provider,
            model: config.worker_model.clone(),
            max_tokens: config.worker_max_tokens,
            system_prompt: SUMMARIZER_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Replaces the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, texts: &[String]) -> Result<String, RetrievalError> {
        if texts.is_empty() {
            return Ok(String::new());
        }
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                system_message(&self.system_prompt),
                user_message(&texts.join(LLM_INPUT_SEPARATOR)),
            ],
            max_tokens: Some(self.max_tokens),
            ..ChatRequest::default()
        };

        let response = self
            .provider
            .chat(&request)
            .await
            .map_err(|e| RetrievalError::Summarization {
                message: e.to_string(),
            })?;
        Ok(response.content.trim().to_string())
    }
}

impl std::fmt::Debug for LlmSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSummarizer")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
