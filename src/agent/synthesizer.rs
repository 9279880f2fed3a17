//! Synthesizer agent for combining subtask results.
//!
//! Receives every subtask result, successful or not, and produces the
//! final answer to the original query.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::config::AgentConfig;
use super::plan::SubtaskResult;
use super::prompt::{PromptSet, build_synthesis_prompt};
use super::provider::LlmProvider;
use super::traits::{Agent, AgentResponse};
use crate::error::AgentError;

/// Agent that synthesizes subtask results into a final response.
pub struct SynthesizerAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    template: String,
}

impl SynthesizerAgent {
    /// Creates a synthesizer from configuration and prompts.
    #[must_use]
    pub fn new(config: &AgentConfig, prompts: &PromptSet) -> Self {
        Self {
            model: config.synthesizer_model.clone(),
            max_tokens: config.synthesizer_max_tokens,
            system_prompt: prompts.synthesizer.clone(),
            template: prompts.synthesis.clone(),
        }
    }

    /// Synthesizes `results` (in plan order) into an answer for `query`.
    ///
    /// # Errors
    ///
    /// Returns the provider error, or [`AgentError::Cancelled`].
    pub async fn synthesize(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        results: &[SubtaskResult],
        cancel: &CancellationToken,
    ) -> Result<AgentResponse, AgentError> {
        let user_msg = build_synthesis_prompt(&self.template, query, results);
        self.execute(provider, &user_msg, cancel).await
    }
}

#[async_trait]
impl Agent for SynthesizerAgent {
    fn name(&self) -> &str {
        "synthesizer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
