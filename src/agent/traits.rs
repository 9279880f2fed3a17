//! Agent trait definition.
//!
//! The planner, the synthesizer, and every worker implement this trait,
//! which gives them a uniform way to turn their configuration into a
//! [`ChatRequest`] and run it against a provider.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::message::{ChatMessage, ChatRequest, TokenUsage, system_message, user_message};
use super::provider::{LlmProvider, chat_cancellable};
use super::tool::{ToolCall, ToolDefinition};
use crate::error::AgentError;

/// Response from an agent execution.
#[derive(Debug, Clone, Default)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Tool calls the model requested.
    pub tool_calls: Vec<ToolCall>,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// Trait implemented by all agents in the system.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature. `None` leaves it to the provider.
    fn temperature(&self) -> Option<f32> {
        None
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Builds a request: system prompt, then `history`, then `user_msg`.
    fn build_request(
        &self,
        history: &[ChatMessage],
        user_msg: &str,
        tools: Vec<ToolDefinition>,
    ) -> ChatRequest {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(system_message(self.system_prompt()));
        messages.extend_from_slice(history);
        messages.push(user_message(user_msg));

        ChatRequest {
            model: self.model().to_string(),
            messages,
            temperature: self.temperature(),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
            stream: false,
            tools,
        }
    }

    /// Executes the agent with prior conversation turns (no tools).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Cancelled`] if `cancel` fires, or the
    /// provider's error.
    async fn execute_with_history(
        &self,
        provider: &dyn LlmProvider,
        history: &[ChatMessage],
        user_msg: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentResponse, AgentError> {
        let request = self.build_request(history, user_msg, Vec::new());
        let response = chat_cancellable(provider, &request, cancel).await?;

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            tool_calls: response.tool_calls,
            finish_reason: response.finish_reason,
        })
    }

    /// Executes the agent with a single user message (no tools).
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Cancelled`] if `cancel` fires, or the
    /// provider's error.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentResponse, AgentError> {
        self.execute_with_history(provider, &[], user_msg, cancel)
            .await
    }
}
