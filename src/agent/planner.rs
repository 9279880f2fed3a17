//! Planning agent.
//!
//! Turns a query into a [`TaskPlan`]. The response is parsed leniently: an
//! unusable response yields the single-task fallback plan rather than an
//! error.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::config::{AgentConfig, PLANNING_TEMPERATURE};
use super::message::{ChatMessage, TokenUsage};
use super::plan::{ParsedPlan, parse_plan};
use super::prompt::{PromptSet, build_planning_prompt};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::error::AgentError;

/// Agent that decomposes a query into subtasks.
pub struct PlannerAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
    template: String,
}

impl PlannerAgent {
    /// Creates a planner from configuration and prompts.
    #[must_use]
    pub fn new(config: &AgentConfig, prompts: &PromptSet) -> Self {
        Self {
            model: config.planner_model.clone(),
            max_tokens: config.planner_max_tokens,
            system_prompt: prompts.orchestrator.clone(),
            template: prompts.planning.clone(),
        }
    }

    /// Requests a plan for `query`, with `history` placed between the
    /// system prompt and the planning message.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the planning call fails, or
    /// [`AgentError::Cancelled`]. Parse failures are not errors.
    pub async fn plan(
        &self,
        provider: &dyn LlmProvider,
        history: &[ChatMessage],
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<(ParsedPlan, TokenUsage), AgentError> {
        let user_msg = build_planning_prompt(&self.template, query);
        let response = self
            .execute_with_history(provider, history, &user_msg, cancel)
            .await?;

        let parsed = parse_plan(&response.content, query);
        if let ParsedPlan::Fallback { reason, .. } = &parsed {
            warn!(reason = %reason, "Plan unusable, falling back to direct execution");
        }
        Ok((parsed, response.usage))
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &str {
        "planner"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// The planning prompt asks for a single JSON object.
    fn json_mode(&self) -> bool {
        true
    }

    fn temperature(&self) -> Option<f32> {
        Some(PLANNING_TEMPERATURE)
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
