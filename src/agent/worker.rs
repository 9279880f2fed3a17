//! Worker agents that execute individual subtasks.
//!
//! A worker owns a role prompt, an optional tool subset, and an optional
//! bound provider. Workers never fail the run: every outcome, including a
//! missing provider or a failed call, comes back as a [`SubtaskResult`].

use std::fmt;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::config::AgentConfig;
use super::message::TokenUsage;
use super::plan::{GENERAL_WORKER, SubtaskResult};
use super::prompt::DEFAULT_EXECUTOR_PROMPT;
use super::provider::{LlmProvider, chat_cancellable};
use super::tool::{ToolCall, ToolRegistry};
use super::traits::Agent;
use crate::core::run_cancellable;
use crate::error::AgentError;

/// Error recorded when a worker runs without a provider.
pub const NO_PROVIDER_ERROR: &str = "LLM provider not configured for worker";

/// Name of the executor used when no worker matches a subtask.
pub const DEFAULT_EXECUTOR: &str = "default";

const CALCULATOR_PROMPT: &str = "You are a mathematical computation specialist.
Solve mathematical problems step by step, showing your work.
Use the calculator tool for accurate computations.";

const RESEARCHER_PROMPT: &str = "You are a research specialist.
Analyze information thoroughly and provide well-reasoned conclusions.
Cite sources and explain your reasoning.";

const WRITER_PROMPT: &str = "You are a skilled content writer.
Create clear, engaging, and well-structured content.
Adapt your style to the task requirements.";

const GENERAL_PROMPT: &str = "You are a general-purpose AI assistant.
Handle the given task thoughtfully and provide a clear, helpful response.";

/// An agent specialized for one kind of subtask.
pub struct WorkerAgent {
    name: String,
    description: String,
    system_prompt: String,
    tool_names: Vec<String>,
    model: String,
    max_tokens: u32,
    provider: Option<Arc<dyn LlmProvider>>,
    registry: Option<Arc<ToolRegistry>>,
}

impl WorkerAgent {
    /// Starts a builder for a worker with the given name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> WorkerAgentBuilder {
        WorkerAgentBuilder::new(name)
    }

    /// Worker description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Names of the tools this worker may call.
    #[must_use]
    pub fn tool_names(&self) -> &[String] {
        &self.tool_names
    }

    /// Whether a provider is bound.
    #[must_use]
    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Executes one subtask.
    ///
    /// Tool definitions are offered only when the worker has both a tool
    /// subset and a registry. If the model answers with tool calls they are
    /// executed in order and their outputs, one per line, become the
    /// result. Usage is zero whenever no model response was received.
    pub async fn execute_task(
        &self,
        task_id: &str,
        input: &str,
        cancel: &CancellationToken,
    ) -> (SubtaskResult, TokenUsage) {
        let start = Instant::now();

        let Some(provider) = self.provider.as_deref() else {
            return (
                SubtaskResult::failed(task_id, NO_PROVIDER_ERROR, start.elapsed()),
                TokenUsage::default(),
            );
        };

        let tools = match &self.registry {
            Some(registry) if !self.tool_names.is_empty() => {
                registry.definitions_for(&self.tool_names)
            }
            _ => Vec::new(),
        };
        let offers_tools = !tools.is_empty();
        let request = self.build_request(&[], input, tools);

        debug!(worker = %self.name, task_id, offers_tools, "Executing subtask");

        let response = match chat_cancellable(provider, &request, cancel).await {
            Ok(r) => r,
            Err(e) => {
                return (
                    SubtaskResult::failed(task_id, e.to_string(), start.elapsed()),
                    TokenUsage::default(),
                );
            }
        };

        let output = if offers_tools && response.has_tool_calls() {
            match self.run_tool_calls(&response.tool_calls, cancel).await {
                Ok(out) => out,
                Err(e) => {
                    return (
                        SubtaskResult::failed(task_id, e.to_string(), start.elapsed()),
                        response.usage,
                    );
                }
            }
        } else {
            response.content
        };

        (
            SubtaskResult::succeeded(task_id, output, start.elapsed()),
            response.usage,
        )
    }

    /// Runs tool calls sequentially and joins their outputs.
    ///
    /// Calls naming a tool outside this worker's subset are reported as
    /// errors without being executed.
    async fn run_tool_calls(
        &self,
        calls: &[ToolCall],
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let mut lines = String::new();
        for call in calls {
            let outcome = match &self.registry {
                Some(registry) if self.tool_names.iter().any(|n| *n == call.name) => {
                    run_cancellable(cancel, registry.execute(call)).await?
                }
                _ => Err(AgentError::ToolExecution {
                    name: call.name.clone(),
                    message: "tool not available to this worker".to_string(),
                }),
            };

            if !lines.is_empty() {
                lines.push('\n');
            }
            match outcome {
                Ok(output) => {
                    let _ = write!(lines, "{}: {output}", call.name);
                }
                Err(AgentError::ToolExecution { message, .. }) => {
                    let _ = write!(lines, "{} error: {message}", call.name);
                }
                Err(e) => {
                    let _ = write!(lines, "{} error: {e}", call.name);
                }
            }
        }
        Ok(lines)
    }
}

impl Agent for WorkerAgent {
    fn name(&self) -> &str {
        &self.name
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

impl fmt::Debug for WorkerAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerAgent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("tools", &self.tool_names)
            .field("has_provider", &self.provider.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`WorkerAgent`].
#[derive(Clone, Default)]
pub struct WorkerAgentBuilder {
    name: String,
    description: String,
    system_prompt: Option<String>,
    tool_names: Vec<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    provider: Option<Arc<dyn LlmProvider>>,
    registry: Option<Arc<ToolRegistry>>,
}

impl WorkerAgentBuilder {
    /// Creates a builder for a worker with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Preset for general reasoning tasks.
    #[must_use]
    pub fn general() -> Self {
        Self::new(GENERAL_WORKER)
            .description("A general-purpose assistant for reasoning and simple tasks")
            .system_prompt(GENERAL_PROMPT)
    }

    /// Preset for arithmetic, with access to the `calculator` tool.
    #[must_use]
    pub fn calculator() -> Self {
        Self::new("calculator")
            .description("Specialized in mathematical computations")
            .system_prompt(CALCULATOR_PROMPT)
            .tools(["calculator"])
    }

    /// Preset for information gathering.
    #[must_use]
    pub fn researcher() -> Self {
        Self::new("researcher")
            .description("Specialized in information gathering and analysis")
            .system_prompt(RESEARCHER_PROMPT)
    }

    /// Preset for content creation.
    #[must_use]
    pub fn writer() -> Self {
        Self::new("writer")
            .description("Specialized in content creation and editing")
            .system_prompt(WRITER_PROMPT)
    }

    /// Executor used when no registered worker matches.
    #[must_use]
    pub fn default_executor() -> Self {
        Self::new(DEFAULT_EXECUTOR)
            .description("Fallback executor")
            .system_prompt(DEFAULT_EXECUTOR_PROMPT)
    }

    /// All built-in presets, in registration order.
    #[must_use]
    pub fn presets() -> Vec<Self> {
        vec![
            Self::general(),
            Self::calculator(),
            Self::researcher(),
            Self::writer(),
        ]
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the tool subset. Duplicates are dropped.
    #[must_use]
    pub fn tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tool_names.clear();
        for name in names {
            let name = name.into();
            if !self.tool_names.contains(&name) {
                self.tool_names.push(name);
            }
        }
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the response token limit.
    #[must_use]
    pub const fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    /// Binds a provider.
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Binds a tool registry.
    #[must_use]
    pub fn registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Fills the model and token limit from `config` where unset.
    #[must_use]
    pub fn with_config(mut self, config: &AgentConfig) -> Self {
        if self.model.is_none() {
            self.model = Some(config.worker_model.clone());
        }
        if self.max_tokens.is_none() {
            self.max_tokens = Some(config.worker_max_tokens);
        }
        self
    }

    /// Builds the worker.
    ///
    /// Without an explicit prompt the worker uses
    /// `"You are a {name} agent. {description}"`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] if the name is empty.
    pub fn build(self) -> Result<WorkerAgent, AgentError> {
        if self.name.trim().is_empty() {
            return Err(AgentError::InvalidConfig {
                message: "worker name is required".to_string(),
            });
        }
        let defaults = AgentConfig::default();
        let system_prompt = self
            .system_prompt
            .unwrap_or_else(|| format!("You are a {} agent. {}", self.name, self.description));

        Ok(WorkerAgent {
            name: self.name,
            description: self.description,
            system_prompt,
            tool_names: self.tool_names,
            model: self.model.unwrap_or(defaults.worker_model),
            max_tokens: self.max_tokens.unwrap_or(defaults.worker_max_tokens),
            provider: self.provider,
            registry: self.registry,
        })
    }
}

impl fmt::Debug for WorkerAgentBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerAgentBuilder")
            .field("name", &self.name)
            .field("tools", &self.tool_names)
            .finish_non_exhaustive()
    }
}
