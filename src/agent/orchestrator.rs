//! Orchestrator for plan/execute/synthesize workflows.
//!
//! Coordinates the full pipeline: plan → group subtasks into dependency
//! levels → fan out each level to workers → synthesize the results.
//! Levels are barriers: no subtask of level N+1 starts before every
//! subtask of level N has finished.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{AgentConfig, validate_max_workers};
use super::dispatch::WorkerPool;
use super::message::{ChatMessage, TokenUsage};
use super::plan::{
    RunResponse, Step, StepKind, Subtask, SubtaskResult, TaskPlan, group_by_level,
};
use super::planner::PlannerAgent;
use super::prompt::{PromptSet, build_task_input};
use super::provider::LlmProvider;
use super::synthesizer::SynthesizerAgent;
use super::tool::ToolRegistry;
use super::worker::{WorkerAgent, WorkerAgentBuilder};
use crate::core::run_cancellable;
use crate::error::AgentError;

/// Maximum accepted query length in bytes.
pub const MAX_QUERY_LEN: usize = 10_000;

/// Results and usage accumulated by the subtasks of a run.
#[derive(Debug, Default)]
struct Aggregate {
    results: BTreeMap<String, SubtaskResult>,
    usage: TokenUsage,
}

/// Orchestrates multi-agent task execution.
///
/// Owns the provider, the tool registry, and the worker pool. Workers
/// registered through [`TaskOrchestrator::with_default_workers`] are bound
/// to the orchestrator's provider and registry at the time of the call.
pub struct TaskOrchestrator {
    provider: Arc<dyn LlmProvider>,
    config: AgentConfig,
    prompts: PromptSet,
    tools: Arc<ToolRegistry>,
    workers: WorkerPool,
}

impl TaskOrchestrator {
    /// Creates an orchestrator with no registered workers.
    ///
    /// Loads prompt templates from [`AgentConfig::prompt_dir`], falling
    /// back to compiled-in defaults. Every subtask runs on the default
    /// executor until workers are registered.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] if `max_workers` is zero or
    /// too large for a semaphore.
    pub fn new(provider: Arc<dyn LlmProvider>, config: AgentConfig) -> Result<Self, AgentError> {
        validate_max_workers(config.max_workers)?;
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        let default_executor = WorkerAgentBuilder::default_executor()
            .with_config(&config)
            .provider(Arc::clone(&provider))
            .build()?;

        Ok(Self {
            provider,
            config,
            prompts,
            tools: Arc::new(ToolRegistry::new()),
            workers: WorkerPool::new(default_executor),
        })
    }

    /// Replaces the prompt set.
    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Replaces the tool registry used by workers registered afterwards.
    #[must_use]
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    /// Registers a worker, replacing any worker with the same name.
    #[must_use]
    pub fn with_worker(mut self, worker: WorkerAgent) -> Self {
        if self.workers.register(worker).is_some() {
            debug!("Replaced existing worker registration");
        }
        self
    }

    /// Registers the built-in worker presets (`general`, `calculator`,
    /// `researcher`, `writer`), bound to this orchestrator's provider and
    /// tool registry.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] if a preset fails to build.
    pub fn with_default_workers(mut self) -> Result<Self, AgentError> {
        for preset in WorkerAgentBuilder::presets() {
            let worker = self.bind(preset).build()?;
            self.workers.register(worker);
        }
        Ok(self)
    }

    /// Binds a worker builder to this orchestrator's provider, registry,
    /// and worker model settings.
    #[must_use]
    pub fn bind(&self, builder: WorkerAgentBuilder) -> WorkerAgentBuilder {
        builder
            .with_config(&self.config)
            .provider(Arc::clone(&self.provider))
            .registry(Arc::clone(&self.tools))
    }

    /// The registered workers.
    #[must_use]
    pub const fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    /// The tool registry.
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Runs the full pipeline for `query`.
    ///
    /// # Errors
    ///
    /// See [`TaskOrchestrator::run_with_history`].
    pub async fn run(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<RunResponse, AgentError> {
        self.run_with_history(&[], query, cancel).await
    }

    /// Runs the full pipeline with prior conversation turns.
    ///
    /// `history` is placed between the system prompt and the planning
    /// message; workers and the synthesizer do not see it.
    ///
    /// # Steps
    ///
    /// 1. Plan via [`PlannerAgent`] (unusable plans fall back to one task)
    /// 2. Group subtasks into dependency levels
    /// 3. Fan out each level with at most `max_workers` in flight
    /// 4. Synthesize results via [`SynthesizerAgent`]
    ///
    /// Subtask failures never fail the run; they are handed to synthesis.
    ///
    /// # Errors
    ///
    /// - [`AgentError::Orchestration`] for an empty or oversized query
    /// - [`AgentError::Planning`] if the planning call fails
    /// - [`AgentError::Synthesis`] if the synthesis call fails
    /// - [`AgentError::Cancelled`] if `cancel` fires
    pub async fn run_with_history(
        &self,
        history: &[ChatMessage],
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<RunResponse, AgentError> {
        validate_query(query)?;
        let start = Instant::now();

        // Step 1: plan
        let planner = PlannerAgent::new(&self.config, &self.prompts);
        let (parsed, plan_usage) = planner
            .plan(&*self.provider, history, query, cancel)
            .await
            .map_err(|e| wrap_stage(e, AgentError::Planning))?;
        let (plan, plan_fallback) = parsed.into_parts();

        info!(
            subtasks = plan.subtasks.len(),
            fallback = plan_fallback,
            "Plan created"
        );

        let mut steps = vec![Step::text(StepKind::Planning, plan.analysis.clone())];

        // Step 2: level
        let levels = group_by_level(&plan);
        let level_ids: Vec<Vec<String>> = levels
            .iter()
            .map(|level| level.iter().map(|t| t.id.clone()).collect())
            .collect();

        // Step 3: execute
        let Aggregate {
            results: mut by_id,
            usage: worker_usage,
        } = self.execute_levels(&plan, levels, cancel).await?;

        let results: Vec<SubtaskResult> = plan
            .subtasks
            .iter()
            .filter_map(|t| by_id.remove(&t.id))
            .collect();
        steps.extend(results.iter().map(Step::for_result));

        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            warn!(failed, total = results.len(), "Some subtasks failed");
        }

        // Step 4: synthesize
        let synthesizer = SynthesizerAgent::new(&self.config, &self.prompts);
        let synthesis = synthesizer
            .synthesize(&*self.provider, query, &results, cancel)
            .await
            .map_err(|e| wrap_stage(e, AgentError::Synthesis))?;

        steps.push(Step::text(StepKind::Synthesis, synthesis.content.clone()));
        let usage = plan_usage + worker_usage + synthesis.usage;
        let elapsed = start.elapsed();

        info!(
            subtasks = results.len(),
            failed,
            total_tokens = usage.total_tokens,
            elapsed_ms = elapsed.as_millis(),
            "Run complete"
        );

        Ok(RunResponse {
            output: synthesis.content,
            steps,
            usage,
            results,
            levels: level_ids,
            plan,
            plan_fallback,
            elapsed,
        })
    }

    /// Executes levels in order, fanning out within each level.
    async fn execute_levels(
        &self,
        plan: &TaskPlan,
        levels: Vec<Vec<Subtask>>,
        cancel: &CancellationToken,
    ) -> Result<Aggregate, AgentError> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let aggregate = Arc::new(Mutex::new(Aggregate::default()));
        let level_count = levels.len();

        for (index, level) in levels.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            // Every earlier level has finished, so this snapshot holds all
            // results a task in this level can depend on.
            let completed = aggregate.lock().await.results.clone();
            debug!(
                level = index + 1,
                of = level_count,
                tasks = level.len(),
                "Executing level"
            );

            let mut handles = Vec::with_capacity(level.len());
            for task in level {
                let input =
                    build_task_input(&task.input, plan.dependencies_of(&task.id), &completed);
                let worker = Arc::clone(self.workers.resolve(&task.worker_type));
                debug!(task_id = %task.id, worker = %task.worker_type, "Dispatching subtask");

                let sem = Arc::clone(&semaphore);
                let agg = Arc::clone(&aggregate);
                let token = cancel.clone();
                let request_delay = self.config.request_delay;
                let task_id = task.id.clone();

                let handle = tokio::spawn(async move {
                    let (result, usage) =
                        run_subtask(&worker, &task, &input, &sem, request_delay, &token).await;
                    let mut guard = agg.lock().await;
                    guard.results.insert(task.id, result);
                    guard.usage += usage;
                });
                handles.push((task_id, handle));
            }

            for (task_id, handle) in handles {
                if let Err(e) = handle.await {
                    let failure = SubtaskResult::failed(
                        task_id.clone(),
                        format!("Task join failed: {e}"),
                        Duration::ZERO,
                    );
                    aggregate.lock().await.results.insert(task_id, failure);
                }
            }

            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
        }

        let mut guard = aggregate.lock().await;
        Ok(std::mem::take(&mut *guard))
    }
}

/// Runs one subtask under the worker semaphore.
///
/// Waiting for a permit is abandoned if `cancel` fires; the subtask is
/// then recorded as cancelled.
async fn run_subtask(
    worker: &WorkerAgent,
    task: &Subtask,
    input: &str,
    semaphore: &Semaphore,
    request_delay: Duration,
    cancel: &CancellationToken,
) -> (SubtaskResult, TokenUsage) {
    let start = Instant::now();
    let permit = match run_cancellable(cancel, semaphore.acquire()).await {
        Ok(Ok(permit)) => permit,
        Ok(Err(e)) => {
            let message = AgentError::Orchestration {
                message: format!("Semaphore acquire failed: {e}"),
            };
            return (
                SubtaskResult::failed(&task.id, message.to_string(), start.elapsed()),
                TokenUsage::default(),
            );
        }
        Err(cancelled) => {
            return (
                SubtaskResult::failed(
                    &task.id,
                    AgentError::from(cancelled).to_string(),
                    start.elapsed(),
                ),
                TokenUsage::default(),
            );
        }
    };

    if !request_delay.is_zero()
        && let Err(cancelled) = run_cancellable(cancel, tokio::time::sleep(request_delay)).await
    {
        return (
            SubtaskResult::failed(
                &task.id,
                AgentError::from(cancelled).to_string(),
                start.elapsed(),
            ),
            TokenUsage::default(),
        );
    }

    let outcome = worker.execute_task(&task.id, input, cancel).await;
    drop(permit);
    outcome
}

/// Rejects empty and oversized queries.
fn validate_query(query: &str) -> Result<(), AgentError> {
    if query.trim().is_empty() {
        return Err(AgentError::Orchestration {
            message: "Query cannot be empty".to_string(),
        });
    }
    if query.len() > MAX_QUERY_LEN {
        return Err(AgentError::Orchestration {
            message: format!(
                "Query exceeds maximum length ({} bytes, max {MAX_QUERY_LEN})",
                query.len()
            ),
        });
    }
    Ok(())
}

/// Wraps a stage failure, passing cancellation through unchanged.
fn wrap_stage(err: AgentError, wrap: fn(Box<AgentError>) -> AgentError) -> AgentError {
    if err.is_cancelled() {
        AgentError::Cancelled
    } else {
        wrap(Box::new(err))
    }
}
