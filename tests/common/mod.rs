//! Shared test doubles for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use agentree::agent::message::{ChatRequest, ChatResponse, Role, TokenUsage};
use agentree::agent::prompt::{ORCHESTRATOR_SYSTEM_PROMPT, SYNTHESIZER_SYSTEM_PROMPT};
use agentree::agent::LlmProvider;
use agentree::error::AgentError;
use async_trait::async_trait;

/// Tokens reported for every call.
pub const TOKENS_PER_CALL: u32 = 10;

/// Which pipeline stage a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Planning,
    Worker,
    Synthesis,
}

/// Provider that answers by stage.
///
/// Planning calls get the scripted plan, worker calls echo their input as
/// `out:<input>` (or fail when the input contains `FAIL`), and synthesis
/// calls answer `final answer`.
pub struct MockProvider {
    plan: String,
    fail_planning: bool,
    fail_synthesis: bool,
    worker_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<(Stage, ChatRequest)>>,
}

impl MockProvider {
    pub fn new(plan: impl Into<String>) -> Self {
        Self {
            plan: plan.into(),
            fail_planning: false,
            fail_synthesis: false,
            worker_delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub const fn failing_planning(mut self) -> Self {
        self.fail_planning = true;
        self
    }

    #[must_use]
    pub const fn failing_synthesis(mut self) -> Self {
        self.fail_synthesis = true;
        self
    }

    #[must_use]
    pub const fn with_worker_delay(mut self, delay: Duration) -> Self {
        self.worker_delay = delay;
        self
    }

    /// Highest number of worker calls observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Requests seen for `stage`, in arrival order.
    pub fn requests(&self, stage: Stage) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| {
                r.iter()
                    .filter(|(s, _)| *s == stage)
                    .map(|(_, req)| req.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total requests of any stage.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    fn stage_of(request: &ChatRequest) -> Stage {
        match request.messages.first() {
            Some(m) if m.role == Role::System && m.content == ORCHESTRATOR_SYSTEM_PROMPT => {
                Stage::Planning
            }
            Some(m) if m.role == Role::System && m.content == SYNTHESIZER_SYSTEM_PROMPT => {
                Stage::Synthesis
            }
            _ => Stage::Worker,
        }
    }

    async fn worker_reply(&self, input: &str) -> Result<ChatResponse, AgentError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.worker_delay.is_zero() {
            tokio::time::sleep(self.worker_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if input.contains("FAIL") {
            return Err(AgentError::ApiRequest {
                message: "worker backend unavailable".to_string(),
                status: Some(503),
            });
        }
        let first_line = input.lines().next().unwrap_or_default();
        Ok(reply(&format!("out:{first_line}")))
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let stage = Self::stage_of(request);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((stage, request.clone()));
        }

        match stage {
            Stage::Planning if self.fail_planning => Err(AgentError::ApiRequest {
                message: "planner down".to_string(),
                status: Some(500),
            }),
            Stage::Planning => Ok(reply(&self.plan)),
            Stage::Synthesis if self.fail_synthesis => Err(AgentError::ApiRequest {
                message: "synthesizer down".to_string(),
                status: Some(500),
            }),
            Stage::Synthesis => Ok(reply("final answer")),
            Stage::Worker => {
                let input = request
                    .messages
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                self.worker_reply(&input).await
            }
        }
    }
}

pub fn reply(content: &str) -> ChatResponse {
    ChatResponse {
        content: content.to_string(),
        usage: TokenUsage {
            prompt_tokens: TOKENS_PER_CALL / 2,
            completion_tokens: TOKENS_PER_CALL / 2,
            total_tokens: TOKENS_PER_CALL,
        },
        ..ChatResponse::default()
    }
}
