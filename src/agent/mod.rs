//! Multi-agent task orchestration.
//!
//! A planner decomposes a query into subtasks with dependencies, workers
//! execute the subtasks level by level, and a synthesizer combines their
//! results. Uses a pluggable provider abstraction backed by
//! OpenAI-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! User query → TaskOrchestrator
//!   ├── PlannerAgent (query → TaskPlan, lenient parse)
//!   ├── group_by_level (dependency DAG → levels)
//!   ├── For each level: fan out ≤ max_workers concurrent WorkerAgents
//!   │   └── WorkerPool resolves worker_type → worker (or default executor)
//!   └── SynthesizerAgent → final response
//! ```
//!
//! # Feature Gate
//!
//! The `OpenAI` provider requires the `openai` feature flag:
//! ```toml
//! [dependencies]
//! agentree = { version = "...", features = ["openai"] }
//! ```

pub mod calculator;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod message;
pub mod orchestrator;
pub mod plan;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod synthesizer;
pub mod tool;
pub mod traits;
pub mod worker;

// Re-export key types
pub use calculator::Calculator;
pub use client::create_provider;
pub use config::AgentConfig;
pub use dispatch::WorkerPool;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::TaskOrchestrator;
pub use plan::{
    ParsedPlan, RunResponse, Step, StepKind, Subtask, SubtaskResult, TaskPlan, group_by_level,
    parse_plan,
};
pub use planner::PlannerAgent;
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use synthesizer::SynthesizerAgent;
pub use tool::{Tool, ToolCall, ToolDefinition, ToolOutput, ToolRegistry};
pub use traits::{Agent, AgentResponse};
pub use worker::{WorkerAgent, WorkerAgentBuilder};
