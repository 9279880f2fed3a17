//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::AgentError;

/// Default maximum concurrently executing subtasks within a level.
pub const DEFAULT_MAX_WORKERS: usize = 5;
/// Default model for every role.
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Default planner max tokens.
const DEFAULT_PLANNER_MAX_TOKENS: u32 = 2048;
/// Default worker max tokens.
const DEFAULT_WORKER_MAX_TOKENS: u32 = 4096;
/// Default synthesizer max tokens.
const DEFAULT_SYNTHESIZER_MAX_TOKENS: u32 = 4096;
/// Sampling temperature for the planning call.
pub const PLANNING_TEMPERATURE: f32 = 0.3;

/// Configuration for the orchestrator and its agents.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider, if it needs one.
    pub api_key: Option<String>,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model for the planning call.
    pub planner_model: String,
    /// Model for worker subtask calls.
    pub worker_model: String,
    /// Model for the synthesis call.
    pub synthesizer_model: String,
    /// Model for embeddings.
    pub embedding_model: String,
    /// Maximum concurrently executing subtasks within one level.
    pub max_workers: usize,
    /// Maximum tokens for the planning response.
    pub planner_max_tokens: u32,
    /// Maximum tokens for worker responses.
    pub worker_max_tokens: u32,
    /// Maximum tokens for the synthesis response.
    pub synthesizer_max_tokens: u32,
    /// Directory containing prompt template files.
    ///
    /// Missing files fall back to compiled-in defaults.
    pub prompt_dir: Option<PathBuf>,
    /// Delay applied after a subtask acquires its worker slot.
    ///
    /// `Duration::ZERO` (default) disables rate limiting beyond the
    /// worker semaphore.
    pub request_delay: Duration,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] if a value is out of range.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfigBuilder::default().resolve()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    planner_model: Option<String>,
    worker_model: Option<String>,
    synthesizer_model: Option<String>,
    embedding_model: Option<String>,
    max_workers: Option<usize>,
    planner_max_tokens: Option<u32>,
    worker_max_tokens: Option<u32>,
    synthesizer_max_tokens: Option<u32>,
    prompt_dir: Option<PathBuf>,
    request_delay: Option<Duration>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("AGENTREE_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("AGENTREE_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("AGENTREE_BASE_URL"))
                .ok();
        }
        if self.planner_model.is_none() {
            self.planner_model = std::env::var("AGENTREE_PLANNER_MODEL").ok();
        }
        if self.worker_model.is_none() {
            self.worker_model = std::env::var("AGENTREE_WORKER_MODEL").ok();
        }
        if self.synthesizer_model.is_none() {
            self.synthesizer_model = std::env::var("AGENTREE_SYNTHESIZER_MODEL").ok();
        }
        if self.embedding_model.is_none() {
            self.embedding_model = std::env::var("AGENTREE_EMBEDDING_MODEL").ok();
        }
        if self.max_workers.is_none() {
            self.max_workers = env_parse("AGENTREE_MAX_WORKERS");
        }
        if self.request_delay.is_none() {
            self.request_delay = env_parse("AGENTREE_REQUEST_DELAY_MS").map(Duration::from_millis);
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("AGENTREE_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the planner model.
    #[must_use]
    pub fn planner_model(mut self, model: impl Into<String>) -> Self {
        self.planner_model = Some(model.into());
        self
    }

    /// Sets the worker model.
    #[must_use]
    pub fn worker_model(mut self, model: impl Into<String>) -> Self {
        self.worker_model = Some(model.into());
        self
    }

    /// Sets the synthesizer model.
    #[must_use]
    pub fn synthesizer_model(mut self, model: impl Into<String>) -> Self {
        self.synthesizer_model = Some(model.into());
        self
    }

    /// Sets the embedding model.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Sets the maximum number of concurrent workers.
    #[must_use]
    pub const fn max_workers(mut self, n: usize) -> Self {
        self.max_workers = Some(n);
        self
    }

    /// Sets the planner max tokens.
    #[must_use]
    pub const fn planner_max_tokens(mut self, n: u32) -> Self {
        self.planner_max_tokens = Some(n);
        self
    }

    /// Sets the worker max tokens.
    #[must_use]
    pub const fn worker_max_tokens(mut self, n: u32) -> Self {
        self.worker_max_tokens = Some(n);
        self
    }

    /// Sets the synthesizer max tokens.
    #[must_use]
    pub const fn synthesizer_max_tokens(mut self, n: u32) -> Self {
        self.synthesizer_max_tokens = Some(n);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the delay applied after acquiring a worker slot.
    #[must_use]
    pub const fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = Some(delay);
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidConfig`] if `max_workers` is zero or
    /// exceeds [`Semaphore::MAX_PERMITS`].
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        if let Some(n) = self.max_workers {
            validate_max_workers(n)?;
        }
        Ok(self.resolve())
    }

    fn resolve(self) -> AgentConfig {
        AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key: self.api_key,
            base_url: self.base_url,
            planner_model: self
                .planner_model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            worker_model: self
                .worker_model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            synthesizer_model: self
                .synthesizer_model
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            embedding_model: self
                .embedding_model
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            max_workers: self.max_workers.unwrap_or(DEFAULT_MAX_WORKERS),
            planner_max_tokens: self
                .planner_max_tokens
                .unwrap_or(DEFAULT_PLANNER_MAX_TOKENS),
            worker_max_tokens: self.worker_max_tokens.unwrap_or(DEFAULT_WORKER_MAX_TOKENS),
            synthesizer_max_tokens: self
                .synthesizer_max_tokens
                .unwrap_or(DEFAULT_SYNTHESIZER_MAX_TOKENS),
            prompt_dir: self.prompt_dir,
            request_delay: self.request_delay.unwrap_or(Duration::ZERO),
        }
    }
}

/// Checks that `n` can size the worker semaphore.
pub(crate) fn validate_max_workers(n: usize) -> Result<(), AgentError> {
    if n == 0 {
        return Err(AgentError::InvalidConfig {
            message: "max_workers must be at least 1".to_string(),
        });
    }
    if n > Semaphore::MAX_PERMITS {
        return Err(AgentError::InvalidConfig {
            message: format!("max_workers must be at most {}", Semaphore::MAX_PERMITS),
        });
    }
    Ok(())
}
