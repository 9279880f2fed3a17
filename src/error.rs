//! Error types for the agent and retrieval subsystems.
//!
//! Each subsystem has its own error enum; [`Error`] wraps them for callers
//! that drive both (the CLI, mostly).

use thiserror::Error;

/// Crate-level result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Agent / orchestration failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Retrieval tree or store failure.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// I/O failure (prompt files, CLI inputs).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A CLI command could not complete.
    #[error("{0}")]
    Command(String),
}

/// Errors raised by agents, providers, tools, and the orchestrator.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured for a provider that needs one.
    #[error("API key missing: set OPENAI_API_KEY or AGENTREE_API_KEY")]
    ApiKeyMissing,

    /// The configured provider name is not known.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name as configured.
        name: String,
    },

    /// The provider call failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Provider error message.
        message: String,
        /// HTTP status, when the provider reports one.
        status: Option<u16>,
    },

    /// A streaming response failed mid-stream.
    #[error("stream error: {message}")]
    Stream {
        /// Stream error message.
        message: String,
    },

    /// A model response could not be parsed.
    #[error("failed to parse response: {message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// The raw content that failed to parse.
        content: String,
    },

    /// A tool call could not be executed.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Tool name.
        name: String,
        /// Failure description.
        message: String,
    },

    /// Tool registration failed.
    #[error("tool '{name}' is already registered")]
    DuplicateTool {
        /// Tool name.
        name: String,
    },

    /// The planning call failed; the run is aborted.
    #[error("planning failed: {0}")]
    Planning(#[source] Box<AgentError>),

    /// The synthesis call failed; the run is aborted.
    #[error("synthesis failed: {0}")]
    Synthesis(#[source] Box<AgentError>),

    /// Any other orchestration failure (validation, task join).
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Failure description.
        message: String,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Failure description.
        message: String,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl AgentError {
    /// Returns `true` if this error is (or wraps) a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Planning(inner) | Self::Synthesis(inner) => inner.is_cancelled(),
            _ => false,
        }
    }
}

/// Errors raised by the retrieval tree, base store, embedders, and summarizers.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Invalid tree configuration.
    #[error("invalid retrieval config: {name} {message}")]
    InvalidConfig {
        /// Parameter name.
        name: &'static str,
        /// Constraint that was violated.
        message: String,
    },

    /// A document was added without an id.
    #[error("document ID is required")]
    MissingDocumentId,

    /// A document was added to the tree without an embedding.
    #[error("document '{id}' has no embedding")]
    MissingEmbedding {
        /// Document id.
        id: String,
    },

    /// The embedding capability failed.
    #[error("embedding failed: {message}")]
    Embedding {
        /// Failure description.
        message: String,
    },

    /// The summarization capability failed.
    #[error("summarization failed: {message}")]
    Summarization {
        /// Failure description.
        message: String,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

/// Marker produced when a [`CancellationToken`](tokio_util::sync::CancellationToken)
/// fires before an outbound call completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl From<Cancelled> for AgentError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<Cancelled> for RetrievalError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}
