//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls. Retries and backoff live in the
//! provider; the orchestrator never retries a call itself.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;

use super::message::{ChatRequest, ChatResponse};
use crate::core::run_cancellable;
use crate::error::AgentError;

/// Boxed stream of text chunks.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, AgentError>> + Send>>;

/// Trait for LLM provider backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures, timeouts, or parse errors.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;

    /// Executes a streaming chat completion request.
    ///
    /// The default implementation performs a regular [`LlmProvider::chat`]
    /// and yields the full content as a single chunk.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on connection or streaming failures.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, AgentError> {
        let response = self.chat(request).await?;
        Ok(Box::pin(futures_util::stream::once(async move {
            Ok(response.content)
        })))
    }
}

/// Runs [`LlmProvider::chat`] under a cancellation token.
///
/// # Errors
///
/// Returns [`AgentError::Cancelled`] if `cancel` fires first, otherwise
/// whatever the provider returns.
pub async fn chat_cancellable(
    provider: &dyn LlmProvider,
    request: &ChatRequest,
    cancel: &CancellationToken,
) -> Result<ChatResponse, AgentError> {
    run_cancellable(cancel, provider.chat(request)).await?
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::agent::message::user_message;

    struct Fixed;

    #[async_trait]
    impl LlmProvider for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            Ok(ChatResponse {
                content: "hello".to_string(),
                ..ChatResponse::default()
            })
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "m".to_string(),
            messages: vec![user_message("hi")],
            ..ChatRequest::default()
        }
    }

    #[tokio::test]
    async fn test_default_stream_yields_single_chunk() {
        let stream = Fixed.chat_stream(&request()).await;
        let chunks: Vec<_> = match stream {
            Ok(s) => s.collect().await,
            Err(_) => Vec::new(),
        };
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_deref().unwrap_or_default(), "hello");
    }

    #[tokio::test]
    async fn test_chat_cancellable() {
        let token = CancellationToken::new();
        let ok = chat_cancellable(&Fixed, &request(), &token).await;
        assert_eq!(ok.map(|r| r.content).unwrap_or_default(), "hello");

        token.cancel();
        let cancelled = chat_cancellable(&Fixed, &request(), &token).await;
        assert!(matches!(cancelled, Err(AgentError::Cancelled)));
    }
}
