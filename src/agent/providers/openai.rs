//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible API (`OpenAI`, Azure, local proxies)
//! via the base URL override in [`AgentConfig`]. One client serves both
//! chat completions (workers, planner, synthesizer, summarizer) and
//! embeddings (retrieval tree).

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionTool, ChatCompletionToolType,
    CompletionUsage, CreateChatCompletionRequest, CreateChatCompletionResponse,
    CreateEmbeddingRequest, EmbeddingInput, FunctionObject, ResponseFormat,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::debug;

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::{ChatStream, LlmProvider};
use crate::agent::tool::{ToolCall, ToolDefinition};
use crate::embedding::{Embedder, Vector, ensure_batch_len};
use crate::error::{AgentError, RetrievalError};

/// Most inputs the embeddings endpoint accepts in one request.
const MAX_EMBEDDING_INPUTS: usize = 2048;

/// `OpenAI`-compatible chat and embedding provider.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    embedding_model: String,
}

impl OpenAiProvider {
    /// Creates a provider from agent configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is configured.
    pub fn new(config: &AgentConfig) -> Result<Self, AgentError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(AgentError::ApiKeyMissing)?;

        let mut sdk_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = config.base_url.as_deref() {
            sdk_config = sdk_config.with_api_base(base_url);
        }

        Ok(Self {
            client: Client::with_config(sdk_config),
            embedding_model: config.embedding_model.clone(),
        })
    }
}

/// Output dimension of known embedding models.
fn embedding_dimension(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        _ => 1536,
    }
}

fn api_error(e: &OpenAIError) -> AgentError {
    AgentError::ApiRequest {
        message: e.to_string(),
        status: None,
    }
}

fn to_sdk_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
    let text = msg.content.clone();
    match msg.role {
        Role::System => ChatCompletionRequestSystemMessage {
            content: ChatCompletionRequestSystemMessageContent::Text(text),
            name: None,
        }
        .into(),
        Role::User => ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(text),
            name: None,
        }
        .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessage {
            content: Some(ChatCompletionRequestAssistantMessageContent::Text(text)),
            ..Default::default()
        }
        .into(),
    }
}

fn to_sdk_tool(def: &ToolDefinition) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: def.name.clone(),
            description: Some(def.description.clone()),
            parameters: Some(def.parameters.clone()),
            strict: None,
        },
    }
}

/// Translates a provider-agnostic request.
///
/// A temperature of exactly zero is left unset: some compatible backends
/// reject it for reasoning models, and the server default is close enough.
fn to_sdk_request(request: &ChatRequest) -> CreateChatCompletionRequest {
    CreateChatCompletionRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(to_sdk_message).collect(),
        temperature: request.temperature.filter(|&t| t != 0.0),
        max_completion_tokens: request.max_tokens,
        stream: request.stream.then_some(true),
        response_format: request.json_mode.then_some(ResponseFormat::JsonObject),
        tools: (!request.tools.is_empty())
            .then(|| request.tools.iter().map(to_sdk_tool).collect()),
        ..Default::default()
    }
}

fn from_sdk_usage(usage: Option<CompletionUsage>) -> TokenUsage {
    usage.map_or_else(TokenUsage::default, |u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    })
}

/// Takes the first choice; an empty choice list yields an empty response.
fn from_sdk_response(response: CreateChatCompletionResponse) -> ChatResponse {
    let usage = from_sdk_usage(response.usage);
    let Some(choice) = response.choices.into_iter().next() else {
        return ChatResponse {
            usage,
            ..ChatResponse::default()
        };
    };

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            id: tc.id,
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect();

    ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        usage,
        tool_calls,
        finish_reason: choice
            .finish_reason
            .map(|reason| format!("{reason:?}").to_lowercase()),
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("embedding_model", &self.embedding_model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let response = self
            .client
            .chat()
            .create(to_sdk_request(request))
            .await
            .map_err(|e| api_error(&e))?;
        Ok(from_sdk_response(response))
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatStream, AgentError> {
        let mut sdk_request = to_sdk_request(request);
        sdk_request.stream = Some(true);

        let stream = self
            .client
            .chat()
            .create_stream(sdk_request)
            .await
            .map_err(|e| api_error(&e))?;

        Ok(Box::pin(stream.map(|chunk| {
            chunk
                .map(|response| {
                    response
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content)
                        .unwrap_or_default()
                })
                .map_err(|e| AgentError::Stream {
                    message: e.to_string(),
                })
        })))
    }
}

#[async_trait]
impl Embedder for OpenAiProvider {
    async fn embed(&self, text: &str) -> Result<Vector, RetrievalError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| RetrievalError::Embedding {
            message: "empty embedding response".to_string(),
        })
    }

    /// Sends inputs in requests of at most 2048 and reassembles them in
    /// input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>, RetrievalError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_EMBEDDING_INPUTS) {
            let request = CreateEmbeddingRequest {
                model: self.embedding_model.clone(),
                input: EmbeddingInput::StringArray(batch.to_vec()),
                ..Default::default()
            };
            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| RetrievalError::Embedding {
                    message: e.to_string(),
                })?;

            let mut data = response.data;
            data.sort_by_key(|d| d.index);
            let batch_vectors: Vec<Vector> = data.into_iter().map(|d| d.embedding).collect();
            ensure_batch_len(batch.len(), &batch_vectors)?;
            vectors.extend(batch_vectors);
        }
        debug!(inputs = texts.len(), model = %self.embedding_model, "embedded batch");
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        embedding_dimension(&self.embedding_model)
    }

    fn model(&self) -> &str {
        &self.embedding_model
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message;

    fn request(json_mode: bool, stream: bool, tools: Vec<ToolDefinition>) -> ChatRequest {
        ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![message::user_message("test")],
            temperature: Some(0.0),
            max_tokens: Some(100),
            json_mode,
            stream,
            tools,
        }
    }

    #[test]
    fn test_message_roles_map_to_sdk_variants() {
        assert!(matches!(
            to_sdk_message(&message::system_message("s")),
            ChatCompletionRequestMessage::System(_)
        ));
        assert!(matches!(
            to_sdk_message(&message::user_message("u")),
            ChatCompletionRequestMessage::User(_)
        ));
        let ChatCompletionRequestMessage::Assistant(reply) =
            to_sdk_message(&message::assistant_message("earlier answer"))
        else {
            panic!("expected assistant message");
        };
        assert!(matches!(
            reply.content,
            Some(ChatCompletionRequestAssistantMessageContent::Text(ref t)) if t == "earlier answer"
        ));
        assert!(reply.tool_calls.is_none());
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = AgentConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            OpenAiProvider::new(&config),
            Err(AgentError::ApiKeyMissing)
        ));
    }

    #[test]
    fn test_embedding_dimension() {
        let config = AgentConfig::builder()
            .api_key("test")
            .embedding_model("text-embedding-3-large")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let provider = OpenAiProvider::new(&config).unwrap_or_else(|_| unreachable!());
        assert_eq!(provider.dimension(), 3072);
        assert_eq!(Embedder::model(&provider), "text-embedding-3-large");
        assert_eq!(embedding_dimension("text-embedding-3-small"), 1536);
    }

    #[test]
    fn test_request_translation() {
        let plain = to_sdk_request(&request(false, false, Vec::new()));
        assert!(plain.temperature.is_none());
        assert_eq!(plain.max_completion_tokens, Some(100));
        assert!(plain.response_format.is_none());
        assert!(plain.stream.is_none());
        assert!(plain.tools.is_none());

        let json = to_sdk_request(&request(true, true, Vec::new()));
        assert!(json.response_format.is_some());
        assert_eq!(json.stream, Some(true));
    }

    #[test]
    fn test_request_with_tools() {
        let tools = vec![ToolDefinition {
            name: "calculator".to_string(),
            description: "Evaluates expressions".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }];
        let built = to_sdk_request(&request(false, false, tools));
        let names: Vec<String> = built
            .tools
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.function.name)
            .collect();
        assert_eq!(names, ["calculator"]);
    }

    #[test]
    fn test_usage_defaults_when_absent() {
        assert_eq!(from_sdk_usage(None), TokenUsage::default());
    }
}
