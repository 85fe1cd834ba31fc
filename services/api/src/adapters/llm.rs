//! services/api/src/adapters/llm.rs
//!
//! This module contains the adapter for the chat-completion LLM. Every model
//! interaction in the application (tutoring replies, worksheet generation,
//! grading) routes through this one implementation of `ChatCompletionService`.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use lingua_core::ports::{
    ChatCompletionService, ChatMessage, ChatRole, CompletionOptions, PortError, PortResult,
};
use tracing::error;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatCompletionService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn build_messages(messages: &[ChatMessage]) -> PortResult<Vec<ChatCompletionRequestMessage>> {
        messages
            .iter()
            .map(|m| {
                let built: Result<ChatCompletionRequestMessage, OpenAIError> = match m.role {
                    ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(Into::into),
                    ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(Into::into),
                    ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(Into::into),
                };
                built.map_err(|e| PortError::Unexpected(e.to_string()))
            })
            .collect()
    }

    async fn request_content(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
        response_format: Option<ResponseFormat>,
    ) -> PortResult<String> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(Self::build_messages(messages)?)
            .temperature(options.temperature)
            .max_tokens(options.max_tokens)
            .n(1);
        if let Some(format) = response_format {
            builder.response_format(format);
        }
        let request = builder
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::UpstreamGeneration(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(PortError::UpstreamGeneration(
                "LLM returned empty content".to_string(),
            ));
        }
        Ok(content.trim().to_string())
    }
}

//=========================================================================================
// `ChatCompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatCompletionService for OpenAiChatAdapter {
    /// Sends a chat completion request and returns the assistant content.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> PortResult<String> {
        self.request_content(messages, options, None).await
    }

    /// Chat completion in JSON mode; the raw output is parsed before return.
    async fn complete_json(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> PortResult<serde_json::Value> {
        let raw = self
            .request_content(messages, options, Some(ResponseFormat::JsonObject))
            .await?;

        serde_json::from_str(&raw).map_err(|e| {
            let preview: String = raw.chars().take(500).collect();
            error!("LLM returned invalid JSON: {}", preview);
            PortError::MalformedGeneration(format!("LLM returned invalid JSON: {}", e))
        })
    }
}
