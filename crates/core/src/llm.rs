use crate::error::ProviderError;
use crate::models::ChatMessage;
use crate::provider::{ensure_success, OpenAiConfig, OpenAiTransport};
use crate::traits::ChatModel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions through `POST /v1/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    transport: OpenAiTransport,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(config: &OpenAiConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            transport: OpenAiTransport::new(config, "v1/chat/completions")?,
            model: config.model.clone(),
            temperature: 0.7,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response = self.transport.post().json(&request).send().await?;
        let payload: ChatResponse = ensure_success(response).await?.json().await?;

        if let Some(usage) = &payload.usage {
            debug!(model = %self.model, total_tokens = usage.total_tokens, "chat completion usage");
        }
        first_choice(payload)
    }
}

fn first_choice(payload: ChatResponse) -> Result<String, ProviderError> {
    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse("completion had no message content".to_string()))
}
