//! Chat completion over the OpenAI-compatible API.

use crate::config::LlmProvider;
use crate::error::{AifaqError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// A single-turn chat model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete one system + user exchange and return the reply text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    fn model(&self) -> &str;
}

/// Chat model backed by a provider's `/chat/completions` endpoint.
pub struct OpenAIChat {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIChat {
    pub fn new(provider: LlmProvider, model: &str) -> Result<Self> {
        Ok(Self {
            client: create_client(provider)?,
            model: model.to_string(),
            temperature: 0.7,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    #[instrument(skip(self, system, user), fields(model = %self.model))]
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system.to_string())
                .build()
                .map_err(|e| AifaqError::ExternalService(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user.to_string())
                .build()
                .map_err(|e| AifaqError::ExternalService(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| AifaqError::ExternalService(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            AifaqError::ExternalService(format!("Chat completion failed: {}", e))
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| AifaqError::ExternalService("Empty response from chat model".to_string()))?
            .clone();

        debug!("Received {} chars from {}", answer.len(), self.model);
        Ok(answer)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
