//! Embeddings over the OpenAI-compatible API (OpenAI and Mistral).

use super::Embedder;
use crate::config::LlmProvider;
use crate::error::{AifaqError, Result};
use crate::openai::create_client;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Texts sent per embedding request.
const BATCH_SIZE: usize = 100;

/// Embedder backed by a provider's `/embeddings` endpoint.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl OpenAIEmbedder {
    pub fn new(provider: LlmProvider, model: &str) -> Result<Self> {
        Ok(Self {
            client: create_client(provider)?,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AifaqError::ExternalService("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.model)
                .input(EmbeddingInput::StringArray(chunk.to_vec()))
                .build()
                .map_err(|e| AifaqError::ExternalService(format!("Failed to build embedding request: {}", e)))?;

            let response = self.client.embeddings().create(request).await.map_err(|e| {
                AifaqError::ExternalService(format!("Embedding API error: {}", e))
            })?;

            if response.data.len() != chunk.len() {
                return Err(AifaqError::ExternalService(format!(
                    "Embedding API returned {} vectors for {} texts",
                    response.data.len(),
                    chunk.len()
                )));
            }

            // Sort by index to ensure correct order
            let mut embeddings: Vec<_> = response.data.into_iter().collect();
            embeddings.sort_by_key(|e| e.index);
            all_embeddings.extend(embeddings.into_iter().map(|e| e.embedding));
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
