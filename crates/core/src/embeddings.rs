use crate::error::ProviderError;
use crate::provider::{ensure_success, OpenAiConfig, OpenAiTransport};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Vector length, when known before the first call.
    fn dimensions(&self) -> Option<usize>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ProviderError::InvalidResponse("no embedding returned".to_string()))
    }
}

/// Offline embedder hashing character trigrams into a fixed-size vector.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions.max(1))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Hosted embeddings through `POST /v1/embeddings`.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    transport: OpenAiTransport,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(config: &OpenAiConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            transport: OpenAiTransport::new(config, "v1/embeddings")?,
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> Option<usize> {
        None
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(url = %self.transport.url(), inputs = texts.len(), model = %self.model, "requesting embeddings");
        let response = self
            .transport
            .post()
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        let payload: EmbeddingResponse = ensure_success(response).await?.json().await?;
        order_embeddings(payload, texts.len())
    }
}

fn order_embeddings(
    mut payload: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    if payload.data.len() != expected {
        return Err(ProviderError::InvalidResponse(format!(
            "expected {expected} embeddings, got {}",
            payload.data.len()
        )));
    }

    payload.data.sort_by_key(|item| item.index);
    Ok(payload.data.into_iter().map(|item| item.embedding).collect())
}

/// Embedding backend picked at startup.
#[derive(Debug, Clone)]
pub enum EmbeddingProvider {
    Local(CharacterNgramEmbedder),
    OpenAi(OpenAiEmbedder),
}

#[async_trait]
impl Embedder for EmbeddingProvider {
    fn dimensions(&self) -> Option<usize> {
        match self {
            EmbeddingProvider::Local(embedder) => embedder.dimensions(),
            EmbeddingProvider::OpenAi(embedder) => embedder.dimensions(),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        match self {
            EmbeddingProvider::Local(embedder) => embedder.embed_batch(texts).await,
            EmbeddingProvider::OpenAi(embedder) => embedder.embed_batch(texts).await,
        }
    }
}
