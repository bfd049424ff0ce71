use crate::models::{ChatMessage, RetrievedChunk};
use crate::ProviderError;
use async_trait::async_trait;

/// Nearest-neighbour lookup over embedded chunks.
pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;

    /// Length every query vector must have.
    fn dimensions(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn search(&self, query_vector: &[f32], top_k: usize) -> Vec<RetrievedChunk>;
}

/// A hosted or local language model that completes a chat transcript.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, ProviderError>;
}
