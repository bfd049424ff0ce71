use crate::embeddings::Embedder;
use crate::error::{ChatError, ProviderError};
use crate::models::{RetrievedChunk, SessionOptions};
use crate::retry::with_retry;
use crate::traits::VectorIndex;
use std::cmp::Ordering;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct IndexedChunk {
    text: String,
    vector: Vec<f32>,
}

/// Exact cosine-similarity index kept entirely in memory.
#[derive(Debug, Clone)]
pub struct InMemoryVectorIndex {
    entries: Vec<IndexedChunk>,
    dimensions: usize,
}

impl InMemoryVectorIndex {
    /// Embeds every chunk and returns the finished index. Nothing is returned
    /// unless every chunk was embedded.
    pub async fn build<E>(
        chunks: Vec<String>,
        embedder: &E,
        options: &SessionOptions,
    ) -> Result<Self, ChatError>
    where
        E: Embedder + ?Sized,
    {
        if chunks.is_empty() {
            return Err(ChatError::EmptyDocumentSet);
        }

        let batch_size = options.embedding_batch_size.max(1);
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());

        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let embedded = with_retry(options.retry, options.request_timeout, "embed_chunks", || {
                embedder.embed_batch(batch)
            })
            .await
            .map_err(ChatError::IndexBuild)?;

            if embedded.len() != batch.len() {
                return Err(ChatError::IndexBuild(ProviderError::InvalidResponse(format!(
                    "embedding count {} doesn't match chunk count {}",
                    embedded.len(),
                    batch.len()
                ))));
            }

            debug!(batch = batch_no, size = batch.len(), "embedded chunk batch");
            vectors.extend(embedded);
        }

        let dimensions = embedder
            .dimensions()
            .or_else(|| vectors.first().map(Vec::len))
            .unwrap_or_default();

        if dimensions == 0 {
            return Err(ChatError::IndexBuild(ProviderError::InvalidResponse(
                "embedding provider returned empty vectors".to_string(),
            )));
        }

        if let Some(bad) = vectors.iter().find(|vector| vector.len() != dimensions) {
            return Err(ChatError::IndexBuild(ProviderError::InvalidResponse(format!(
                "embedding dimension {} != {}",
                bad.len(),
                dimensions
            ))));
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(text, vector)| IndexedChunk { text, vector })
            .collect::<Vec<_>>();

        info!(chunks = entries.len(), dimensions, "vector index built");
        Ok(Self {
            entries,
            dimensions,
        })
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn search(&self, query_vector: &[f32], top_k: usize) -> Vec<RetrievedChunk> {
        if query_vector.len() != self.dimensions {
            return Vec::new();
        }

        let mut scored = self
            .entries
            .iter()
            .enumerate()
            .map(|(chunk_index, entry)| (chunk_index, cosine_similarity(query_vector, &entry.vector)))
            .collect::<Vec<_>>();

        // stable sort keeps chunk order among equal scores
        scored.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(chunk_index, score)| RetrievedChunk {
                chunk_index,
                text: self.entries[chunk_index].text.clone(),
                score,
            })
            .collect()
    }
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::retry::RetryPolicy;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        fn dimensions(&self) -> Option<usize> {
            Some(3)
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Err(ProviderError::BackendResponse {
                backend: "fake".to_string(),
                status: 401,
                details: "unauthorized".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn dimensions(&self) -> Option<usize> {
            None
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(texts.iter().map(|text| vec![text.len() as f32, 1.0]).collect())
        }
    }

    struct StalledEmbedder;

    #[async_trait]
    impl Embedder for StalledEmbedder {
        fn dimensions(&self) -> Option<usize> {
            Some(2)
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    fn options() -> SessionOptions {
        SessionOptions {
            retry: RetryPolicy::none(),
            ..SessionOptions::default()
        }
    }

    #[tokio::test]
    async fn empty_chunk_list_is_rejected() {
        let result = InMemoryVectorIndex::build(Vec::new(), &CharacterNgramEmbedder::default(), &options()).await;
        assert!(matches!(result, Err(ChatError::EmptyDocumentSet)));
    }

    #[tokio::test]
    async fn provider_failure_fails_the_whole_build() {
        let chunks = vec!["a".to_string(), "b".to_string()];
        let result = InMemoryVectorIndex::build(chunks, &BrokenEmbedder, &options()).await;
        assert!(matches!(result, Err(ChatError::IndexBuild(_))));
    }

    #[tokio::test]
    async fn stalled_provider_times_out_the_build() {
        let options = SessionOptions {
            request_timeout: Duration::from_millis(10),
            ..options()
        };
        let chunks = vec!["a".to_string()];

        let result = InMemoryVectorIndex::build(chunks, &StalledEmbedder, &options).await;
        assert!(matches!(
            result,
            Err(ChatError::IndexBuild(ProviderError::Timeout(timeout))) if timeout == Duration::from_millis(10)
        ));
    }

    #[tokio::test]
    async fn chunks_are_embedded_in_batches() {
        let embedder = CountingEmbedder::default();
        let chunks = (0..5).map(|index| format!("chunk {index}")).collect();
        let options = SessionOptions {
            embedding_batch_size: 2,
            ..options()
        };

        let index = InMemoryVectorIndex::build(chunks, &embedder, &options)
            .await
            .expect("index should build");

        assert_eq!(index.len(), 5);
        assert_eq!(index.dimensions(), 2);
        assert_eq!(embedder.calls.load(AtomicOrdering::SeqCst), 3);
    }

    #[tokio::test]
    async fn search_returns_top_k_most_similar() {
        let embedder = CharacterNgramEmbedder::default();
        let chunks = vec![
            "The hydraulic pump delivers 200 bar of pressure.".to_string(),
            "Lunch is served in the cafeteria at noon.".to_string(),
            "Replace the pump seal when pressure drops.".to_string(),
        ];
        let index = InMemoryVectorIndex::build(chunks, &embedder, &options())
            .await
            .expect("index should build");

        let query = embedder.embed_text("hydraulic pump pressure");
        let hits = index.search(&query, 2);

        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|hit| hit.chunk_index != 1));
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
