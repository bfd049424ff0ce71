use crate::chunking::{split_text, ChunkingConfig};
use crate::conversation::ConversationEngine;
use crate::embeddings::Embedder;
use crate::error::ChatError;
use crate::extractor::{extract_text, PdfExtractor};
use crate::index::InMemoryVectorIndex;
use crate::ingest::check_upload_limits;
use crate::models::{Answer, ConversationHistory, ProcessReport, SessionOptions, UploadedDocument};
use crate::traits::{ChatModel, VectorIndex};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Per-user state: at most one engine, replaced wholesale by `process`.
pub struct ChatSession<X, E, M>
where
    X: PdfExtractor,
    E: Embedder,
    M: ChatModel,
{
    session_id: Uuid,
    extractor: X,
    embedder: Arc<E>,
    model: Arc<M>,
    options: SessionOptions,
    engine: Option<ConversationEngine<InMemoryVectorIndex, E, M>>,
}

impl<X, E, M> ChatSession<X, E, M>
where
    X: PdfExtractor,
    E: Embedder,
    M: ChatModel,
{
    pub fn new(extractor: X, embedder: Arc<E>, model: Arc<M>, options: SessionOptions) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            extractor,
            embedder,
            model,
            options,
            engine: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }

    /// History of the current engine; empty before the first `process`.
    pub fn history(&self) -> ConversationHistory {
        self.engine
            .as_ref()
            .map(|engine| engine.history().clone())
            .unwrap_or_default()
    }

    pub fn render_history(&self) -> String {
        self.history().render()
    }

    pub fn indexed_chunks(&self) -> usize {
        self.engine
            .as_ref()
            .map(|engine| engine.index().len())
            .unwrap_or_default()
    }

    /// Extracts, chunks and indexes `documents`, then swaps in a fresh engine
    /// with an empty history. On any error the current engine is kept.
    pub async fn process(&mut self, documents: &[UploadedDocument]) -> Result<ProcessReport, ChatError> {
        let result = self.build_engine(documents).await;

        match result {
            Ok((engine, report)) => {
                if self.engine.is_some() {
                    info!(session = %self.session_id, "replacing previous index and history");
                }
                self.engine = Some(engine);
                info!(
                    session = %self.session_id,
                    documents = report.documents.len(),
                    chunks = report.chunk_count,
                    "documents processed"
                );
                Ok(report)
            }
            Err(error) => {
                warn!(session = %self.session_id, kind = error.kind(), error = %error, "processing failed");
                Err(error)
            }
        }
    }

    async fn build_engine(
        &self,
        documents: &[UploadedDocument],
    ) -> Result<(ConversationEngine<InMemoryVectorIndex, E, M>, ProcessReport), ChatError> {
        let config = ChunkingConfig::from(&self.options);
        config.validate()?;
        check_upload_limits(documents, &self.options)?;

        let raw = extract_text(&self.extractor, documents)?;
        let chunks = split_text(&raw.text, config);
        if chunks.is_empty() {
            return Err(ChatError::EmptyDocumentSet);
        }

        let chunk_count = chunks.len();
        let index = InMemoryVectorIndex::build(chunks, self.embedder.as_ref(), &self.options).await?;
        let engine = ConversationEngine::new(
            index,
            Arc::clone(&self.embedder),
            Arc::clone(&self.model),
            self.options.clone(),
        );

        let report = ProcessReport {
            session_id: self.session_id.to_string(),
            documents: raw.documents,
            chunk_count,
            processed_at: Utc::now(),
        };

        Ok((engine, report))
    }

    pub async fn ask(&mut self, question: &str) -> Result<Answer, ChatError> {
        let engine = self.engine.as_mut().ok_or(ChatError::NotReady)?;
        engine.ask(question).await
    }
}
