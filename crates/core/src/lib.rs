pub mod chunking;
pub mod conversation;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod provider;
pub mod retry;
pub mod session;
pub mod traits;

pub use chunking::{split_text, ChunkingConfig};
pub use conversation::{answer_question, ConversationEngine, Turn};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, EmbeddingProvider, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{ChatError, ProviderError};
pub use extractor::{extract_text, LopdfExtractor, PageText, PdfExtractor, RawText};
pub use index::InMemoryVectorIndex;
pub use ingest::{check_upload_limits, digest_bytes, discover_pdf_files, load_documents};
pub use llm::OpenAiChatModel;
pub use models::{
    Answer, ChatMessage, ChatRole, ConversationHistory, DocumentSummary, ProcessReport,
    RetrievedChunk, SessionOptions, UploadedDocument,
};
pub use provider::{OpenAiConfig, DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, DEFAULT_OPENAI_BASE_URL};
pub use retry::RetryPolicy;
pub use session::ChatSession;
pub use traits::{ChatModel, VectorIndex};
