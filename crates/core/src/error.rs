use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("could not read {document}: {reason}")]
    Extraction { document: String, reason: String },

    #[error("the uploaded documents produced no text to index")]
    EmptyDocumentSet,

    #[error("failed to build the search index: {0}")]
    IndexBuild(ProviderError),

    #[error("failed to generate an answer: {0}")]
    Generation(ProviderError),

    #[error("no documents have been processed yet; process some PDFs before asking")]
    NotReady,

    #[error("upload too large: {details}")]
    UploadTooLarge { details: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid question: {0}")]
    InvalidQuestion(String),
}

impl ChatError {
    /// Short stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Extraction { .. } => "extraction",
            ChatError::EmptyDocumentSet => "empty_document_set",
            ChatError::IndexBuild(_) => "index_build",
            ChatError::Generation(_) => "generation",
            ChatError::NotReady => "not_ready",
            ChatError::UploadTooLarge { .. } => "upload_too_large",
            ChatError::Io(_) => "io",
            ChatError::InvalidConfig(_) => "invalid_config",
            ChatError::InvalidQuestion(_) => "invalid_question",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid response from {backend} ({status}): {details}")]
    BackendResponse {
        backend: String,
        status: u16,
        details: String,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("malformed response: {0}")]
    InvalidResponse(String),

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout(_) => true,
            ProviderError::Http(error) => error.is_timeout() || error.is_connect(),
            ProviderError::BackendResponse { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Url(_)
            | ProviderError::Serialization(_)
            | ProviderError::InvalidResponse(_) => false,
        }
    }
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;
