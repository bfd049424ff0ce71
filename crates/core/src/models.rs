use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// One uploaded PDF, held in memory for a single processing batch.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, crate::ChatError> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self { name, bytes })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub name: String,
    pub pages: usize,
    pub characters: usize,
    pub checksum: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Alternating user/assistant messages, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.messages.push(ChatMessage::user(question));
        self.messages.push(ChatMessage::assistant(answer));
    }

    /// Plain-text transcript with each turn prefixed by its speaker.
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|message| {
                let speaker = match message.role {
                    ChatRole::User => "You",
                    ChatRole::Assistant => "Bot",
                    ChatRole::System => "System",
                };
                format!("{speaker}: {}", message.content.trim())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// The question actually used for retrieval after rewriting follow-ups.
    pub standalone_question: String,
    pub sources: Vec<RetrievedChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessReport {
    pub session_id: String,
    pub documents: Vec<DocumentSummary>,
    pub chunk_count: usize,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub embedding_batch_size: usize,
    pub max_documents: usize,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub condense_question: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
            top_k: 4,
            embedding_batch_size: 64,
            max_documents: 20,
            max_upload_bytes: 50 * 1024 * 1024,
            request_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            condense_question: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_alternates_user_and_assistant() {
        let mut history = ConversationHistory::new();
        history.push_exchange("What is X?", "X is a valve.");

        assert_eq!(history.len(), 2);
        assert_eq!(history.messages()[0].role, ChatRole::User);
        assert_eq!(history.messages()[1].role, ChatRole::Assistant);
        assert_eq!(history.render(), "You: What is X?\nBot: X is a valve.");
    }

    #[test]
    fn document_name_comes_from_file_name() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.4")?;

        let document = UploadedDocument::from_path(&path)?;
        assert_eq!(document.name, "report.pdf");
        assert_eq!(document.bytes, b"%PDF-1.4");
        Ok(())
    }
}
