use crate::embeddings::Embedder;
use crate::error::{ChatError, ProviderError};
use crate::models::{Answer, ChatMessage, ChatRole, ConversationHistory, RetrievedChunk, SessionOptions};
use crate::retry::with_retry;
use crate::traits::{ChatModel, VectorIndex};
use std::sync::Arc;
use tracing::{debug, info};

const CONDENSE_INSTRUCTIONS: &str = "Given the conversation below and a follow-up question, \
rewrite the follow-up as a standalone question that can be understood without the conversation. \
Keep the original language. Reply with the question only.";

const ANSWER_INSTRUCTIONS: &str = "Answer the user's question using only the context below. \
If the context does not contain the answer, say that you don't know instead of making one up.";

/// Result of one retrieval-then-generate step.
#[derive(Debug, Clone)]
pub struct Turn {
    pub answer: Answer,
    pub history: ConversationHistory,
}

/// Answers `question` against `index`, returning the answer and the history
/// extended by this exchange. The given history is left as it was, so a
/// failed call has nothing to roll back.
pub async fn answer_question<V, E, M>(
    index: &V,
    embedder: &E,
    model: &M,
    history: &ConversationHistory,
    question: &str,
    options: &SessionOptions,
) -> Result<Turn, ChatError>
where
    V: VectorIndex + ?Sized,
    E: Embedder + ?Sized,
    M: ChatModel + ?Sized,
{
    let question = question.trim();
    if question.is_empty() {
        return Err(ChatError::InvalidQuestion("question is empty".to_string()));
    }

    let standalone_question = if options.condense_question && !history.is_empty() {
        let messages = condense_messages(history, question);
        let rewritten = with_retry(options.retry, options.request_timeout, "condense_question", || {
            model.generate(&messages)
        })
        .await
        .map_err(ChatError::Generation)?;
        debug!(original = question, standalone = %rewritten, "condensed follow-up question");
        rewritten
    } else {
        question.to_string()
    };

    let query_vector = with_retry(options.retry, options.request_timeout, "embed_question", || {
        embedder.embed(&standalone_question)
    })
    .await
    .map_err(ChatError::Generation)?;

    if query_vector.len() != index.dimensions() {
        return Err(ChatError::Generation(ProviderError::InvalidResponse(format!(
            "query embedding dimension {} != index dimension {}",
            query_vector.len(),
            index.dimensions()
        ))));
    }

    let sources = index.search(&query_vector, options.top_k);
    debug!(retrieved = sources.len(), top_k = options.top_k, "retrieved context chunks");

    let messages = answer_messages(&sources, history, question);
    let text = with_retry(options.retry, options.request_timeout, "generate_answer", || {
        model.generate(&messages)
    })
    .await
    .map_err(ChatError::Generation)?;

    let mut next_history = history.clone();
    next_history.push_exchange(question, text.clone());

    Ok(Turn {
        answer: Answer {
            text,
            standalone_question,
            sources,
        },
        history: next_history,
    })
}

fn condense_messages(history: &ConversationHistory, question: &str) -> Vec<ChatMessage> {
    let transcript = history
        .messages()
        .iter()
        .map(|message| {
            let speaker = match message.role {
                ChatRole::User => "Human",
                ChatRole::Assistant => "Assistant",
                ChatRole::System => "System",
            };
            format!("{speaker}: {}", message.content)
        })
        .collect::<Vec<_>>()
        .join("\n");

    vec![
        ChatMessage::system(CONDENSE_INSTRUCTIONS),
        ChatMessage::user(format!(
            "Chat history:\n{transcript}\n\nFollow-up question: {question}\nStandalone question:"
        )),
    ]
}

fn answer_messages(
    sources: &[RetrievedChunk],
    history: &ConversationHistory,
    question: &str,
) -> Vec<ChatMessage> {
    let context = sources
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(format!(
        "{ANSWER_INSTRUCTIONS}\n----------------\n{context}"
    )));
    messages.extend(history.messages().iter().cloned());
    messages.push(ChatMessage::user(question));
    messages
}

/// Owns one index for its whole life; asking about other documents means
/// building a new engine.
pub struct ConversationEngine<V, E, M>
where
    V: VectorIndex,
    E: Embedder,
    M: ChatModel,
{
    index: V,
    embedder: Arc<E>,
    model: Arc<M>,
    history: ConversationHistory,
    options: SessionOptions,
}

impl<V, E, M> ConversationEngine<V, E, M>
where
    V: VectorIndex,
    E: Embedder,
    M: ChatModel,
{
    pub fn new(index: V, embedder: Arc<E>, model: Arc<M>, options: SessionOptions) -> Self {
        Self {
            index,
            embedder,
            model,
            history: ConversationHistory::new(),
            options,
        }
    }

    pub fn index(&self) -> &V {
        &self.index
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// History is replaced only when the whole turn succeeds.
    pub async fn ask(&mut self, question: &str) -> Result<Answer, ChatError> {
        let turn = answer_question(
            &self.index,
            self.embedder.as_ref(),
            self.model.as_ref(),
            &self.history,
            question,
            &self.options,
        )
        .await?;

        self.history = turn.history;
        info!(history_len = self.history.len(), sources = turn.answer.sources.len(), "question answered");
        Ok(turn.answer)
    }
}
