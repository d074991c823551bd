//! Chat orchestration: history, retrieval, prompt composition, streaming
//! delivery, persistence.
//!
//! Each turn runs as its own task feeding an unbounded channel of
//! `ChatEvent`s. Dropping the receiver cancels the turn: the next token
//! push fails, the upstream read stops, and the partial reply is discarded.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::{Config, RetrievalConfig};
use crate::db::{Database, StoreError};
use crate::embedding::EmbeddingClient;
use crate::llm::openai::CompletionClient;
use crate::llm::{ChatMessage, CompletionError, Role, StreamOutcome};
use crate::prompt::{self, RagMode};
use crate::retrieval::lexical::LexicalRetriever;
use crate::retrieval::vector::VectorRetriever;
use crate::retrieval::{RetrievalError, RetrievalResult, Retriever};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

/// One inbound chat turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub rag_mode: RagMode,
}

/// Events delivered to the caller over the turn's channel. A turn is either
/// fragments followed by `Done`, or a single `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatEvent {
    Token { text: String },
    Done,
    Error { message: String },
}

/// Values callers use for "no document selected".
fn is_sentinel(id: &str) -> bool {
    id.is_empty() || id == "null" || id == "undefined" || id == "none"
}

/// Ties the stores, retrievers, and completion client together. Cheap to
/// clone; each streaming turn clones it into its own task.
#[derive(Clone)]
pub struct ChatEngine {
    db: Arc<Database>,
    completion: CompletionClient,
    embeddings: EmbeddingClient,
    retrieval: RetrievalConfig,
}

impl ChatEngine {
    pub fn new(db: Arc<Database>, config: &Config) -> Self {
        Self {
            db,
            completion: CompletionClient::new(config.completion.clone()),
            embeddings: EmbeddingClient::new(config.embedding.clone()),
            retrieval: config.retrieval.clone(),
        }
    }

    /// Starts one chat turn and returns the event stream for it. Errors
    /// surface as a single `ChatEvent::Error` on the stream, never as a
    /// return value.
    pub fn stream_chat(&self, request: ChatRequest) -> mpsc::UnboundedReceiver<ChatEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(err) = engine.run_turn(&request, &tx).await {
                tracing::error!(error = %err, "chat turn failed");
                let _ = tx.send(ChatEvent::Error {
                    message: err.to_string(),
                });
            }
        });
        rx
    }

    async fn run_turn(
        &self,
        request: &ChatRequest,
        tx: &mpsc::UnboundedSender<ChatEvent>,
    ) -> Result<(), ChatError> {
        // record the user message first, then load the full history
        let mut history: Vec<ChatMessage> = Vec::new();
        if let Some(conversation_id) = &request.conversation_id {
            self.db
                .append_message(conversation_id, Role::User, &request.message)?;
            history = self
                .db
                .list_messages(conversation_id)?
                .into_iter()
                .map(|m| ChatMessage {
                    role: m.role,
                    content: m.content,
                })
                .collect();
        }

        // an explicit document wins; otherwise the conversation's binding
        let mut document_id = request.document_id.clone().filter(|id| !is_sentinel(id));
        if document_id.is_none() {
            if let Some(conversation_id) = &request.conversation_id {
                if let Some(conversation) = self.db.get_conversation(conversation_id)? {
                    document_id = conversation.document_id.filter(|id| !is_sentinel(id));
                }
            }
        }

        // grounded turns replace the final user turn with the composed
        // prompt; a failed retrieval degrades to plain history
        let mut effective = history;
        if let Some(document_id) = &document_id {
            match self.retrieve_context(&request.message, document_id).await {
                Ok(result) => {
                    tracing::debug!(
                        %document_id,
                        chunks = result.chunks.len(),
                        "resolved retrieval context"
                    );
                    let grounded =
                        prompt::compose(request.rag_mode, &result.context, &request.message);
                    effective.pop();
                    effective.push(ChatMessage::user(grounded));
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        %document_id,
                        "retrieval failed, continuing without context"
                    );
                }
            }
        }
        if effective.is_empty() {
            effective.push(ChatMessage::user(request.message.clone()));
        }

        let completion_request = self.completion.request(effective);
        let outcome = self
            .completion
            .chat_stream(&completion_request, |token| {
                tx.send(ChatEvent::Token {
                    text: token.to_string(),
                })
                .is_ok()
            })
            .await?;

        match outcome {
            StreamOutcome::Completed(reply) => {
                if let Some(conversation_id) = &request.conversation_id {
                    if !reply.is_empty() {
                        self.db
                            .append_message(conversation_id, Role::Assistant, &reply)?;
                    }
                }
                let _ = tx.send(ChatEvent::Done);
            }
            StreamOutcome::Cancelled => {
                // receiver is gone; the partial reply is dropped, not stored
                tracing::debug!("chat turn cancelled by the caller");
            }
        }
        Ok(())
    }

    /// Loads the document's chunks and ranks them with the retriever the
    /// scope supports: vector when every chunk is embedded, lexical
    /// otherwise.
    async fn retrieve_context(
        &self,
        query: &str,
        document_id: &str,
    ) -> Result<RetrievalResult, ChatError> {
        let chunks = self.db.document_chunks(&[document_id.to_string()])?;
        let all_embedded = !chunks.is_empty() && chunks.iter().all(|c| c.embedding.is_some());
        let retriever: Box<dyn Retriever> = if all_embedded {
            Box::new(VectorRetriever::new(
                self.embeddings.clone(),
                self.retrieval.document_top_k,
            ))
        } else {
            Box::new(LexicalRetriever::new(self.retrieval.document_top_k))
        };
        Ok(retriever.search(query, &chunks).await?)
    }

    /// One-shot grounded answer over every embedded chunk in the store.
    /// No history, no persistence, and unlike the streaming path no
    /// degradation: embedding and completion failures propagate.
    pub async fn answer(&self, query: &str) -> Result<String, ChatError> {
        let chunks = self.db.embedded_chunks()?;
        let retriever = VectorRetriever::new(self.embeddings.clone(), self.retrieval.global_top_k);
        let result = retriever.search(query, &chunks).await?;

        let grounded = prompt::compose(RagMode::Strict, &result.context, query);
        let request = self.completion.request(vec![ChatMessage::user(grounded)]);
        Ok(self.completion.chat(&request).await?)
    }
}
