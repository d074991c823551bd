//! Ranking strategies over document chunks.
//!
//! Two implementations share one capability: `LexicalRetriever` for chunks
//! without embeddings, `VectorRetriever` when every chunk in scope carries
//! one. The orchestrator selects one per turn; they are never mixed within
//! a single query.

pub mod lexical;
pub mod vector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::models::Chunk;
use crate::embedding::EmbeddingError;

/// Display snippet length for `ScoredChunk::text`.
const SNIPPET_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// A ranked chunk as surfaced to callers. `text` is a display snippet, not
/// the full chunk text.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScoredChunk {
    pub document_id: String,
    pub text: String,
    pub score: f32,
}

/// Context assembled for one query: the selected chunks' full texts joined
/// by blank lines, plus the selection itself with snippets and scores.
/// Never persisted.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RetrievalResult {
    pub context: String,
    pub chunks: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, chunks: &[Chunk])
        -> Result<RetrievalResult, RetrievalError>;
}

/// First 100 characters of the chunk plus a trailing ellipsis. Both
/// retrievers use this for every surfaced chunk.
pub(crate) fn display_snippet(text: &str) -> String {
    let mut snippet: String = text.chars().take(SNIPPET_CHARS).collect();
    snippet.push_str("...");
    snippet
}
