use async_trait::async_trait;

use super::{display_snippet, RetrievalError, RetrievalResult, Retriever, ScoredChunk};
use crate::db::models::Chunk;

/// Substring-match ranking over chunk text; used when chunks carry no
/// embeddings.
///
/// A chunk's score is the fraction of distinct query terms it contains,
/// case-insensitive. When nothing matches, the first document's leading
/// chunks are returned with score 0 so a selected document always yields
/// some context.
#[derive(Debug, Clone)]
pub struct LexicalRetriever {
    top_k: usize,
}

impl LexicalRetriever {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }
}

/// Lower-cased distinct query terms, first occurrence order.
fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in query.to_lowercase().split_whitespace() {
        if !terms.iter().any(|t| t == term) {
            terms.push(term.to_string());
        }
    }
    terms
}

#[async_trait]
impl Retriever for LexicalRetriever {
    async fn search(
        &self,
        query: &str,
        chunks: &[Chunk],
    ) -> Result<RetrievalResult, RetrievalError> {
        if chunks.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        let terms = query_terms(query);
        let mut scored: Vec<(f32, &Chunk)> = Vec::new();
        if !terms.is_empty() {
            for chunk in chunks {
                let haystack = chunk.text.to_lowercase();
                let matched = terms
                    .iter()
                    .filter(|term| haystack.contains(term.as_str()))
                    .count();
                if matched > 0 {
                    scored.push((matched as f32 / terms.len() as f32, chunk));
                }
            }
            // stable sort, ties keep scope order
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(self.top_k);
        }

        if scored.is_empty() {
            // nothing matched; fall back to the first document's leading chunks
            let first_document = &chunks[0].document_id;
            let fallback: Vec<&Chunk> = chunks
                .iter()
                .filter(|chunk| &chunk.document_id == first_document)
                .take(self.top_k)
                .collect();
            return Ok(RetrievalResult {
                context: fallback
                    .iter()
                    .map(|chunk| chunk.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
                chunks: fallback
                    .iter()
                    .map(|chunk| ScoredChunk {
                        document_id: chunk.document_id.clone(),
                        text: display_snippet(&chunk.text),
                        score: 0.0,
                    })
                    .collect(),
            });
        }

        Ok(RetrievalResult {
            context: scored
                .iter()
                .map(|(_, chunk)| chunk.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
            chunks: scored
                .iter()
                .map(|(score, chunk)| ScoredChunk {
                    document_id: chunk.document_id.clone(),
                    text: display_snippet(&chunk.text),
                    score: *score,
                })
                .collect(),
        })
    }
}
