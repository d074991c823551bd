use async_trait::async_trait;

use super::{display_snippet, RetrievalError, RetrievalResult, Retriever, ScoredChunk};
use crate::db::models::Chunk;
use crate::embedding::{cosine_similarity, EmbeddingClient};

/// Cosine-similarity ranking against a query embedding; used when every
/// chunk in scope carries one.
///
/// Embedding failures propagate. There is no first-chunks fallback here;
/// callers decide whether to degrade.
#[derive(Debug, Clone)]
pub struct VectorRetriever {
    embeddings: EmbeddingClient,
    top_k: usize,
}

impl VectorRetriever {
    pub fn new(embeddings: EmbeddingClient, top_k: usize) -> Self {
        Self { embeddings, top_k }
    }
}

/// Scores and orders candidates against the query vector. Chunks without an
/// embedding score 0. Kept free of I/O so ranking is testable on its own.
fn rank<'a>(query_embedding: &[f32], chunks: &'a [Chunk], top_k: usize) -> Vec<(f32, &'a Chunk)> {
    let mut scored: Vec<(f32, &Chunk)> = chunks
        .iter()
        .map(|chunk| {
            let score = chunk
                .embedding
                .as_deref()
                .map(|embedding| cosine_similarity(query_embedding, embedding))
                .unwrap_or(0.0);
            (score, chunk)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn search(
        &self,
        query: &str,
        chunks: &[Chunk],
    ) -> Result<RetrievalResult, RetrievalError> {
        // resolved before the embedding call; an empty scope costs nothing
        if chunks.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        let query_embedding = self.embeddings.embed(query).await?;
        let scored = rank(&query_embedding, chunks, self.top_k);

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;

    fn chunk(index: i64, text: &str, embedding: Option<Vec<f32>>) -> Chunk {
        Chunk {
            document_id: "d1".to_string(),
            index,
            text: text.to_string(),
            embedding,
        }
    }

    #[test]
    fn test_rank_orders_by_similarity() {
        let chunks = vec![
            chunk(0, "orthogonal", Some(vec![0.0, 1.0])),
            chunk(1, "aligned", Some(vec![1.0, 0.0])),
            chunk(2, "diagonal", Some(vec![0.7, 0.7])),
        ];
        let ranked = rank(&[1.0, 0.0], &chunks, 5);

        let texts: Vec<&str> = ranked.iter().map(|(_, c)| c.text.as_str()).collect();
        assert_eq!(texts, vec!["aligned", "diagonal", "orthogonal"]);
        assert!((ranked[0].0 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rank_truncates_to_top_k() {
        let chunks: Vec<Chunk> = (0..10)
            .map(|i| chunk(i, "c", Some(vec![1.0, i as f32])))
            .collect();
        assert_eq!(rank(&[1.0, 0.0], &chunks, 3).len(), 3);
    }

    #[test]
    fn test_zero_magnitude_embedding_scores_zero() {
        let chunks = vec![
            chunk(0, "zero", Some(vec![0.0, 0.0])),
            chunk(1, "unit", Some(vec![1.0, 0.0])),
        ];
        let ranked = rank(&[1.0, 0.0], &chunks, 5);

        assert_eq!(ranked[0].1.text, "unit");
        assert_eq!(ranked[1].0, 0.0);
    }

    #[tokio::test]
    async fn test_empty_scope_skips_the_embedding_call() {
        // points at nothing routable; must not be contacted
        let retriever = VectorRetriever::new(EmbeddingClient::new(EmbeddingConfig::default()), 5);
        let result = retriever.search("anything", &[]).await.unwrap();
        assert!(result.is_empty());
    }
}
