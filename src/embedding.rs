//! Embedding endpoint client plus the vector math and storage codec used by
//! cosine ranking.

use crate::config::EmbeddingConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: EmbeddingInput<'a>,
}

/// The endpoint accepts a bare string or a batch of strings.
#[derive(Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
    Single(&'a str),
    Batch(&'a [String]),
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    http: Client,
    config: EmbeddingConfig,
}

impl EmbeddingClient {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    async fn post(&self, input: EmbeddingInput<'_>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = EmbeddingRequest {
            model: &self.config.model,
            input,
        };

        let mut req = self
            .http
            .post(format!("{}/embeddings", self.config.base_url))
            .header("Content-Type", "application/json")
            .json(&body);

        if !self.config.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api {
                status,
                message: text,
            });
        }

        let data: EmbeddingResponse = resp.json().await?;
        Ok(data.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Embeds a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.post(EmbeddingInput::Single(text)).await?;
        if vectors.is_empty() {
            return Err(EmbeddingError::InvalidResponse(
                "no embedding returned".into(),
            ));
        }
        Ok(vectors.swap_remove(0))
    }

    /// Embeds a batch of texts, one vector per input in order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let vectors = self.post(EmbeddingInput::Batch(texts)).await?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

/// Cosine similarity between two vectors; 0.0 when either has zero magnitude
/// or the dimensions disagree.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Serialize an embedding to bytes for SQLite BLOB storage.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize an embedding from SQLite BLOB bytes.
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
