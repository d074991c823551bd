//! Engine configuration.
//!
//! Every field has a serde default so a partial config (or none at all)
//! deserializes into a working setup pointed at a local OpenAI-compatible
//! server such as LM Studio.

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:1234/v1";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Connection settings for the chat completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token; empty means no Authorization header is sent.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_completion_model() -> String {
    "local-model".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2000
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_completion_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Connection settings for the embedding endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,
}

fn default_embedding_model() -> String {
    "text-embedding".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_embedding_model(),
        }
    }
}

/// Document ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Window length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared between consecutive windows; must stay below
    /// `chunk_size`.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// When true, every chunk is embedded at ingestion time and retrieval
    /// uses cosine ranking; when false, documents are searched lexically.
    #[serde(default)]
    pub embed_chunks: bool,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            embed_chunks: false,
            max_file_size: default_max_file_size(),
        }
    }
}

/// How many chunks each retrieval call site keeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Top-K when searching within a selected document set.
    #[serde(default = "default_document_top_k")]
    pub document_top_k: usize,

    /// Top-K for the global one-shot answer path.
    #[serde(default = "default_global_top_k")]
    pub global_top_k: usize,
}

fn default_document_top_k() -> usize {
    5
}

fn default_global_top_k() -> usize {
    3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            document_top_k: default_document_top_k(),
            global_top_k: default_global_top_k(),
        }
    }
}
