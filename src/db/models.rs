use serde::{Deserialize, Serialize};

use crate::llm::Role;

/// A stored document with its chunks loaded.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    /// Present only when the deployment indexes without embeddings.
    pub full_text: Option<String>,
    /// Length of the extracted text in characters.
    pub text_length: i64,
    pub uploaded_at: String,
    pub chunks: Vec<Chunk>,
}

/// Listing row for a document; carries counts instead of chunk text.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DocumentSummary {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub text_length: i64,
    pub chunk_count: i64,
    pub uploaded_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Chunk {
    pub document_id: String,
    pub index: i64,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
}

/// Document metadata handed to the store at ingestion time.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub mime_type: String,
    pub full_text: Option<String>,
    pub text_length: i64,
}

/// Chunk payload handed to the store at ingestion time.
#[derive(Debug, Clone)]
pub struct ChunkData {
    pub text: String,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    /// Document the conversation is grounded in, fixed at creation.
    pub document_id: Option<String>,
    pub created_at: String,
}

/// Listing row for a conversation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub document_id: Option<String>,
    pub message_count: i64,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub id: i64,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: String,
}
