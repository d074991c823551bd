//! Document-grounded chat over OpenAI-compatible local endpoints.
//!
//! Uploads are extracted, split into overlapping chunks, optionally
//! embedded, and stored in SQLite. Chat turns load conversation history,
//! rank the selected document's chunks (cosine similarity when embeddings
//! exist, substring matching otherwise), fold the winners into a strict or
//! hybrid prompt, and stream the completion back token by token while
//! persisting the finished exchange.
//!
//! The crate is the engine only. HTTP routing, upload plumbing, and UI
//! belong to the embedding application; raw binary extraction beyond plain
//! text and PDF enters through the [`extract::TextExtractor`] seam.

pub mod chat;
pub mod chunker;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod prompt;
pub mod retrieval;

pub use chat::{ChatEngine, ChatError, ChatEvent, ChatRequest};
pub use config::Config;
pub use db::{Database, StoreError};
pub use ingest::{DocumentIngestor, IngestError, IngestReceipt};
pub use prompt::RagMode;
