//! Upload pipeline: validate, extract, chunk, optionally embed, commit.

use std::sync::Arc;

use serde::Serialize;

use crate::chunker::{chunk_text, InvalidChunkConfig};
use crate::config::IndexingConfig;
use crate::db::models::{ChunkData, NewDocument};
use crate::db::{Database, StoreError};
use crate::embedding::{EmbeddingClient, EmbeddingError};
use crate::extract::{ExtractError, TextExtractor};

/// MIME types accepted for upload. The Word formats pass validation so an
/// external `TextExtractor` can cover them.
pub const ALLOWED_MIME_TYPES: [&str; 4] = [
    "application/pdf",
    "text/plain",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/msword",
];

/// Chunks per embedding request when indexing with embeddings.
const EMBED_BATCH_SIZE: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("file is {size} bytes, over the {limit} byte limit")]
    FileTooLarge { size: u64, limit: u64 },
    #[error("extraction failed: {0}")]
    Extraction(String),
    #[error(transparent)]
    ChunkConfig(#[from] InvalidChunkConfig),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ExtractError> for IngestError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnsupportedFormat(mime) => IngestError::UnsupportedFormat(mime),
            ExtractError::Extraction(message) => IngestError::Extraction(message),
        }
    }
}

/// Returned to the caller after a successful ingestion.
#[derive(Debug, Serialize, Clone)]
pub struct IngestReceipt {
    pub id: String,
    pub filename: String,
    pub chunk_count: usize,
}

/// Turns one uploaded file into a stored, chunked, optionally embedded
/// document.
pub struct DocumentIngestor {
    db: Arc<Database>,
    embeddings: EmbeddingClient,
    extractor: Arc<dyn TextExtractor>,
    config: IndexingConfig,
}

impl DocumentIngestor {
    pub fn new(
        db: Arc<Database>,
        embeddings: EmbeddingClient,
        extractor: Arc<dyn TextExtractor>,
        config: IndexingConfig,
    ) -> Self {
        Self {
            db,
            embeddings,
            extractor,
            config,
        }
    }

    /// Runs the pipeline for one upload. All-or-nothing: any failure,
    /// including a failed embedding batch, leaves no document behind.
    pub async fn ingest(
        &self,
        filename: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<IngestReceipt, IngestError> {
        if !ALLOWED_MIME_TYPES.contains(&mime_type) {
            return Err(IngestError::UnsupportedFormat(mime_type.to_string()));
        }
        if bytes.len() as u64 > self.config.max_file_size {
            return Err(IngestError::FileTooLarge {
                size: bytes.len() as u64,
                limit: self.config.max_file_size,
            });
        }

        let text = self.extractor.extract(bytes, mime_type)?;
        let text_length = text.chars().count() as i64;
        tracing::info!(filename, chars = text_length, "extracted document text");

        let chunks = chunk_text(&text, self.config.chunk_size, self.config.chunk_overlap)?;
        tracing::info!(filename, chunks = chunks.len(), "chunked document");

        let chunk_data = if self.config.embed_chunks {
            let mut embedded = Vec::with_capacity(chunks.len());
            for batch in chunks.chunks(EMBED_BATCH_SIZE) {
                let vectors = self.embeddings.embed_batch(batch).await?;
                for (text, embedding) in batch.iter().zip(vectors) {
                    embedded.push(ChunkData {
                        text: text.clone(),
                        embedding: Some(embedding),
                    });
                }
            }
            embedded
        } else {
            chunks
                .into_iter()
                .map(|text| ChunkData {
                    text,
                    embedding: None,
                })
                .collect()
        };

        // full text is kept only when there is no vector index to serve from
        let full_text = if self.config.embed_chunks {
            None
        } else {
            Some(text)
        };
        let document = self.db.create_document(
            NewDocument {
                filename: filename.to_string(),
                mime_type: mime_type.to_string(),
                full_text,
                text_length,
            },
            chunk_data,
        )?;
        tracing::info!(document_id = %document.id, filename, "document ingested");

        Ok(IngestReceipt {
            chunk_count: document.chunks.len(),
            id: document.id,
            filename: document.filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;
    use crate::extract::BuiltinExtractor;

    struct FixedExtractor(&'static str);

    impl TextExtractor for FixedExtractor {
        fn extract(&self, _bytes: &[u8], _mime_type: &str) -> Result<String, ExtractError> {
            Ok(self.0.to_string())
        }
    }

    fn ingestor(config: IndexingConfig) -> (Arc<Database>, DocumentIngestor) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let ingestor = DocumentIngestor::new(
            db.clone(),
            EmbeddingClient::new(EmbeddingConfig::default()),
            Arc::new(BuiltinExtractor),
            config,
        );
        (db, ingestor)
    }

    #[tokio::test]
    async fn test_plain_text_ingestion_stores_chunks_and_full_text() {
        let (db, ingestor) = ingestor(IndexingConfig {
            chunk_size: 10,
            chunk_overlap: 2,
            ..IndexingConfig::default()
        });

        let receipt = ingestor
            .ingest("notes.txt", "text/plain", "abcdefghijklmnopqrstuvwxyz".as_bytes())
            .await
            .unwrap();
        assert_eq!(receipt.filename, "notes.txt");
        assert!(receipt.chunk_count > 1);

        let document = db.get_document(&receipt.id).unwrap().unwrap();
        assert_eq!(document.chunks.len(), receipt.chunk_count);
        assert_eq!(document.text_length, 26);
        assert_eq!(document.full_text.as_deref(), Some("abcdefghijklmnopqrstuvwxyz"));
        assert!(document.chunks.iter().all(|c| c.embedding.is_none()));
    }

    #[tokio::test]
    async fn test_disallowed_mime_type_is_rejected_up_front() {
        let (db, ingestor) = ingestor(IndexingConfig::default());
        let err = ingestor
            .ingest("photo.png", "image/png", &[0u8; 4])
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::UnsupportedFormat(_)));
        assert!(db.list_documents().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_before_extraction() {
        let (db, ingestor) = ingestor(IndexingConfig {
            max_file_size: 8,
            ..IndexingConfig::default()
        });
        let err = ingestor
            .ingest("big.txt", "text/plain", &[b'x'; 9])
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::FileTooLarge { size: 9, limit: 8 }));
        assert!(db.list_documents().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_word_upload_needs_an_extractor_that_covers_it() {
        let (_db, ingestor) = ingestor(IndexingConfig::default());
        let err = ingestor
            .ingest("cv.doc", "application/msword", b"\xd0\xcf\x11\xe0")
            .await
            .unwrap_err();
        // allowed at validation, unsupported by the built-in extractor
        assert!(matches!(err, IngestError::UnsupportedFormat(_)));

        let db = Arc::new(Database::open_in_memory().unwrap());
        let with_seam = DocumentIngestor::new(
            db.clone(),
            EmbeddingClient::new(EmbeddingConfig::default()),
            Arc::new(FixedExtractor("extracted by an external tool")),
            IndexingConfig::default(),
        );
        let receipt = with_seam
            .ingest("cv.doc", "application/msword", b"\xd0\xcf\x11\xe0")
            .await
            .unwrap();
        assert_eq!(receipt.chunk_count, 1);
    }

    #[tokio::test]
    async fn test_invalid_chunk_config_aborts_ingestion() {
        let (db, ingestor) = ingestor(IndexingConfig {
            chunk_size: 50,
            chunk_overlap: 50,
            ..IndexingConfig::default()
        });
        let err = ingestor
            .ingest("notes.txt", "text/plain", b"some text")
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::ChunkConfig(_)));
        assert!(db.list_documents().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_file_yields_zero_chunks() {
        let (db, ingestor) = ingestor(IndexingConfig::default());
        let receipt = ingestor
            .ingest("empty.txt", "text/plain", b"")
            .await
            .unwrap();

        assert_eq!(receipt.chunk_count, 0);
        let document = db.get_document(&receipt.id).unwrap().unwrap();
        assert!(document.chunks.is_empty());
    }
}
