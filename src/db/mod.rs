pub mod models;

use std::sync::Mutex;

use rusqlite::{params, Connection};

use crate::embedding::{bytes_to_embedding, embedding_to_bytes};
use crate::llm::Role;
use models::{
    Chunk, ChunkData, Conversation, ConversationSummary, Document, DocumentSummary, Message,
    NewDocument,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
}

/// Document and conversation stores sharing one SQLite connection.
///
/// All writes go through the single connection behind the mutex; the lock is
/// only ever held for the duration of one synchronous call, never across an
/// await point.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &std::path::Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                full_text TEXT,
                text_length INTEGER NOT NULL DEFAULT 0,
                uploaded_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS chunks (
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB,
                PRIMARY KEY (document_id, chunk_index),
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                -- soft reference; a document may be deleted out from under a conversation
                document_id TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                content TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            );
            ",
        )?;
        Ok(())
    }

    // ── Documents ──

    /// Inserts the document row and all chunk rows in one transaction, so a
    /// failed ingestion leaves no partial document behind.
    pub fn create_document(
        &self,
        new: NewDocument,
        chunks: Vec<ChunkData>,
    ) -> Result<Document, StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let id = uuid::Uuid::new_v4().to_string();

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO documents (id, filename, mime_type, full_text, text_length) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, new.filename, new.mime_type, new.full_text, new.text_length],
        )?;
        for (index, chunk) in chunks.iter().enumerate() {
            let blob = chunk.embedding.as_deref().map(embedding_to_bytes);
            tx.execute(
                "INSERT INTO chunks (document_id, chunk_index, content, embedding) VALUES (?1, ?2, ?3, ?4)",
                params![id, index as i64, chunk.text, blob],
            )?;
        }
        let uploaded_at: String = tx.query_row(
            "SELECT uploaded_at FROM documents WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        tx.commit()?;

        let chunks = chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| Chunk {
                document_id: id.clone(),
                index: index as i64,
                text: chunk.text,
                embedding: chunk.embedding,
            })
            .collect();

        Ok(Document {
            id,
            filename: new.filename,
            mime_type: new.mime_type,
            full_text: new.full_text,
            text_length: new.text_length,
            uploaded_at,
            chunks,
        })
    }

    pub fn list_documents(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT d.id, d.filename, d.mime_type, d.text_length, COUNT(c.document_id), d.uploaded_at
             FROM documents d
             LEFT JOIN chunks c ON c.document_id = d.id
             GROUP BY d.id
             ORDER BY d.uploaded_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DocumentSummary {
                id: row.get(0)?,
                filename: row.get(1)?,
                mime_type: row.get(2)?,
                text_length: row.get(3)?,
                chunk_count: row.get(4)?,
                uploaded_at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT id, filename, mime_type, full_text, text_length, uploaded_at FROM documents WHERE id = ?1",
            params![id],
            |row| {
                Ok(Document {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    mime_type: row.get(2)?,
                    full_text: row.get(3)?,
                    text_length: row.get(4)?,
                    uploaded_at: row.get(5)?,
                    chunks: Vec::new(),
                })
            },
        );
        let mut document = match result {
            Ok(doc) => doc,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut stmt = conn.prepare(
            "SELECT document_id, chunk_index, content, embedding FROM chunks WHERE document_id = ?1 ORDER BY chunk_index",
        )?;
        let rows = stmt.query_map(params![id], map_chunk)?;
        document.chunks = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(document))
    }

    /// Idempotent; chunks go with the document via the cascade.
    pub fn delete_document(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Chunks of the given documents, in the caller's document order then
    /// chunk order. The lexical fallback picks the leading chunks from this
    /// scope, so the order is part of the contract. Unknown ids contribute
    /// nothing.
    pub fn document_chunks(&self, document_ids: &[String]) -> Result<Vec<Chunk>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT document_id, chunk_index, content, embedding FROM chunks WHERE document_id = ?1 ORDER BY chunk_index",
        )?;
        let mut chunks = Vec::new();
        for id in document_ids {
            let rows = stmt.query_map(params![id], map_chunk)?;
            for row in rows {
                chunks.push(row?);
            }
        }
        Ok(chunks)
    }

    /// Every chunk that carries an embedding, across all documents.
    pub fn embedded_chunks(&self) -> Result<Vec<Chunk>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT document_id, chunk_index, content, embedding FROM chunks WHERE embedding IS NOT NULL ORDER BY document_id, chunk_index",
        )?;
        let rows = stmt.query_map([], map_chunk)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ── Conversations ──

    pub fn create_conversation(
        &self,
        title: Option<&str>,
        document_id: Option<&str>,
    ) -> Result<Conversation, StoreError> {
        let conn = self.conn.lock().unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        let title = title.unwrap_or("New conversation");
        conn.execute(
            "INSERT INTO conversations (id, title, document_id) VALUES (?1, ?2, ?3)",
            params![id, title, document_id],
        )?;
        let conv = conn.query_row(
            "SELECT id, title, document_id, created_at FROM conversations WHERE id = ?1",
            params![id],
            |row| {
                Ok(Conversation {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    document_id: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )?;
        Ok(conv)
    }

    pub fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.title, c.document_id, COUNT(m.id), c.created_at
             FROM conversations c
             LEFT JOIN messages m ON m.conversation_id = c.id
             GROUP BY c.id
             ORDER BY c.created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ConversationSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                document_id: row.get(2)?,
                message_count: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT id, title, document_id, created_at FROM conversations WHERE id = ?1",
            params![id],
            |row| {
                Ok(Conversation {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    document_id: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        );
        match result {
            Ok(conv) => Ok(Some(conv)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Idempotent; messages go with the conversation via the cascade. The
    /// referenced document is untouched.
    pub fn delete_conversation(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ── Messages ──

    /// Fails with `ConversationNotFound` when the conversation does not
    /// exist; appending is the one operation where a missing id is an error.
    pub fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<Message, StoreError> {
        let conn = self.conn.lock().unwrap();
        let exists = match conn.query_row(
            "SELECT 1 FROM conversations WHERE id = ?1",
            params![conversation_id],
            |_| Ok(()),
        ) {
            Ok(()) => true,
            Err(rusqlite::Error::QueryReturnedNoRows) => false,
            Err(e) => return Err(e.into()),
        };
        if !exists {
            return Err(StoreError::ConversationNotFound(conversation_id.to_string()));
        }

        conn.execute(
            "INSERT INTO messages (conversation_id, role, content) VALUES (?1, ?2, ?3)",
            params![conversation_id, role.as_str(), content],
        )?;
        let id = conn.last_insert_rowid();
        let msg = conn.query_row(
            "SELECT id, conversation_id, role, content, created_at FROM messages WHERE id = ?1",
            params![id],
            map_message,
        )?;
        Ok(msg)
    }

    /// Oldest first; the autoincrement id breaks ties between messages
    /// sharing a second-resolution timestamp, so the order is append order.
    /// An unknown conversation id yields an empty list.
    pub fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, role, content, created_at FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![conversation_id], map_message)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn map_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    let blob: Option<Vec<u8>> = row.get(3)?;
    Ok(Chunk {
        document_id: row.get(0)?,
        index: row.get(1)?,
        text: row.get(2)?,
        embedding: blob.map(|b| bytes_to_embedding(&b)),
    })
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let label: String = row.get(2)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: Role::from_label(&label),
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}
