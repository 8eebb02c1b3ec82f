//! Per-subject document + chunk index backing the retrieval source.
//!
//! Each subject owns a directory `docstore/<slug>/` containing `chunks.db`,
//! a SQLite database with one metadata row per document and an FTS5 virtual
//! table of text chunks. [`SubjectStore::open_existing`] returns `None` when
//! the index was never built — the retrieval fetcher reports that subject's
//! documents as unavailable rather than failing the whole request.
//!
//! All methods are synchronous; async callers wrap them in
//! `tokio::task::spawn_blocking`. A store value holds only paths and opens a
//! fresh connection per operation, so it is cheap to clone across tasks.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, params};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{AppError, FetchError};
use crate::llm::LlmProvider;

const DB_FILENAME: &str = "chunks.db";

/// Schema version stored in `PRAGMA user_version`.
/// Increment when the DDL changes; add a migration path in `init_db`.
const SCHEMA_VERSION: i64 = 1;

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SubjectStore {
    dir: PathBuf,
    db_path: PathBuf,
}

/// What `add_document` did with the submitted content.
#[derive(Debug)]
pub struct IngestReport {
    pub doc_id: String,
    pub chunks_indexed: usize,
    /// `true` when identical content was already present and nothing changed.
    pub deduplicated: bool,
}

impl SubjectStore {
    /// Open the store for `slug`, creating the directory and schema if needed.
    /// Used by the ingest path.
    pub fn create(root: &Path, slug: &str) -> Result<Self, AppError> {
        let dir = root.join(slug);
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::Store(format!("cannot create {}: {e}", dir.display()))
        })?;
        let store = Self { db_path: dir.join(DB_FILENAME), dir };
        store.init_db()?;
        Ok(store)
    }

    /// Open the store for `slug` only if its index has been built.
    ///
    /// `None` means no documents were ever ingested for the subject; callers
    /// report that as a missing index rather than an error.
    pub fn open_existing(root: &Path, slug: &str) -> Option<Self> {
        let dir = root.join(slug);
        let db_path = dir.join(DB_FILENAME);
        if !db_path.is_file() {
            return None;
        }
        Some(Self { dir, db_path })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Open a connection with the recommended pragmas:
    /// WAL for concurrent readers, FK enforcement, 5 s busy timeout.
    fn open_conn(&self) -> Result<Connection, AppError> {
        let conn = Connection::open(&self.db_path).map_err(|e| {
            AppError::Store(format!("open {}: {e}", self.db_path.display()))
        })?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| AppError::Store(format!("set journal_mode WAL: {e}")))?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| AppError::Store(format!("set foreign_keys ON: {e}")))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| AppError::Store(format!("set busy_timeout: {e}")))?;
        Ok(conn)
    }

    fn init_db(&self) -> Result<(), AppError> {
        let conn = self.open_conn()?;
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| AppError::Store(format!("read user_version: {e}")))?;
        if version >= SCHEMA_VERSION {
            return Ok(());
        }
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS doc_metadata (
                doc_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                source TEXT NOT NULL,
                content_hash TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE VIRTUAL TABLE IF NOT EXISTS chunks USING fts5(
                id UNINDEXED,
                doc_id UNINDEXED,
                text,
                position UNINDEXED
            );

            PRAGMA user_version = 1;
            ",
        )
        .map_err(|e| AppError::Store(format!("initialize schema: {e}")))
    }

    /// Ingest one document: dedupe by content hash, chunk, and index.
    ///
    /// Re-submitting byte-identical content is a no-op (`deduplicated = true`).
    pub fn add_document(
        &self,
        title: &str,
        source: &str,
        content: &str,
        chunk_size: usize,
    ) -> Result<IngestReport, AppError> {
        if chunk_size == 0 {
            return Err(AppError::Store("chunk_size must be > 0".to_string()));
        }
        if content.trim().is_empty() {
            return Err(AppError::Store(format!("document '{title}' has no content")));
        }

        let content_hash = sha256_hex(content);
        let mut conn = self.open_conn()?;

        if let Some(existing_id) = find_doc_id_by_hash(&conn, &content_hash)? {
            debug!(doc_id = %existing_id, %title, "identical content already indexed");
            return Ok(IngestReport {
                doc_id: existing_id,
                chunks_indexed: 0,
                deduplicated: true,
            });
        }

        let doc_id = uuid::Uuid::now_v7().to_string();
        let now = now_iso8601();
        let chunks = chunk_text(content, chunk_size);

        let tx = conn
            .transaction()
            .map_err(|e| AppError::Store(format!("begin ingest tx: {e}")))?;

        tx.execute(
            "INSERT INTO doc_metadata (doc_id, title, source, content_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![doc_id, title, source, content_hash, now, now],
        )
        .map_err(|e| AppError::Store(format!("insert metadata: {e}")))?;

        for (position, text) in &chunks {
            tx.execute(
                "INSERT INTO chunks (id, doc_id, text, position) VALUES (?1, ?2, ?3, ?4)",
                params![
                    uuid::Uuid::now_v7().to_string(),
                    doc_id,
                    text,
                    *position as i64
                ],
            )
            .map_err(|e| AppError::Store(format!("insert chunk: {e}")))?;
        }

        tx.commit()
            .map_err(|e| AppError::Store(format!("commit ingest tx: {e}")))?;

        info!(doc_id = %doc_id, %title, chunks = chunks.len(), "document indexed");
        Ok(IngestReport {
            doc_id,
            chunks_indexed: chunks.len(),
            deduplicated: false,
        })
    }

    pub fn document_count(&self) -> Result<usize, AppError> {
        let conn = self.open_conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM doc_metadata", [], |row| row.get(0))
            .map_err(|e| AppError::Store(format!("count documents: {e}")))?;
        Ok(count as usize)
    }

    /// Top-k chunk texts for a natural-language question, best match first.
    ///
    /// The question is tokenized and OR-joined so partial term overlap still
    /// matches; BM25 ranking surfaces the chunks with the strongest overlap.
    /// A question with no searchable tokens yields an empty result.
    pub fn search(&self, question: &str, top_k: usize) -> Result<Vec<String>, AppError> {
        let match_query = build_match_query(question);
        if match_query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.open_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT text FROM chunks
                 WHERE chunks MATCH ?1
                 ORDER BY bm25(chunks)
                 LIMIT ?2",
            )
            .map_err(|e| AppError::Store(format!("prepare search: {e}")))?;

        let rows = stmt
            .query_map(params![match_query, top_k as i64], |row| row.get::<_, String>(0))
            .map_err(|e| AppError::Store(format!("run search: {e}")))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| AppError::Store(format!("read search row: {e}")))?);
        }
        Ok(results)
    }
}

// ── Retriever ─────────────────────────────────────────────────────────────────

/// Retrieval-augmented answering for one subject: chunk search plus a single
/// grounded completion call.
#[derive(Debug, Clone)]
pub struct Retriever {
    store: SubjectStore,
    rag_prompt: String,
    llm: LlmProvider,
    top_k: usize,
}

impl Retriever {
    pub fn new(store: SubjectStore, rag_prompt: String, llm: LlmProvider, top_k: usize) -> Self {
        Self { store, rag_prompt, llm, top_k }
    }

    /// Answer `question` from the subject's indexed documents.
    ///
    /// Runs one chunk search (off the async scheduler) and one completion
    /// call. The raw model text is returned untrimmed of its judgment — the
    /// caller classifies whether it constitutes a real answer.
    pub async fn answer(&self, question: &str) -> Result<String, FetchError> {
        let store = self.store.clone();
        let query = question.to_string();
        let top_k = self.top_k;

        let chunks = tokio::task::spawn_blocking(move || store.search(&query, top_k))
            .await
            .map_err(|e| FetchError::IndexUnavailable(format!("search task failed: {e}")))?
            .map_err(|e| FetchError::IndexUnavailable(e.to_string()))?;

        debug!(chunks = chunks.len(), "retrieved context chunks");

        let context = if chunks.is_empty() {
            "(no matching passages)".to_string()
        } else {
            chunks.join("\n\n---\n\n")
        };

        let user_prompt = format!(
            "Context:\n{context}\n\nQuestion: {question}\n\n\
             Based *only* on the context above, provide a precise and well-structured answer."
        );

        let text = self.llm.complete(&user_prompt, Some(&self.rag_prompt)).await?;
        Ok(text)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn find_doc_id_by_hash(conn: &Connection, hash: &str) -> Result<Option<String>, AppError> {
    use rusqlite::OptionalExtension;
    conn.query_row(
        "SELECT doc_id FROM doc_metadata WHERE content_hash = ?1",
        params![hash],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .map_err(|e| AppError::Store(format!("lookup by hash: {e}")))
}

/// Split `content` into chunks of at most `chunk_size` bytes, on char
/// boundaries. Whitespace-only chunks are dropped. Positions are byte offsets
/// into the original content.
fn chunk_text(content: &str, chunk_size: usize) -> Vec<(usize, String)> {
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut current_bytes = 0usize;

    for (idx, ch) in content.char_indices() {
        current_bytes += ch.len_utf8();
        if current_bytes >= chunk_size {
            let text = &content[start..idx + ch.len_utf8()];
            if !text.trim().is_empty() {
                chunks.push((start, text.to_string()));
            }
            start = idx + ch.len_utf8();
            current_bytes = 0;
        }
    }

    if start < content.len() {
        let text = &content[start..];
        if !text.trim().is_empty() {
            chunks.push((start, text.to_string()));
        }
    }

    chunks
}

/// Build an FTS5 MATCH expression from a natural-language question.
///
/// Tokens shorter than three characters are dropped; every remaining token is
/// quote-escaped so FTS operators and punctuation in user input cannot break
/// the query. Tokens are OR-joined.
fn build_match_query(question: &str) -> String {
    question
        .split_whitespace()
        .map(|tok| tok.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|tok| tok.chars().count() >= 3)
        .map(|tok| {
            if tok.chars().all(|c| c.is_alphanumeric()) {
                tok.to_string()
            } else {
                format!("\"{}\"", tok.replace('"', "\"\""))
            }
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Return the lowercase hex-encoded SHA-256 digest of `content`.
/// Stable content fingerprint for deduplication.
fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Current UTC time as RFC 3339 with second precision, e.g.
/// `"2026-04-01T12:00:00Z"`.
fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
