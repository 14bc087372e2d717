//! `SQLite` storage implementation.
//!
//! Provides persistent storage using `SQLite` with proper transaction
//! management and migration support. The catalog (documents/chunks), the
//! dense vector index, and the FTS5 lexical index all live in the same
//! database file so a single connection can serve every retrieval mode.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only store non-negative values that fit in usize.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::core::{Chunk, Document, DocumentFilterColumns};
use crate::error::{Result, StorageError};
use crate::storage::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL,
};
use crate::storage::traits::{FilterPredicate, Storage, StorageStats};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// `SQLite`-based storage implementation.
///
/// Provides persistent storage for the `citespine` catalog with full ACID
/// guarantees.
///
/// # Examples
///
/// ```no_run
/// use citespine::storage::{SqliteStorage, Storage};
///
/// let mut storage = SqliteStorage::open("citespine.db").unwrap();
/// storage.init().unwrap();
/// ```
pub struct SqliteStorage {
    /// `SQLite` connection.
    conn: Connection,
    /// Path to the database file (None for in-memory).
    path: Option<PathBuf>,
}

impl SqliteStorage {
    /// Opens or creates a `SQLite` database at the given path.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the database file. Parent directory must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::Database(e.to_string()))?;
            }
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;

        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;

        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory `SQLite` database.
    ///
    /// Useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;

        Ok(Self { conn, path: None })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Gets the current schema version.
    fn get_schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;

        Ok(version.and_then(|v| v.parse().ok()))
    }

    /// Sets the schema version.
    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn
            .execute(SET_VERSION_SQL, params![version.to_string()])
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Returns current Unix timestamp.
    #[allow(clippy::cast_possible_wrap)]
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn parse_date(value: &str) -> Result<NaiveDate> {
        NaiveDate::from_str(value)
            .map_err(|e| StorageError::Database(format!("stored date {value} is invalid: {e}")).into())
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
        let effective_date: String = row.get(6)?;
        let effective_date = NaiveDate::from_str(&effective_date).map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                6,
                "effective_date".to_string(),
                rusqlite::types::Type::Text,
            )
        })?;

        Ok(Document {
            source_id: row.get(0)?,
            title: row.get(1)?,
            doc_type: row.get(2)?,
            framework: row.get(3)?,
            jurisdiction: row.get(4)?,
            authority_level: row.get(5)?,
            effective_date,
            version: row.get(7)?,
            source_path: PathBuf::from(row.get::<_, String>(8)?),
            ingest_timestamp: row.get(9)?,
            hash: row.get(10)?,
        })
    }

    fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
        let effective_date: String = row.get(12)?;
        let effective_date = NaiveDate::from_str(&effective_date).map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                12,
                "effective_date".to_string(),
                rusqlite::types::Type::Text,
            )
        })?;

        Ok(Chunk {
            chunk_id: row.get(0)?,
            source_id: row.get(1)?,
            seq: row.get::<_, i64>(2)? as u32,
            text: row.get(3)?,
            tokens: row.get::<_, i64>(4)? as usize,
            page_start: row.get::<_, Option<i64>>(5)?.map(|v| v as u32),
            page_end: row.get::<_, Option<i64>>(6)?.map(|v| v as u32),
            section_path: row.get(7)?,
            framework: row.get(8)?,
            jurisdiction: row.get(9)?,
            doc_type: row.get(10)?,
            authority_level: row.get(11)?,
            effective_date,
            version: row.get(13)?,
            content_hash: row.get::<_, i64>(14)? as u64,
            embedding: None,
        })
    }

    const CHUNK_COLUMNS: &'static str = r"
        chunk_id, source_id, seq, text, tokens, page_start, page_end,
        section_path, framework, jurisdiction, doc_type, authority_level,
        effective_date, version, content_hash
    ";
}

impl Storage for SqliteStorage {
    fn init(&mut self) -> Result<()> {
        let is_init: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;

        if is_init == 0 {
            self.conn
                .execute_batch(SCHEMA_SQL)
                .map_err(StorageError::from)?;
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        } else if let Some(current) = self.get_schema_version()? {
            if current < CURRENT_SCHEMA_VERSION {
                let migrations = crate::storage::schema::get_migrations_from(current);
                for migration in migrations {
                    self.conn
                        .execute_batch(migration.sql)
                        .map_err(|e| StorageError::Migration(e.to_string()))?;
                }
                self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
            }
        }

        Ok(())
    }

    fn is_initialized(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    fn reset(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
            DELETE FROM chunk_embeddings;
            DELETE FROM chunks;
            DELETE FROM documents;
        ",
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    // ==================== Document Operations ====================

    fn upsert_document(&mut self, document: &Document) -> Result<()> {
        self.conn
            .execute(
                r"
            INSERT INTO documents (
                source_id, title, doc_type, framework, jurisdiction,
                authority_level, effective_date, version, source_path,
                ingest_timestamp, hash
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_id) DO UPDATE SET
                title = excluded.title,
                doc_type = excluded.doc_type,
                framework = excluded.framework,
                jurisdiction = excluded.jurisdiction,
                authority_level = excluded.authority_level,
                effective_date = excluded.effective_date,
                version = excluded.version,
                source_path = excluded.source_path,
                ingest_timestamp = excluded.ingest_timestamp,
                hash = excluded.hash
        ",
                params![
                    document.source_id,
                    document.title,
                    document.doc_type,
                    document.framework,
                    document.jurisdiction,
                    document.authority_level,
                    document.effective_date.to_string(),
                    document.version,
                    document.source_path.to_string_lossy().to_string(),
                    document.ingest_timestamp,
                    document.hash,
                ],
            )
            .map_err(StorageError::from)?;

        Ok(())
    }

    fn get_document(&self, source_id: &str) -> Result<Option<Document>> {
        let result = self
            .conn
            .query_row(
                r"
            SELECT source_id, title, doc_type, framework, jurisdiction,
                   authority_level, effective_date, version, source_path,
                   ingest_timestamp, hash
            FROM documents WHERE source_id = ?
        ",
                params![source_id],
                Self::row_to_document,
            )
            .optional()
            .map_err(StorageError::from)?;

        Ok(result)
    }

    fn document_exists(&self, source_id: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE source_id = ?",
                params![source_id],
                |row| row.get(0),
            )
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    fn update_document_metadata(
        &mut self,
        source_id: &str,
        columns: &DocumentFilterColumns,
        title: &str,
    ) -> Result<()> {
        let tx = self.conn.transaction().map_err(StorageError::from)?;

        let updated = tx
            .execute(
                r"
            UPDATE documents SET
                title = ?, framework = ?, jurisdiction = ?, doc_type = ?,
                authority_level = ?, effective_date = ?, version = ?
            WHERE source_id = ?
        ",
                params![
                    title,
                    columns.framework,
                    columns.jurisdiction,
                    columns.doc_type,
                    columns.authority_level,
                    columns.effective_date.to_string(),
                    columns.version,
                    source_id,
                ],
            )
            .map_err(StorageError::from)?;

        if updated == 0 {
            return Err(StorageError::DocumentNotFound {
                source_id: source_id.to_string(),
            }
            .into());
        }

        tx.execute(
            r"
            UPDATE chunks SET
                framework = ?, jurisdiction = ?, doc_type = ?,
                authority_level = ?, effective_date = ?, version = ?
            WHERE source_id = ?
        ",
            params![
                columns.framework,
                columns.jurisdiction,
                columns.doc_type,
                columns.authority_level,
                columns.effective_date.to_string(),
                columns.version,
                source_id,
            ],
        )
        .map_err(StorageError::from)?;

        tx.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn delete_document(&mut self, source_id: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM documents WHERE source_id = ?",
                params![source_id],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn document_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count as usize)
    }

    // ==================== Chunk Operations ====================

    fn upsert_chunks(&mut self, chunks: &[Chunk]) -> Result<usize> {
        let tx = self.conn.transaction().map_err(StorageError::from)?;
        let mut inserted = 0usize;

        {
            let mut stmt = tx
                .prepare(&format!(
                    r"
                INSERT OR IGNORE INTO chunks ({cols})
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
                    cols = Self::CHUNK_COLUMNS
                ))
                .map_err(StorageError::from)?;

            for chunk in chunks {
                let changed = stmt
                    .execute(params![
                        chunk.chunk_id,
                        chunk.source_id,
                        i64::from(chunk.seq),
                        chunk.text,
                        chunk.tokens as i64,
                        chunk.page_start.map(i64::from),
                        chunk.page_end.map(i64::from),
                        chunk.section_path,
                        chunk.framework,
                        chunk.jurisdiction,
                        chunk.doc_type,
                        chunk.authority_level,
                        chunk.effective_date.to_string(),
                        chunk.version,
                        chunk.content_hash as i64,
                    ])
                    .map_err(StorageError::from)?;
                inserted += changed;
            }
        }

        tx.commit().map_err(StorageError::from)?;
        Ok(inserted)
    }

    fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT {cols} FROM chunks WHERE chunk_id = ?", cols = Self::CHUNK_COLUMNS),
                params![chunk_id],
                Self::row_to_chunk,
            )
            .optional()
            .map_err(StorageError::from)?;

        Ok(result)
    }

    fn get_chunk_text(&self, chunk_ids: &[String]) -> Result<HashMap<String, String>> {
        let mut out = HashMap::with_capacity(chunk_ids.len());
        if chunk_ids.is_empty() {
            return Ok(out);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT text FROM chunks WHERE chunk_id = ?")
            .map_err(StorageError::from)?;

        for chunk_id in chunk_ids {
            let text: Option<String> = stmt
                .query_row(params![chunk_id], |row| row.get(0))
                .optional()
                .map_err(StorageError::from)?;
            if let Some(text) = text {
                out.insert(chunk_id.clone(), text);
            }
        }

        Ok(out)
    }

    fn chunks_for_document(&self, source_id: &str) -> Result<Vec<Chunk>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {cols} FROM chunks WHERE source_id = ? ORDER BY seq",
                cols = Self::CHUNK_COLUMNS
            ))
            .map_err(StorageError::from)?;

        let chunks = stmt
            .query_map(params![source_id], Self::row_to_chunk)
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        Ok(chunks)
    }

    fn existing_chunk_ids(&self, source_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT chunk_id FROM chunks WHERE source_id = ?")
            .map_err(StorageError::from)?;

        let ids = stmt
            .query_map(params![source_id], |row| row.get(0))
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(StorageError::from)?;

        Ok(ids)
    }

    fn chunk_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count as usize)
    }

    // ==================== Embedding Operations ====================

    fn store_embedding(&mut self, chunk_id: &str, embedding: &[f32]) -> Result<()> {
        let now = Self::now();
        let bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();

        self.conn
            .execute(
                r"
                INSERT OR REPLACE INTO chunk_embeddings (chunk_id, embedding, dimensions, model_name, created_at)
                VALUES (?, ?, ?, NULL, ?)
            ",
                params![chunk_id, bytes, embedding.len() as i64, now],
            )
            .map_err(StorageError::from)?;

        Ok(())
    }

    fn store_embeddings_batch(&mut self, embeddings: &[(String, Vec<f32>)]) -> Result<()> {
        let tx = self.conn.transaction().map_err(StorageError::from)?;
        let now = Self::now();

        {
            let mut stmt = tx
                .prepare(
                    r"
                    INSERT OR REPLACE INTO chunk_embeddings (chunk_id, embedding, dimensions, model_name, created_at)
                    VALUES (?, ?, ?, NULL, ?)
                ",
                )
                .map_err(StorageError::from)?;

            for (chunk_id, embedding) in embeddings {
                let bytes: Vec<u8> = embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
                stmt.execute(params![chunk_id, bytes, embedding.len() as i64, now])
                    .map_err(StorageError::from)?;
            }
        }

        tx.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn get_embedding(&self, chunk_id: &str) -> Result<Option<Vec<f32>>> {
        let result: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT embedding FROM chunk_embeddings WHERE chunk_id = ?",
                params![chunk_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?;

        Ok(result.map(|bytes| bytes_to_embedding(&bytes)))
    }

    fn has_embedding(&self, chunk_id: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM chunk_embeddings WHERE chunk_id = ?",
                params![chunk_id],
                |row| row.get(0),
            )
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    // ==================== Retrieval Operations ====================

    fn ann_search(
        &self,
        query_embedding: &[f32],
        predicate: &FilterPredicate,
        k: usize,
        probes: usize,
    ) -> Result<Vec<(String, f32)>> {
        // Brute-force scan always visits every matching row; `probes`
        // only has an effect once this is backed by a real ANN index.
        let _ = probes;

        let where_clause = if predicate.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", predicate.sql)
        };

        let sql = format!(
            r"
            SELECT c.chunk_id, c.effective_date, e.embedding
            FROM chunk_embeddings e
            JOIN chunks c ON c.chunk_id = e.chunk_id
            {where_clause}
        "
        );

        let mut stmt = self.conn.prepare(&sql).map_err(StorageError::from)?;
        let named_params: Vec<(&str, &dyn rusqlite::ToSql)> = predicate
            .params
            .iter()
            .map(|(name, value)| (*name, value as &dyn rusqlite::ToSql))
            .collect();

        let rows = stmt
            .query_map(named_params.as_slice(), |row| {
                let chunk_id: String = row.get(0)?;
                let effective_date: String = row.get(1)?;
                let bytes: Vec<u8> = row.get(2)?;
                Ok((chunk_id, effective_date, bytes))
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        let mut scored = Vec::with_capacity(rows.len());
        for (chunk_id, effective_date, bytes) in rows {
            let embedding = bytes_to_embedding(&bytes);
            let score = crate::embedding::cosine_similarity(query_embedding, &embedding);
            let date = Self::parse_date(&effective_date)?;
            scored.push((chunk_id, score, date));
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.2.cmp(&a.2))
        });
        scored.truncate(k);

        Ok(scored.into_iter().map(|(id, score, _)| (id, score)).collect())
    }

    fn sparse_search(
        &self,
        query_text: &str,
        predicate: &FilterPredicate,
        k: usize,
    ) -> Result<Vec<(String, f64)>> {
        let fts_query = query_text
            .split_whitespace()
            .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR ");

        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let filter_clause = if predicate.is_empty() {
            String::new()
        } else {
            format!("AND {}", predicate.sql)
        };

        let sql = format!(
            r"
            SELECT c.chunk_id, -bm25(chunks_fts) AS score, c.effective_date
            FROM chunks_fts
            JOIN chunks c ON c.rowid = chunks_fts.rowid
            WHERE chunks_fts MATCH :fts_query {filter_clause}
            ORDER BY score DESC
            LIMIT :k
        "
        );

        let mut stmt = self.conn.prepare(&sql).map_err(StorageError::from)?;

        let mut named_params: Vec<(&str, &dyn rusqlite::ToSql)> = vec![
            (":fts_query", &fts_query as &dyn rusqlite::ToSql),
            (":k", &(k as i64) as &dyn rusqlite::ToSql),
        ];
        for (name, value) in &predicate.params {
            named_params.push((name, value as &dyn rusqlite::ToSql));
        }

        let results = stmt
            .query_map(named_params.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })
            .map_err(StorageError::from)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;

        Ok(results)
    }

    // ==================== Utility Operations ====================

    fn stats(&self) -> Result<StorageStats> {
        let document_count = self.document_count()?;
        let chunk_count = self.chunk_count()?;

        let embedded_chunk_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunk_embeddings", [], |row| {
                row.get(0)
            })
            .map_err(StorageError::from)?;

        let schema_version = self.get_schema_version()?.unwrap_or(0);

        let db_size = self
            .path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok().map(|m| m.len()));

        Ok(StorageStats {
            document_count,
            chunk_count,
            embedded_chunk_count: embedded_chunk_count as usize,
            schema_version,
            db_size,
        })
    }
}

fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

// SAFETY: SqliteStorage is only accessed from a single thread at a time.
// The Storage trait requires Send + Sync, and we ensure thread-safety
// through external synchronization (single-threaded CLI usage).
#[allow(unsafe_code)]
unsafe impl Send for SqliteStorage {}
#[allow(unsafe_code)]
unsafe impl Sync for SqliteStorage {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::NormalizedRecord;

    fn setup() -> SqliteStorage {
        let mut storage = SqliteStorage::in_memory().unwrap();
        storage.init().unwrap();
        storage
    }

    fn sample_document(source_id: &str) -> Document {
        let normalized = NormalizedRecord {
            title: "Internal Control Handbook".to_string(),
            doc_type: "policy".to_string(),
            framework: "SOX".to_string(),
            jurisdiction: "US".to_string(),
            authority_level: "internal".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            version: "1.0".to_string(),
        };
        Document::new(
            source_id.to_string(),
            &normalized,
            PathBuf::from("raw/handbook.pdf"),
            1_700_000_000,
        )
    }

    #[test]
    fn test_init() {
        let mut storage = SqliteStorage::in_memory().unwrap();
        assert!(storage.init().is_ok());
        assert!(storage.is_initialized().unwrap());
    }

    #[test]
    fn test_init_idempotent() {
        let mut storage = SqliteStorage::in_memory().unwrap();
        assert!(storage.init().is_ok());
        assert!(storage.init().is_ok());
    }

    #[test]
    fn test_document_crud() {
        let mut storage = setup();
        let doc = sample_document("abc123");

        storage.upsert_document(&doc).unwrap();
        assert!(storage.document_exists("abc123").unwrap());

        let loaded = storage.get_document("abc123").unwrap().unwrap();
        assert_eq!(loaded.title, "Internal Control Handbook");
        assert_eq!(storage.document_count().unwrap(), 1);

        storage.delete_document("abc123").unwrap();
        assert!(!storage.document_exists("abc123").unwrap());
    }

    #[test]
    fn test_upsert_document_replaces_in_place() {
        let mut storage = setup();
        let mut doc = sample_document("abc123");
        storage.upsert_document(&doc).unwrap();

        doc.title = "Revised Handbook".to_string();
        storage.upsert_document(&doc).unwrap();

        assert_eq!(storage.document_count().unwrap(), 1);
        let loaded = storage.get_document("abc123").unwrap().unwrap();
        assert_eq!(loaded.title, "Revised Handbook");
    }

    #[test]
    fn test_update_document_metadata_propagates_to_chunks() {
        let mut storage = setup();
        let doc = sample_document("abc123");
        storage.upsert_document(&doc).unwrap();

        let chunk = Chunk::new(&doc.source_id, 0, "hello world".to_string(), &doc);
        storage.upsert_chunks(&[chunk]).unwrap();

        let mut new_columns = doc.filter_columns();
        new_columns.framework = "GDPR".to_string();
        storage
            .update_document_metadata("abc123", &new_columns, "Renamed")
            .unwrap();

        let updated_doc = storage.get_document("abc123").unwrap().unwrap();
        assert_eq!(updated_doc.framework, "GDPR");
        assert_eq!(updated_doc.title, "Renamed");

        let chunks = storage.chunks_for_document("abc123").unwrap();
        assert_eq!(chunks[0].framework, "GDPR");
    }

    #[test]
    fn test_update_document_metadata_missing_document_errors() {
        let mut storage = setup();
        let columns = sample_document("abc123").filter_columns();
        let result = storage.update_document_metadata("missing", &columns, "x");
        assert!(result.is_err());
    }

    #[test]
    fn test_chunk_crud_and_cascade_delete() {
        let mut storage = setup();
        let doc = sample_document("abc123");
        storage.upsert_document(&doc).unwrap();

        let chunks = vec![
            Chunk::new(&doc.source_id, 0, "Hello.".to_string(), &doc),
            Chunk::new(&doc.source_id, 1, "World.".to_string(), &doc),
        ];
        let inserted = storage.upsert_chunks(&chunks).unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(storage.chunk_count().unwrap(), 2);

        let loaded = storage.get_chunk("abc123:0000").unwrap().unwrap();
        assert_eq!(loaded.text, "Hello.");

        let for_doc = storage.chunks_for_document("abc123").unwrap();
        assert_eq!(for_doc.len(), 2);
        assert_eq!(for_doc[0].seq, 0);

        storage.delete_document("abc123").unwrap();
        assert_eq!(storage.chunk_count().unwrap(), 0);
    }

    #[test]
    fn test_upsert_chunks_skips_existing() {
        let mut storage = setup();
        let doc = sample_document("abc123");
        storage.upsert_document(&doc).unwrap();

        let chunk = Chunk::new(&doc.source_id, 0, "Hello.".to_string(), &doc);
        assert_eq!(storage.upsert_chunks(&[chunk.clone()]).unwrap(), 1);
        assert_eq!(storage.upsert_chunks(&[chunk]).unwrap(), 0);
        assert_eq!(storage.chunk_count().unwrap(), 1);
    }

    #[test]
    fn test_existing_chunk_ids() {
        let mut storage = setup();
        let doc = sample_document("abc123");
        storage.upsert_document(&doc).unwrap();
        let chunks = vec![
            Chunk::new(&doc.source_id, 0, "a".to_string(), &doc),
            Chunk::new(&doc.source_id, 1, "b".to_string(), &doc),
        ];
        storage.upsert_chunks(&chunks).unwrap();

        let ids = storage.existing_chunk_ids("abc123").unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"abc123:0000".to_string()));
    }

    #[test]
    fn test_get_chunk_text_batch() {
        let mut storage = setup();
        let doc = sample_document("abc123");
        storage.upsert_document(&doc).unwrap();
        let chunks = vec![
            Chunk::new(&doc.source_id, 0, "alpha".to_string(), &doc),
            Chunk::new(&doc.source_id, 1, "beta".to_string(), &doc),
        ];
        storage.upsert_chunks(&chunks).unwrap();

        let texts = storage
            .get_chunk_text(&[
                "abc123:0000".to_string(),
                "abc123:0001".to_string(),
                "abc123:9999".to_string(),
            ])
            .unwrap();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts["abc123:0000"], "alpha");
    }

    #[test]
    fn test_embedding_crud() {
        let mut storage = setup();
        let doc = sample_document("abc123");
        storage.upsert_document(&doc).unwrap();
        let chunk = Chunk::new(&doc.source_id, 0, "hello".to_string(), &doc);
        storage.upsert_chunks(&[chunk]).unwrap();

        assert!(!storage.has_embedding("abc123:0000").unwrap());
        storage
            .store_embedding("abc123:0000", &[0.1, 0.2, 0.3])
            .unwrap();
        assert!(storage.has_embedding("abc123:0000").unwrap());

        let embedding = storage.get_embedding("abc123:0000").unwrap().unwrap();
        assert_eq!(embedding.len(), 3);
        assert!((embedding[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_store_embeddings_batch() {
        let mut storage = setup();
        let doc = sample_document("abc123");
        storage.upsert_document(&doc).unwrap();
        let chunks = vec![
            Chunk::new(&doc.source_id, 0, "a".to_string(), &doc),
            Chunk::new(&doc.source_id, 1, "b".to_string(), &doc),
        ];
        storage.upsert_chunks(&chunks).unwrap();

        storage
            .store_embeddings_batch(&[
                ("abc123:0000".to_string(), vec![1.0, 0.0]),
                ("abc123:0001".to_string(), vec![0.0, 1.0]),
            ])
            .unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.embedded_chunk_count, 2);
    }

    #[test]
    fn test_ann_search_ranks_by_similarity() {
        let mut storage = setup();
        let doc = sample_document("abc123");
        storage.upsert_document(&doc).unwrap();
        let chunks = vec![
            Chunk::new(&doc.source_id, 0, "matches".to_string(), &doc),
            Chunk::new(&doc.source_id, 1, "opposite".to_string(), &doc),
        ];
        storage.upsert_chunks(&chunks).unwrap();
        storage
            .store_embeddings_batch(&[
                ("abc123:0000".to_string(), vec![1.0, 0.0]),
                ("abc123:0001".to_string(), vec![-1.0, 0.0]),
            ])
            .unwrap();

        let results = storage
            .ann_search(&[1.0, 0.0], &FilterPredicate::none(), 10, 10)
            .unwrap();
        assert_eq!(results[0].0, "abc123:0000");
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn test_ann_search_respects_predicate() {
        let mut storage = setup();
        let doc = sample_document("abc123");
        storage.upsert_document(&doc).unwrap();
        let chunk = Chunk::new(&doc.source_id, 0, "hello".to_string(), &doc);
        storage.upsert_chunks(&[chunk]).unwrap();
        storage
            .store_embedding("abc123:0000", &[1.0, 0.0])
            .unwrap();

        let predicate = FilterPredicate {
            sql: "c.framework = :framework".to_string(),
            params: vec![(":framework", "GDPR".to_string())],
        };
        let results = storage.ann_search(&[1.0, 0.0], &predicate, 10, 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_sparse_search_finds_matching_text() {
        let mut storage = setup();
        let doc = sample_document("abc123");
        storage.upsert_document(&doc).unwrap();
        let chunks = vec![
            Chunk::new(
                &doc.source_id,
                0,
                "internal controls over financial reporting".to_string(),
                &doc,
            ),
            Chunk::new(&doc.source_id, 1, "unrelated text about weather".to_string(), &doc),
        ];
        storage.upsert_chunks(&chunks).unwrap();

        let results = storage
            .sparse_search("financial reporting", &FilterPredicate::none(), 10)
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].0, "abc123:0000");
    }

    #[test]
    fn test_reset_clears_documents_and_chunks() {
        let mut storage = setup();
        let doc = sample_document("abc123");
        storage.upsert_document(&doc).unwrap();
        let chunk = Chunk::new(&doc.source_id, 0, "hello".to_string(), &doc);
        storage.upsert_chunks(&[chunk]).unwrap();

        storage.reset().unwrap();
        assert_eq!(storage.document_count().unwrap(), 0);
        assert_eq!(storage.chunk_count().unwrap(), 0);
    }

    #[test]
    fn test_stats() {
        let mut storage = setup();
        let stats = storage.stats().unwrap();
        assert_eq!(stats.document_count, 0);

        let doc = sample_document("abc123");
        storage.upsert_document(&doc).unwrap();
        let chunk = Chunk::new(&doc.source_id, 0, "hello".to_string(), &doc);
        storage.upsert_chunks(&[chunk]).unwrap();
        storage
            .store_embedding("abc123:0000", &[0.1, 0.2])
            .unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.chunk_count, 1);
        assert_eq!(stats.embedded_chunk_count, 1);
    }
}
