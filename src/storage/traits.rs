//! Storage trait definition.
//!
//! Defines the interface for the catalog/index storage backend. A single
//! implementation (`SqliteStorage`) ships today, but pipeline components
//! depend on this trait object rather than the concrete type so a future
//! backend (an external vector store fronting the same catalog, say) can
//! be swapped in without touching retrieval or ingest code.

use crate::core::{Chunk, Document, DocumentFilterColumns};
use crate::error::Result;
use serde::Serialize;
use std::collections::HashMap;

/// A SQL `WHERE` fragment plus its bound named parameters, built by the
/// filter planner and consumed by both the catalog query path and the
/// vector/lexical search paths so every retrieval mode honors the same
/// predicate.
#[derive(Debug, Clone, Default)]
pub struct FilterPredicate {
    /// SQL boolean expression, e.g. `"framework = :framework"`. Empty
    /// string means "no restriction".
    pub sql: String,
    /// Named parameters referenced by `sql`, as `(":name", value)` pairs.
    pub params: Vec<(&'static str, String)>,
}

impl FilterPredicate {
    /// A predicate matching every row.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns `true` if this predicate restricts nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Trait for the persistent catalog and index storage backend.
///
/// Implementations must be `Send + Sync`. Mutating operations should be
/// atomic: a failed `upsert_chunks` call must not leave a partial set of
/// rows behind.
pub trait Storage: Send + Sync {
    /// Initializes storage (creates schema, runs migrations).
    ///
    /// Idempotent - safe to call multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation or migration fails.
    fn init(&mut self) -> Result<()>;

    /// Checks if storage is initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be performed.
    fn is_initialized(&self) -> Result<bool>;

    /// Resets all stored state, preserving the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn reset(&mut self) -> Result<()>;

    // ==================== Document Operations ====================

    /// Inserts a document, or replaces it in place if `source_id` already
    /// exists (re-ingesting unchanged bytes is a no-op at this layer;
    /// idempotence is the ingest orchestrator's responsibility).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn upsert_document(&mut self, document: &Document) -> Result<()>;

    /// Retrieves a document by `source_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_document(&self, source_id: &str) -> Result<Option<Document>>;

    /// Returns `true` if a document with this `source_id` is catalogued.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn document_exists(&self, source_id: &str) -> Result<bool>;

    /// Updates a document's controlled-vocabulary fields in place and
    /// propagates the new filter columns onto every chunk it owns, in a
    /// single transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not exist or the update
    /// fails.
    fn update_document_metadata(
        &mut self,
        source_id: &str,
        columns: &DocumentFilterColumns,
        title: &str,
    ) -> Result<()>;

    /// Deletes a document and cascades to its chunks, embeddings, and FTS
    /// rows.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn delete_document(&mut self, source_id: &str) -> Result<()>;

    /// Returns the count of catalogued documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    fn document_count(&self) -> Result<usize>;

    // ==================== Chunk Operations ====================

    /// Inserts chunks that don't already exist (by `chunk_id`), skipping
    /// ones that do. Returns the number actually inserted, which the
    /// ingest orchestrator uses to decide which chunks still need
    /// embedding.
    ///
    /// # Errors
    ///
    /// Returns an error if insertion fails.
    fn upsert_chunks(&mut self, chunks: &[Chunk]) -> Result<usize>;

    /// Retrieves a specific chunk by `chunk_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_chunk(&self, chunk_id: &str) -> Result<Option<Chunk>>;

    /// Retrieves chunk text for a batch of ids, keyed by id. Ids with no
    /// matching row are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_chunk_text(&self, chunk_ids: &[String]) -> Result<HashMap<String, String>>;

    /// Retrieves all chunks belonging to a document, ordered by `seq`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn chunks_for_document(&self, source_id: &str) -> Result<Vec<Chunk>>;

    /// Returns the set of `chunk_id`s already stored for a document, used
    /// by the ingest orchestrator to decide what's new.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn existing_chunk_ids(&self, source_id: &str) -> Result<Vec<String>>;

    /// Returns the count of chunks across the whole catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    fn chunk_count(&self) -> Result<usize>;

    // ==================== Embedding Operations ====================

    /// Stores a single chunk's embedding vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn store_embedding(&mut self, chunk_id: &str, embedding: &[f32]) -> Result<()>;

    /// Stores embeddings for a batch of chunks in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; no partial batch is
    /// committed.
    fn store_embeddings_batch(&mut self, embeddings: &[(String, Vec<f32>)]) -> Result<()>;

    /// Retrieves a chunk's embedding, if one has been stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_embedding(&self, chunk_id: &str) -> Result<Option<Vec<f32>>>;

    /// Returns `true` if a chunk already has a stored embedding.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn has_embedding(&self, chunk_id: &str) -> Result<bool>;

    // ==================== Retrieval Operations ====================

    /// Brute-force cosine-similarity scan over every chunk embedding
    /// matching `predicate`, returning the top `k` by descending
    /// similarity.
    ///
    /// `probes` is the recall/latency knob a real ANN backend (e.g. an
    /// inverted-file index with k-means centroids) would use to bound
    /// how many partitions it visits; a brute-force scan always visits
    /// every matching row, so this implementation ignores it. The
    /// parameter is part of the trait so a future ANN-backed `Storage`
    /// can honor it without changing the call sites in
    /// [`crate::retrieval::router`].
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn ann_search(
        &self,
        query_embedding: &[f32],
        predicate: &FilterPredicate,
        k: usize,
        probes: usize,
    ) -> Result<Vec<(String, f32)>>;

    /// FTS5 BM25 lexical search over chunks matching `predicate`,
    /// returning the top `k` chunk ids with a score where higher is
    /// better (BM25's native ordering is negated internally).
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    fn sparse_search(
        &self,
        query_text: &str,
        predicate: &FilterPredicate,
        k: usize,
    ) -> Result<Vec<(String, f64)>>;

    // ==================== Utility Operations ====================

    /// Gets storage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be gathered.
    fn stats(&self) -> Result<StorageStats>;
}

/// Storage statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    /// Number of catalogued documents.
    pub document_count: usize,
    /// Total number of chunks across all documents.
    pub chunk_count: usize,
    /// Number of chunks that have a stored embedding.
    pub embedded_chunk_count: usize,
    /// Schema version.
    pub schema_version: u32,
    /// Database file size in bytes (if applicable).
    pub db_size: Option<u64>,
}
