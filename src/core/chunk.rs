//! Chunk domain model.
//!
//! A `Chunk` is one retrievable, citable span of a `Document`. Its
//! `chunk_id` is globally unique and dense per document (invariants I3/I4
//! of the data model), and it carries a denormalized copy of its owning
//! document's filter columns so retrieval predicates never need a join.

use crate::core::document::{Document, DocumentFilterColumns};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// One chunk of text extracted from a document, ready for embedding,
/// indexing, and citation.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use citespine::core::{Chunk, Document};
/// use citespine::metadata::NormalizedRecord;
///
/// let normalized = NormalizedRecord {
///     title: "Handbook".to_string(),
///     doc_type: "policy".to_string(),
///     framework: "SOX".to_string(),
///     jurisdiction: "US".to_string(),
///     authority_level: "internal".to_string(),
///     effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
///     version: "1".to_string(),
/// };
/// let doc = Document::new("abc".to_string(), &normalized, "h.pdf".into(), 0);
/// let chunk = Chunk::new(&doc.source_id, 1, "hello world".to_string(), &doc);
/// assert_eq!(chunk.chunk_id, "abc:0001");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Globally unique id: `"{source_id}:{4-digit sequence}"`.
    pub chunk_id: String,
    /// Owning document's `source_id`.
    pub source_id: String,
    /// Sequence number within the owning document. The chunker assigns
    /// these densely starting at 1 (I3); this constructor accepts any
    /// value so storage round-trips don't have to reconstruct a document.
    pub seq: u32,
    /// Chunk text.
    pub text: String,
    /// Approximate whitespace-token count of `text`.
    pub tokens: usize,
    /// First page the chunk spans, if known.
    pub page_start: Option<u32>,
    /// Last page the chunk spans, if known.
    pub page_end: Option<u32>,
    /// Free-text breadcrumb (e.g. "Part II > Section 4.3").
    pub section_path: String,
    /// Denormalized copy of the owning document's framework.
    pub framework: String,
    /// Denormalized copy of the owning document's jurisdiction.
    pub jurisdiction: String,
    /// Denormalized copy of the owning document's doc type.
    pub doc_type: String,
    /// Denormalized copy of the owning document's authority level.
    pub authority_level: String,
    /// Denormalized copy of the owning document's effective date.
    pub effective_date: NaiveDate,
    /// Denormalized copy of the owning document's version.
    pub version: String,
    /// Hash of `text`, useful for detecting identical re-chunked content.
    pub content_hash: u64,
    /// Dense embedding vector, present once the embedder has run.
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Builds a chunk, stamping in the owning document's denormalized
    /// filter columns.
    #[must_use]
    pub fn new(source_id: &str, seq: u32, text: String, document: &Document) -> Self {
        Self::with_filter_columns(source_id, seq, text, document.filter_columns())
    }

    /// Builds a chunk from an explicit set of filter columns, for callers
    /// that already have them (e.g. a metadata-update propagation pass)
    /// without holding a full `Document`.
    #[must_use]
    pub fn with_filter_columns(
        source_id: &str,
        seq: u32,
        text: String,
        columns: DocumentFilterColumns,
    ) -> Self {
        let chunk_id = format!("{source_id}:{seq:04}");
        let tokens = approx_token_count(&text);
        let content_hash = hash_text(&text);

        Self {
            chunk_id,
            source_id: source_id.to_string(),
            seq,
            text,
            tokens,
            page_start: None,
            page_end: None,
            section_path: String::new(),
            framework: columns.framework,
            jurisdiction: columns.jurisdiction,
            doc_type: columns.doc_type,
            authority_level: columns.authority_level,
            effective_date: columns.effective_date,
            version: columns.version,
            content_hash,
            embedding: None,
        }
    }

    /// Sets the page range this chunk spans.
    #[must_use]
    pub const fn with_pages(mut self, start: Option<u32>, end: Option<u32>) -> Self {
        self.page_start = start;
        self.page_end = end;
        self
    }

    /// Sets the section breadcrumb.
    #[must_use]
    pub fn with_section_path(mut self, section_path: impl Into<String>) -> Self {
        self.section_path = section_path.into();
        self
    }

    /// Attaches an embedding vector.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Returns `true` if the chunk's denormalized filter columns equal
    /// the given document's (invariant I2).
    #[must_use]
    pub fn matches_document(&self, document: &Document) -> bool {
        self.framework == document.framework
            && self.jurisdiction == document.jurisdiction
            && self.doc_type == document.doc_type
            && self.authority_level == document.authority_level
            && self.effective_date == document.effective_date
            && self.version == document.version
    }

    /// Updates this chunk's denormalized filter columns in place, for the
    /// metadata-update propagation path (see `update_document_metadata`).
    pub fn apply_filter_columns(&mut self, columns: &DocumentFilterColumns) {
        self.framework.clone_from(&columns.framework);
        self.jurisdiction.clone_from(&columns.jurisdiction);
        self.doc_type.clone_from(&columns.doc_type);
        self.authority_level.clone_from(&columns.authority_level);
        self.effective_date = columns.effective_date;
        self.version.clone_from(&columns.version);
    }

    /// Returns a preview of the chunk text (first `max_len` bytes, cut at
    /// a valid UTF-8 boundary).
    #[must_use]
    pub fn preview(&self, max_len: usize) -> &str {
        if self.text.len() <= max_len {
            &self.text
        } else {
            let mut boundary = max_len;
            while !self.text.is_char_boundary(boundary) && boundary > 0 {
                boundary -= 1;
            }
            &self.text[..boundary]
        }
    }
}

/// Approximates a token count the way the chunker itself does: a count of
/// whitespace-delimited runs.
#[must_use]
pub fn approx_token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn hash_text(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::NormalizedRecord;

    fn sample_document() -> Document {
        let normalized = NormalizedRecord {
            title: "Handbook".to_string(),
            doc_type: "policy".to_string(),
            framework: "SOX".to_string(),
            jurisdiction: "US".to_string(),
            authority_level: "internal".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap_or_default(),
            version: "2".to_string(),
        };
        Document::new(
            "deadbeef".to_string(),
            &normalized,
            "raw/handbook.pdf".into(),
            0,
        )
    }

    #[test]
    fn chunk_id_is_dense_and_zero_padded() {
        let doc = sample_document();
        let chunk = Chunk::new(&doc.source_id, 3, "hello world".to_string(), &doc);
        assert_eq!(chunk.chunk_id, "deadbeef:0003");
    }

    #[test]
    fn token_count_is_whitespace_approximate() {
        let doc = sample_document();
        let chunk = Chunk::new(&doc.source_id, 0, "one two  three".to_string(), &doc);
        assert_eq!(chunk.tokens, 3);
    }

    #[test]
    fn denormalized_columns_match_owning_document() {
        let doc = sample_document();
        let chunk = Chunk::new(&doc.source_id, 0, "text".to_string(), &doc);
        assert!(chunk.matches_document(&doc));
    }

    #[test]
    fn apply_filter_columns_updates_in_place() {
        let doc = sample_document();
        let mut chunk = Chunk::new(&doc.source_id, 0, "text".to_string(), &doc);
        let mut other = doc.clone();
        other.framework = "GDPR".to_string();
        chunk.apply_filter_columns(&other.filter_columns());
        assert_eq!(chunk.framework, "GDPR");
        assert!(!chunk.matches_document(&doc));
    }

    #[test]
    fn identical_text_hashes_identically() {
        let doc = sample_document();
        let a = Chunk::new(&doc.source_id, 0, "same text".to_string(), &doc);
        let b = Chunk::new(&doc.source_id, 1, "same text".to_string(), &doc);
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn preview_truncates_at_char_boundary() {
        let doc = sample_document();
        let chunk = Chunk::new(&doc.source_id, 0, "héllo world".to_string(), &doc);
        let preview = chunk.preview(2);
        assert!(preview.len() <= 2);
    }

    #[test]
    fn embedding_starts_unset() {
        let doc = sample_document();
        let chunk = Chunk::new(&doc.source_id, 0, "text".to_string(), &doc);
        assert!(chunk.embedding.is_none());
        let chunk = chunk.with_embedding(vec![0.1, 0.2]);
        assert_eq!(chunk.embedding, Some(vec![0.1, 0.2]));
    }
}
