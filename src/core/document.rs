//! Document domain model.
//!
//! A `Document` is the catalog record for a single ingested source file
//! (typically a regulatory or audit PDF, pre-extracted to text by an
//! external collaborator). It owns zero or more `Chunk`s and carries the
//! controlled-vocabulary metadata that the retrieval filter planner
//! predicates on.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A catalog record for one ingested source document.
///
/// `source_id` is the SHA-256 hex digest of the original file's bytes and
/// is the document's stable identity: re-ingesting unchanged bytes always
/// resolves to the same document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Content-addressed identifier (SHA-256 hex of the source bytes).
    pub source_id: String,
    /// Human-readable title.
    pub title: String,
    /// Controlled document type (e.g. "policy", "standard", "guidance").
    pub doc_type: String,
    /// Controlled regulatory framework (e.g. "SOX", "GDPR").
    pub framework: String,
    /// Controlled jurisdiction (e.g. "US", "EU").
    pub jurisdiction: String,
    /// Controlled authority level (e.g. "statute", "regulation", "internal").
    pub authority_level: String,
    /// Date the document took effect.
    pub effective_date: NaiveDate,
    /// Opaque version label as assigned by the source.
    pub version: String,
    /// Path the source bytes were ingested from.
    pub source_path: PathBuf,
    /// Unix timestamp of ingestion.
    pub ingest_timestamp: i64,
    /// Content hash; equal to `source_id` (kept distinct for schema clarity).
    pub hash: String,
}

impl Document {
    /// Builds a document from a normalized metadata record and content hash.
    #[must_use]
    pub fn new(
        source_id: String,
        normalized: &crate::metadata::NormalizedRecord,
        source_path: PathBuf,
        ingest_timestamp: i64,
    ) -> Self {
        Self {
            hash: source_id.clone(),
            source_id,
            title: normalized.title.clone(),
            doc_type: normalized.doc_type.clone(),
            framework: normalized.framework.clone(),
            jurisdiction: normalized.jurisdiction.clone(),
            authority_level: normalized.authority_level.clone(),
            effective_date: normalized.effective_date,
            version: normalized.version.clone(),
            source_path,
            ingest_timestamp,
        }
    }

    /// Returns the denormalized filter columns carried onto every chunk
    /// this document owns (invariant I2 in the data model).
    #[must_use]
    pub fn filter_columns(&self) -> DocumentFilterColumns {
        DocumentFilterColumns {
            framework: self.framework.clone(),
            jurisdiction: self.jurisdiction.clone(),
            doc_type: self.doc_type.clone(),
            authority_level: self.authority_level.clone(),
            effective_date: self.effective_date,
            version: self.version.clone(),
        }
    }
}

/// The subset of `Document` fields that are denormalized onto each `Chunk`
/// so filtered retrieval never needs a join back to `documents`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFilterColumns {
    /// Regulatory framework.
    pub framework: String,
    /// Jurisdiction.
    pub jurisdiction: String,
    /// Document type.
    pub doc_type: String,
    /// Authority level.
    pub authority_level: String,
    /// Effective date.
    pub effective_date: NaiveDate,
    /// Version label.
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::NormalizedRecord;

    fn sample_normalized() -> NormalizedRecord {
        NormalizedRecord {
            title: "Internal Control Handbook".to_string(),
            doc_type: "policy".to_string(),
            framework: "SOX".to_string(),
            jurisdiction: "US".to_string(),
            authority_level: "internal".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            version: "1.0".to_string(),
        }
    }

    #[test]
    fn new_copies_normalized_fields_and_mirrors_hash() {
        let doc = Document::new(
            "abc123".to_string(),
            &sample_normalized(),
            PathBuf::from("raw/handbook.pdf"),
            1_700_000_000,
        );
        assert_eq!(doc.source_id, "abc123");
        assert_eq!(doc.hash, doc.source_id);
        assert_eq!(doc.title, "Internal Control Handbook");
    }

    #[test]
    fn filter_columns_mirrors_document_fields() {
        let doc = Document::new(
            "abc123".to_string(),
            &sample_normalized(),
            PathBuf::from("raw/handbook.pdf"),
            0,
        );
        let cols = doc.filter_columns();
        assert_eq!(cols.framework, doc.framework);
        assert_eq!(cols.effective_date, doc.effective_date);
    }
}
