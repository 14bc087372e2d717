//! Retrieval router (C8).
//!
//! Selects a retrieval mode from configuration — dense-only (with
//! optional rerank), hybrid dense+lexical, or an external vector store —
//! and returns a uniform, ranked, deterministically tie-broken list of
//! evidence.

use crate::config::{Settings, VectorBackend};
use crate::core::Chunk;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::retrieval::planner::FilterSet;
use crate::retrieval::rerank::{LexicalOverlapReranker, Reranker};
use crate::retrieval::synonyms::expand_for_sparse;
use crate::storage::{FilterPredicate, Storage};
use chrono::NaiveDate;
use std::collections::HashMap;

/// One retrieved, citable piece of evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceHit {
    /// The chunk's globally unique id.
    pub chunk_id: String,
    /// `source_id` of the owning document.
    pub source_id: String,
    /// Chunk text.
    pub text: String,
    /// Section breadcrumb, for citation display.
    pub section_path: String,
    /// First page the chunk spans, if known.
    pub page_start: Option<u32>,
    /// Last page the chunk spans, if known.
    pub page_end: Option<u32>,
    /// Final retrieval score (meaning depends on mode: cosine similarity
    /// for dense-only, blended score for hybrid, reranker score if a
    /// rerank stage ran).
    pub score: f64,
    /// Denormalized framework, for display and downstream filtering.
    pub framework: String,
    /// Denormalized jurisdiction.
    pub jurisdiction: String,
    /// Denormalized document type.
    pub doc_type: String,
    /// Denormalized authority level.
    pub authority_level: String,
    /// Denormalized effective date, used as the tie-break key.
    pub effective_date: NaiveDate,
    /// Denormalized version label.
    pub version: String,
}

impl EvidenceHit {
    fn from_chunk(chunk: Chunk, score: f64) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            source_id: chunk.source_id,
            text: chunk.text,
            section_path: chunk.section_path,
            page_start: chunk.page_start,
            page_end: chunk.page_end,
            score,
            framework: chunk.framework,
            jurisdiction: chunk.jurisdiction,
            doc_type: chunk.doc_type,
            authority_level: chunk.authority_level,
            effective_date: chunk.effective_date,
            version: chunk.version,
        }
    }
}

/// Deterministic tie-break: score descending, then `effective_date`
/// descending.
fn sort_hits(hits: &mut [EvidenceHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.effective_date.cmp(&a.effective_date))
    });
}

/// Min-max normalizes a score map to `[0, 1]`. A singleton or
/// all-equal value set normalizes to `1.0` for every entry (the `ε`
/// guard prevents a zero-width range from dividing by zero).
fn minmax_normalize(values: &HashMap<String, f64>) -> HashMap<String, f64> {
    if values.is_empty() {
        return HashMap::new();
    }
    let min = values.values().copied().fold(f64::INFINITY, f64::min);
    let max = values.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let denom = if (max - min).abs() < f64::EPSILON {
        1e-9
    } else {
        max - min
    };

    values
        .iter()
        .map(|(k, v)| (k.clone(), (v - min) / denom))
        .collect()
}

fn hybrid_retrieve(
    storage: &dyn Storage,
    embedder: &dyn Embedder,
    settings: &Settings,
    query_text: &str,
    predicate: &FilterPredicate,
    top_k: usize,
) -> Result<Vec<EvidenceHit>> {
    let query_embedding = embedder.embed(query_text)?;
    let dense_hits = storage.ann_search(&query_embedding, predicate, settings.hybrid_k_dense, settings.probes)?;

    let sparse_query = if settings.synonym_expand_enable {
        expand_for_sparse(query_text)
    } else {
        query_text.to_string()
    };
    let sparse_hits = storage.sparse_search(&sparse_query, predicate, settings.hybrid_k_sparse)?;

    let dense_scores: HashMap<String, f64> = dense_hits
        .iter()
        .map(|(id, score)| (id.clone(), f64::from(*score)))
        .collect();
    let sparse_scores: HashMap<String, f64> =
        sparse_hits.iter().map(|(id, score)| (id.clone(), *score)).collect();

    let dense_norm = minmax_normalize(&dense_scores);
    let sparse_norm = minmax_normalize(&sparse_scores);

    let mut all_ids: Vec<String> = dense_scores.keys().cloned().collect();
    for id in sparse_scores.keys() {
        if !dense_scores.contains_key(id) {
            all_ids.push(id.clone());
        }
    }

    let mut hits = Vec::with_capacity(all_ids.len());
    for chunk_id in &all_ids {
        let Some(chunk) = storage.get_chunk(chunk_id)? else {
            continue;
        };
        let blended = settings.hybrid_weight_dense * dense_norm.get(chunk_id).copied().unwrap_or(0.0)
            + settings.hybrid_weight_sparse * sparse_norm.get(chunk_id).copied().unwrap_or(0.0);
        hits.push(EvidenceHit::from_chunk(chunk, blended));
    }

    sort_hits(&mut hits);
    hits.truncate(top_k);
    Ok(hits)
}

/// Retrieves evidence for `query_text`, honoring `filters`, returning at
/// most `top_k` hits in the router's chosen mode.
///
/// # Errors
///
/// Returns an error if the configured vector backend is external (not
/// shipped in this crate), if embedding the query fails, or if the
/// underlying storage queries fail.
pub fn retrieve(
    storage: &dyn Storage,
    embedder: &dyn Embedder,
    settings: &Settings,
    query_text: &str,
    filters: &FilterSet,
    top_k: Option<usize>,
) -> Result<Vec<EvidenceHit>> {
    let top_k = top_k.unwrap_or(settings.top_k);
    let predicate = filters.build();

    if settings.vector_backend == VectorBackend::External {
        return Err(Error::BackendUnavailable {
            backend: "external-vector-store".to_string(),
            reason: "no external vector store is configured in this build".to_string(),
        });
    }

    if settings.hybrid_enable {
        return hybrid_retrieve(storage, embedder, settings, query_text, &predicate, top_k);
    }

    let candidate_k = if settings.rerank_enable {
        settings.rerank_candidates.max(top_k)
    } else {
        top_k
    };

    let query_embedding = embedder.embed(query_text)?;
    let dense_hits = storage.ann_search(&query_embedding, &predicate, candidate_k, settings.probes)?;

    let mut hits = Vec::with_capacity(dense_hits.len());
    for (chunk_id, score) in dense_hits {
        let Some(chunk) = storage.get_chunk(&chunk_id)? else {
            continue;
        };
        hits.push(EvidenceHit::from_chunk(chunk, f64::from(score)));
    }
    sort_hits(&mut hits);

    if settings.rerank_enable {
        let reranker = LexicalOverlapReranker;
        return Ok(reranker.rerank(query_text, hits, top_k));
    }

    hits.truncate(top_k);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chunk, Document};
    use crate::embedding::FallbackEmbedder;
    use crate::metadata::NormalizedRecord;
    use crate::storage::{SqliteStorage, Storage};
    use std::path::PathBuf;

    fn sample_document(source_id: &str) -> Document {
        let normalized = NormalizedRecord {
            title: "Handbook".to_string(),
            doc_type: "policy".to_string(),
            framework: "SOX".to_string(),
            jurisdiction: "US".to_string(),
            authority_level: "internal".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            version: "1".to_string(),
        };
        Document::new(
            source_id.to_string(),
            &normalized,
            PathBuf::from("raw/handbook.pdf"),
            0,
        )
    }

    fn seeded_storage() -> SqliteStorage {
        let mut storage = SqliteStorage::in_memory().unwrap();
        storage.init().unwrap();
        let doc = sample_document("abc");
        storage.upsert_document(&doc).unwrap();

        let embedder = FallbackEmbedder::default();
        let texts = [
            "internal control over financial reporting requirements",
            "unrelated passage discussing quarterly weather patterns",
        ];
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk::new(&doc.source_id, i as u32, (*t).to_string(), &doc))
            .collect();
        storage.upsert_chunks(&chunks).unwrap();

        for chunk in &chunks {
            let embedding = embedder.embed(&chunk.text).unwrap();
            storage.store_embedding(&chunk.chunk_id, &embedding).unwrap();
        }
        storage
    }

    #[test]
    fn hybrid_retrieve_returns_relevant_chunk_first() {
        let storage = seeded_storage();
        let embedder = FallbackEmbedder::default();
        let settings = Settings::default();
        let filters = FilterSet::default();

        let hits = retrieve(
            &storage,
            &embedder,
            &settings,
            "internal control financial reporting",
            &filters,
            Some(5),
        )
        .unwrap();

        assert!(!hits.is_empty());
        assert!(hits[0].text.contains("internal control"));
    }

    #[test]
    fn dense_only_mode_respects_filters() {
        let storage = seeded_storage();
        let embedder = FallbackEmbedder::default();
        let mut settings = Settings::default();
        settings.hybrid_enable = false;
        let filters = FilterSet {
            framework: Some("GDPR".to_string()),
            ..Default::default()
        };

        let hits = retrieve(&storage, &embedder, &settings, "internal control", &filters, Some(5)).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn external_backend_errors_cleanly() {
        let storage = seeded_storage();
        let embedder = FallbackEmbedder::default();
        let mut settings = Settings::default();
        settings.vector_backend = VectorBackend::External;

        let result = retrieve(
            &storage,
            &embedder,
            &settings,
            "internal control",
            &FilterSet::default(),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn minmax_normalize_handles_singleton_without_dividing_by_zero() {
        let mut values = HashMap::new();
        values.insert("a".to_string(), 0.42);
        let normalized = minmax_normalize(&values);
        assert!(normalized["a"].is_finite());
    }

    #[test]
    fn hits_tie_break_by_effective_date_descending() {
        let mut a = EvidenceHit {
            chunk_id: "a".to_string(),
            source_id: "doc".to_string(),
            text: String::new(),
            section_path: String::new(),
            page_start: None,
            page_end: None,
            score: 0.5,
            framework: "SOX".to_string(),
            jurisdiction: "US".to_string(),
            doc_type: "policy".to_string(),
            authority_level: "internal".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            version: "1".to_string(),
        };
        let mut b = a.clone();
        b.chunk_id = "b".to_string();
        b.effective_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let mut hits = vec![a.clone(), b.clone()];
        sort_hits(&mut hits);
        assert_eq!(hits[0].chunk_id, "b");

        a.score = 0.5;
        b.score = 0.5;
    }
}
