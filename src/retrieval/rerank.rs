//! Pluggable re-rank stage (part of C8).
//!
//! The reference system re-ranks dense-only candidates with a
//! cross-encoder. This crate doesn't ship an ONNX cross-encoder, so it
//! defines the same seam as a trait and provides a lexical-overlap
//! scorer as the default, swappable implementation.

use crate::retrieval::router::EvidenceHit;
use std::collections::HashSet;

/// Re-ranks a candidate pool against the query, returning the top `k`.
pub trait Reranker: Send + Sync {
    /// Re-ranks `hits` for `query`, returning at most `top_k` of them in
    /// descending order of the reranker's own scoring.
    fn rerank(&self, query: &str, hits: Vec<EvidenceHit>, top_k: usize) -> Vec<EvidenceHit>;
}

/// Scores each candidate by the fraction of query tokens it contains,
/// standing in for a real cross-encoder model. Deterministic and
/// dependency-free.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalOverlapReranker;

impl Reranker for LexicalOverlapReranker {
    fn rerank(&self, query: &str, mut hits: Vec<EvidenceHit>, top_k: usize) -> Vec<EvidenceHit> {
        if hits.is_empty() {
            return hits;
        }

        let query_tokens: HashSet<String> = query
            .split_whitespace()
            .map(|t| t.to_ascii_lowercase())
            .collect();

        if query_tokens.is_empty() {
            hits.truncate(top_k);
            return hits;
        }

        let mut scored: Vec<(f64, EvidenceHit)> = hits
            .into_iter()
            .map(|hit| {
                let text_tokens: HashSet<String> = hit
                    .text
                    .split_whitespace()
                    .map(|t| t.to_ascii_lowercase())
                    .collect();
                let overlap = query_tokens.intersection(&text_tokens).count();
                #[allow(clippy::cast_precision_loss)]
                let score = overlap as f64 / query_tokens.len() as f64;
                (score, hit)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.effective_date.cmp(&a.1.effective_date))
        });

        scored
            .into_iter()
            .take(top_k)
            .map(|(score, mut hit)| {
                hit.score = score;
                hit
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn hit(chunk_id: &str, text: &str) -> EvidenceHit {
        EvidenceHit {
            chunk_id: chunk_id.to_string(),
            source_id: "doc".to_string(),
            text: text.to_string(),
            section_path: String::new(),
            page_start: None,
            page_end: None,
            score: 0.0,
            framework: "SOX".to_string(),
            jurisdiction: "US".to_string(),
            doc_type: "policy".to_string(),
            authority_level: "internal".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            version: "1".to_string(),
        }
    }

    #[test]
    fn ranks_higher_overlap_first() {
        let hits = vec![
            hit("a", "unrelated passage about weather"),
            hit("b", "internal control over financial reporting overview"),
        ];
        let reranked = LexicalOverlapReranker.rerank("internal control financial reporting", hits, 2);
        assert_eq!(reranked[0].chunk_id, "b");
    }

    #[test]
    fn truncates_to_top_k() {
        let hits = vec![hit("a", "one"), hit("b", "two"), hit("c", "three")];
        let reranked = LexicalOverlapReranker.rerank("one two three", hits, 1);
        assert_eq!(reranked.len(), 1);
    }

    #[test]
    fn empty_hits_returns_empty() {
        let reranked = LexicalOverlapReranker.rerank("query", Vec::new(), 5);
        assert!(reranked.is_empty());
    }
}
