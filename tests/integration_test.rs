//! End-to-end integration tests: ingest a small corpus, retrieve against
//! it, and compose a cited answer, exercising the pipeline the way the
//! CLI does rather than any single module in isolation.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use chrono::NaiveDate;
use citespine::chunking::{Chunker, RegulatoryChunker};
use citespine::compose::{self, NO_EVIDENCE_ANSWER};
use citespine::config::Settings;
use citespine::core::{Chunk, Document};
use citespine::embedding::{Embedder, FallbackEmbedder};
use citespine::manifest;
use citespine::metadata::{self, NormalizedRecord, Vocabulary};
use citespine::retrieval::{self, FilterSet};
use citespine::storage::{SqliteStorage, Storage};
use std::collections::HashMap;
use std::path::Path;

struct PlainTextExtractor;

impl citespine::ingest::TextExtractor for PlainTextExtractor {
    fn extract_text_by_page(&self, path: &Path) -> citespine::Result<Vec<(u32, String)>> {
        let contents = std::fs::read_to_string(path).unwrap_or_default();
        Ok(vec![(1, contents)])
    }
}

fn sample_vocab() -> Vocabulary {
    let yaml = "\
framework:
  allowed: [SOX, GDPR]
doc_type:
  allowed: [policy, standard]
jurisdiction:
  allowed: [US, EU]
authority_level:
  allowed: [internal, statute]
";
    serde_yaml::from_str(yaml).unwrap_or_default()
}

fn write_manifest_csv(raw_dir: &Path, rows: &[(&str, &str, &str)]) {
    let mut contents = String::from(
        "filename,title,doc_type,framework,jurisdiction,authority_level,effective_date,version\n",
    );
    for (filename, title, effective_date) in rows {
        contents.push_str(&format!(
            "{filename},{title},policy,SOX,US,internal,{effective_date},1\n"
        ));
    }
    std::fs::write(raw_dir.join("manifest.csv"), contents).unwrap();
}

fn seeded_settings(dir: &Path) -> Settings {
    Settings {
        raw_dir: dir.join("raw"),
        processed_dir: dir.join("processed"),
        manifests_dir: dir.join("manifests"),
        ..Settings::default()
    }
}

/// Ingests a tiny two-document corpus through the real pipeline, then
/// retrieves and composes an answer, checking that every citation names
/// a chunk actually present in the retrieved evidence (P1, "no citation
/// without a retrieved chunk behind it").
#[test]
fn ingest_retrieve_and_compose_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let raw_dir = dir.path().join("raw");
    std::fs::create_dir_all(&raw_dir).unwrap();
    write_manifest_csv(
        &raw_dir,
        &[
            ("handbook.pdf", "Internal Controls Handbook", "2024-01-01"),
            ("weather.pdf", "Quarterly Weather Digest", "2023-06-01"),
        ],
    );
    std::fs::write(
        raw_dir.join("handbook.pdf"),
        "internal control over financial reporting requires documented evidence of review",
    )
    .unwrap();
    std::fs::write(
        raw_dir.join("weather.pdf"),
        "unrelated passage discussing quarterly rainfall and temperature patterns",
    )
    .unwrap();

    let settings = seeded_settings(dir.path());
    let mut storage = SqliteStorage::in_memory().unwrap();
    storage.init().unwrap();
    let embedder = FallbackEmbedder::default();

    let report = citespine::ingest::run_ingest(
        &mut storage,
        &embedder,
        &settings,
        &sample_vocab(),
        &PlainTextExtractor,
        None,
        1_700_000_000,
    )
    .unwrap();

    assert_eq!(report.accepted, 2);
    assert_eq!(report.rejected, 0);
    assert_eq!(storage.document_count().unwrap(), 2);

    let hits = retrieval::retrieve(
        &storage,
        &embedder,
        &settings,
        "internal control financial reporting",
        &FilterSet::default(),
        Some(5),
    )
    .unwrap();
    assert!(!hits.is_empty());

    let answer = compose::compose(&hits, "What does internal control require?", None);
    assert!(!answer.missing_evidence);
    assert_eq!(answer.method, "extractive");

    let hit_ids: std::collections::HashSet<&str> =
        hits.iter().map(|h| h.chunk_id.as_str()).collect();
    for citation in &answer.citations {
        assert!(
            hit_ids.contains(citation.chunk_id.as_str()),
            "citation {} does not name a chunk present in the retrieved evidence",
            citation.chunk_id
        );
    }
}

/// An empty catalog must never fabricate an answer (P1's degenerate
/// case): retrieval returns nothing and composition falls back to the
/// sentinel.
#[test]
fn empty_catalog_yields_sentinel_answer() {
    let dir = tempfile::tempdir().unwrap();
    let settings = seeded_settings(dir.path());
    let mut storage = SqliteStorage::in_memory().unwrap();
    storage.init().unwrap();
    let embedder = FallbackEmbedder::default();

    let hits = retrieval::retrieve(
        &storage,
        &embedder,
        &settings,
        "anything at all",
        &FilterSet::default(),
        Some(5),
    )
    .unwrap();
    assert!(hits.is_empty());

    let answer = compose::compose(&hits, "anything at all", None);
    assert!(answer.missing_evidence);
    assert_eq!(answer.answer, NO_EVIDENCE_ANSWER);
    assert!(answer.citations.is_empty());
}

/// A filter that matches no document must return no evidence even
/// though unfiltered retrieval over the same corpus would (P2, filter
/// honesty: predicates are never silently relaxed).
#[test]
fn filter_excludes_non_matching_framework() {
    let dir = tempfile::tempdir().unwrap();
    let raw_dir = dir.path().join("raw");
    std::fs::create_dir_all(&raw_dir).unwrap();
    write_manifest_csv(&raw_dir, &[("handbook.pdf", "Handbook", "2024-01-01")]);
    std::fs::write(
        raw_dir.join("handbook.pdf"),
        "internal control over financial reporting requirements",
    )
    .unwrap();

    let settings = seeded_settings(dir.path());
    let mut storage = SqliteStorage::in_memory().unwrap();
    storage.init().unwrap();
    let embedder = FallbackEmbedder::default();

    citespine::ingest::run_ingest(
        &mut storage,
        &embedder,
        &settings,
        &sample_vocab(),
        &PlainTextExtractor,
        None,
        0,
    )
    .unwrap();

    let unfiltered = retrieval::retrieve(
        &storage,
        &embedder,
        &settings,
        "internal control",
        &FilterSet::default(),
        Some(5),
    )
    .unwrap();
    assert!(!unfiltered.is_empty());

    let filtered = retrieval::retrieve(
        &storage,
        &embedder,
        &settings,
        "internal control",
        &FilterSet {
            framework: Some("GDPR".to_string()),
            ..FilterSet::default()
        },
        Some(5),
    )
    .unwrap();
    assert!(filtered.is_empty());
}

/// Re-running ingest over byte-identical input inserts no new chunks and
/// leaves the chunk count unchanged (P5, ingest idempotence).
#[test]
fn reingesting_unchanged_bytes_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let raw_dir = dir.path().join("raw");
    std::fs::create_dir_all(&raw_dir).unwrap();
    write_manifest_csv(&raw_dir, &[("handbook.pdf", "Handbook", "2024-01-01")]);
    std::fs::write(raw_dir.join("handbook.pdf"), "internal control requirements overview").unwrap();

    let settings = seeded_settings(dir.path());
    let mut storage = SqliteStorage::in_memory().unwrap();
    storage.init().unwrap();
    let embedder = FallbackEmbedder::default();

    citespine::ingest::run_ingest(
        &mut storage,
        &embedder,
        &settings,
        &sample_vocab(),
        &PlainTextExtractor,
        None,
        0,
    )
    .unwrap();
    let first_chunk_count = storage.chunk_count().unwrap();
    let first_doc_count = storage.document_count().unwrap();

    citespine::ingest::run_ingest(
        &mut storage,
        &embedder,
        &settings,
        &sample_vocab(),
        &PlainTextExtractor,
        None,
        1,
    )
    .unwrap();

    assert_eq!(storage.chunk_count().unwrap(), first_chunk_count);
    assert_eq!(storage.document_count().unwrap(), first_doc_count);
}

/// Chunking a document produces a dense, 1-based chunk id sequence (P4 /
/// invariant I3), independent of the storage layer.
#[test]
fn chunker_produces_dense_one_based_chunk_ids() {
    let normalized = NormalizedRecord {
        title: "Handbook".to_string(),
        doc_type: "policy".to_string(),
        framework: "SOX".to_string(),
        jurisdiction: "US".to_string(),
        authority_level: "internal".to_string(),
        effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        version: "1".to_string(),
    };
    let doc = Document::new("feedface".to_string(), &normalized, "handbook.pdf".into(), 0);
    let chunker = RegulatoryChunker::new(3, 0);
    let chunks: Vec<Chunk> = chunker.chunk(&doc, "a b c d e f g").unwrap();

    let ids: Vec<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["feedface:0001", "feedface:0002", "feedface:0003"]);
}

/// Query embeddings are deterministic and finite-dimensional (P3,
/// embedding normality): identical text yields an identical vector of
/// the configured dimensionality.
#[test]
fn fallback_embedder_is_deterministic_and_correctly_sized() {
    let embedder = FallbackEmbedder::new(384);
    let a = embedder.embed("internal control requirements").unwrap();
    let b = embedder.embed("internal control requirements").unwrap();
    assert_eq!(a.len(), 384);
    assert_eq!(a, b);
    assert!(a.iter().all(|v| v.is_finite()));
}

/// A malformed `effective_date` is rejected with the documented
/// `YYYY-MM-DD` suggestion rather than silently coerced (mirrors
/// scenario S2).
#[test]
fn malformed_effective_date_is_rejected_with_suggestion() {
    let mut raw = HashMap::new();
    raw.insert("title".to_string(), "Handbook".to_string());
    raw.insert("doc_type".to_string(), "policy".to_string());
    raw.insert("framework".to_string(), "SOX".to_string());
    raw.insert("jurisdiction".to_string(), "US".to_string());
    raw.insert("authority_level".to_string(), "internal".to_string());
    raw.insert("effective_date".to_string(), "01/01/2024".to_string());
    raw.insert("version".to_string(), "1".to_string());

    let errors = metadata::normalize_record(&raw, &sample_vocab()).unwrap_err();
    let date_error = errors.get("effective_date").expect("effective_date should be rejected");
    assert_eq!(date_error.suggestion, "YYYY-MM-DD");
}

/// A run manifest's payload is a pure function of its inputs (minus
/// `created_at`): writing the same corpus hash twice at different times
/// produces byte-identical manifests apart from the timestamp (P6,
/// manifest replay).
#[test]
fn manifest_replay_is_stable_across_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let processed_dir = dir.path().join("processed");
    std::fs::create_dir_all(&processed_dir).unwrap();
    std::fs::write(processed_dir.join("doc1.jsonl"), "{\"chunk_id\":\"doc1:0001\"}\n").unwrap();

    let hash_a = manifest::corpus_hash(&processed_dir).unwrap();
    let hash_b = manifest::corpus_hash(&processed_dir).unwrap();
    assert_eq!(hash_a, hash_b);

    let manifests_dir = dir.path().join("manifests");
    let payload = serde_json::json!({ "corpus_hash": hash_a });
    let path_a = manifest::write(
        &manifests_dir,
        "query",
        payload.clone(),
        chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
    )
    .unwrap();
    let path_b = manifest::write(
        &manifests_dir,
        "query",
        payload,
        chrono::DateTime::from_timestamp(1_800_000_000, 0).unwrap(),
    )
    .unwrap();

    let contents_a: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path_a).unwrap()).unwrap();
    let contents_b: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path_b).unwrap()).unwrap();
    assert_eq!(contents_a["corpus_hash"], contents_b["corpus_hash"]);
    assert_ne!(contents_a["created_at"], contents_b["created_at"]);
}

proptest::proptest! {
    /// For any sequence of whitespace-delimited tokens, chunking always
    /// produces a dense, 1-based `chunk_id` sequence with no gaps
    /// (invariant I3, property P4).
    #[test]
    fn chunk_ids_are_always_dense(token_count in 0usize..200, target in 1usize..50, overlap in 0usize..49) {
        proptest::prop_assume!(overlap < target);
        let text = (0..token_count).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");

        let normalized = NormalizedRecord {
            title: "T".to_string(),
            doc_type: "policy".to_string(),
            framework: "SOX".to_string(),
            jurisdiction: "US".to_string(),
            authority_level: "internal".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            version: "1".to_string(),
        };
        let doc = Document::new("cafe".to_string(), &normalized, "t.pdf".into(), 0);
        let chunker = RegulatoryChunker::new(target, overlap);
        let chunks = chunker.chunk(&doc, &text).unwrap();

        for (i, chunk) in chunks.iter().enumerate() {
            let expected = format!("cafe:{:04}", i + 1);
            proptest::prop_assert_eq!(&chunk.chunk_id, &expected);
        }
    }
}
