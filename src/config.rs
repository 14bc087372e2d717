//! Runtime configuration.
//!
//! A single typed `Settings` struct loaded once from the process
//! environment (optionally via a `.env` file). Every pipeline stage reads
//! its knobs from here rather than calling `std::env::var` directly, so
//! the full set of tunables lives in one place.

use std::path::PathBuf;

/// Vector search backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    /// Brute-force cosine scan against embeddings stored in `SQLite`.
    Sqlite,
    /// An external vector store fronting the same catalog (not shipped
    /// in this crate; selecting it without a configured endpoint falls
    /// back to the `Sqlite` backend at the router).
    External,
}

impl VectorBackend {
    fn from_env(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "external" | "pinecone" => Self::External,
            _ => Self::Sqlite,
        }
    }
}

/// All runtime-tunable knobs for retrieval, ingest, chunking, and
/// embedding, loaded once from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Database file path.
    pub db_path: PathBuf,
    /// Directory raw source PDFs/text are ingested from.
    pub raw_dir: PathBuf,
    /// Directory processed per-document JSONL and `exceptions.csv` are written to.
    pub processed_dir: PathBuf,
    /// Directory run manifests are written to.
    pub manifests_dir: PathBuf,
    /// Path to the controlled-vocabulary YAML file.
    pub vocab_path: PathBuf,

    /// Target chunk size in approximate tokens.
    pub chunk_size_tokens: usize,
    /// Overlap between adjacent chunk windows, in approximate tokens.
    pub chunk_overlap_tokens: usize,

    /// Default number of results a query returns absent an explicit override.
    pub top_k: usize,
    /// Candidate depth pulled from the dense index before blending/rerank.
    pub hybrid_k_dense: usize,
    /// Candidate depth pulled from the lexical index before blending.
    pub hybrid_k_sparse: usize,
    /// Approximate-search probe count passed to the vector index.
    pub probes: usize,
    /// Whether hybrid (dense + lexical) retrieval is enabled; when
    /// `false`, retrieval is dense-only (with optional rerank).
    pub hybrid_enable: bool,
    /// Dense-score weight in the hybrid blend.
    pub hybrid_weight_dense: f64,
    /// Lexical-score weight in the hybrid blend.
    pub hybrid_weight_sparse: f64,

    /// Whether a pluggable rerank stage runs after dense-only retrieval.
    pub rerank_enable: bool,
    /// Candidate pool size fed into the rerank stage.
    pub rerank_candidates: usize,

    /// Whether lexical queries are expanded with domain synonyms before
    /// hitting the FTS5 index.
    pub synonym_expand_enable: bool,

    /// Which vector backend the retrieval router targets.
    pub vector_backend: VectorBackend,

    /// Embedding vector dimensionality.
    pub embed_dim: usize,

    /// Default `as_of` filter applied when a query doesn't specify one.
    pub as_of_default: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(crate::storage::DEFAULT_DB_PATH),
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            manifests_dir: PathBuf::from("data/manifests"),
            vocab_path: PathBuf::from("config/metadata.yml"),
            chunk_size_tokens: 900,
            chunk_overlap_tokens: 150,
            top_k: 10,
            hybrid_k_dense: 50,
            hybrid_k_sparse: 50,
            probes: 10,
            hybrid_enable: true,
            hybrid_weight_dense: 0.6,
            hybrid_weight_sparse: 0.4,
            rerank_enable: false,
            rerank_candidates: 50,
            synonym_expand_enable: true,
            vector_backend: VectorBackend::Sqlite,
            embed_dim: crate::embedding::DEFAULT_DIMENSIONS,
            as_of_default: "2023-12-31".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from the process environment, applying a `.env`
    /// file in the current directory first if one exists. Any variable
    /// not set falls back to its documented default.
    #[must_use]
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Self {
            db_path: env_path("CITESPINE_DB_PATH", defaults.db_path),
            raw_dir: env_path("CITESPINE_RAW_DIR", defaults.raw_dir),
            processed_dir: env_path("CITESPINE_PROCESSED_DIR", defaults.processed_dir),
            manifests_dir: env_path("CITESPINE_MANIFESTS_DIR", defaults.manifests_dir),
            vocab_path: env_path("CITESPINE_VOCAB_PATH", defaults.vocab_path),
            chunk_size_tokens: env_usize("CITESPINE_CHUNK_SIZE", defaults.chunk_size_tokens),
            chunk_overlap_tokens: env_usize(
                "CITESPINE_CHUNK_OVERLAP",
                defaults.chunk_overlap_tokens,
            ),
            top_k: env_usize("CITESPINE_TOP_K", defaults.top_k),
            hybrid_k_dense: env_usize("CITESPINE_HYBRID_K_DENSE", defaults.hybrid_k_dense),
            hybrid_k_sparse: env_usize("CITESPINE_HYBRID_K_SPARSE", defaults.hybrid_k_sparse),
            probes: env_usize("CITESPINE_PROBES", defaults.probes),
            hybrid_enable: env_bool("CITESPINE_HYBRID_ENABLE", defaults.hybrid_enable),
            hybrid_weight_dense: env_f64(
                "CITESPINE_HYBRID_WEIGHT_DENSE",
                defaults.hybrid_weight_dense,
            ),
            hybrid_weight_sparse: env_f64(
                "CITESPINE_HYBRID_WEIGHT_SPARSE",
                defaults.hybrid_weight_sparse,
            ),
            rerank_enable: env_bool("CITESPINE_RERANK_ENABLE", defaults.rerank_enable),
            rerank_candidates: env_usize(
                "CITESPINE_RERANK_CANDIDATES",
                defaults.rerank_candidates,
            ),
            synonym_expand_enable: env_bool(
                "CITESPINE_SYNONYM_EXPAND",
                defaults.synonym_expand_enable,
            ),
            vector_backend: std::env::var("CITESPINE_VECTOR_BACKEND")
                .map(|v| VectorBackend::from_env(&v))
                .unwrap_or(defaults.vector_backend),
            embed_dim: env_usize("CITESPINE_EMBED_DIM", defaults.embed_dim),
            as_of_default: std::env::var("CITESPINE_AS_OF_DEFAULT")
                .unwrap_or(defaults.as_of_default),
        }
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map_or(default, PathBuf::from)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}
