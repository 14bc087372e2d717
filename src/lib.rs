//! # citespine
//!
//! A citation-grounded retrieval engine for regulatory and audit documents.
//!
//! A corpus of PDFs, each annotated with controlled metadata, is ingested,
//! segmented, embedded, and indexed so that filtered similarity queries
//! return passages sufficient to compose answers whose every claim is
//! backed by a retrievable span. The invariant **"no citation → no
//! claim"** governs every answer this crate produces: the default
//! composer never emits text that isn't a cited, truncated excerpt of
//! retrieved evidence, and an optional LLM refiner's output is admitted
//! only if every claim it makes cites an id that was actually offered to
//! it.
//!
//! ## Pipeline
//!
//! - [`metadata`] validates a document's controlled-vocabulary fields and
//!   routes failures to an append-only exceptions ledger.
//! - [`chunking`] segments accepted document text into stable, citable
//!   windows.
//! - [`embedding`] turns chunk and query text into L2-normalized vectors.
//! - [`storage`] persists the document/chunk catalog and serves both the
//!   dense (cosine) and lexical (FTS5/BM25) retrieval paths.
//! - [`ingest`] wires the above into a single idempotent pass over a
//!   directory of raw sources.
//! - [`retrieval`] plans filter predicates and routes a query through
//!   dense, hybrid, or external-backend retrieval with optional rerank.
//! - [`compose`] turns ranked evidence into a grounded answer.
//! - [`manifest`] records every query or build as a replayable, content-
//!   addressed JSON record.
//! - [`config`] loads every tunable as a single typed `Settings` record.
//! - [`cli`] exposes the pipeline as a `clap`-derived command surface.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
// Note: unsafe is needed for memory-mapped I/O (memmap2)
#![warn(unsafe_code)]

pub mod chunking;
pub mod cli;
pub mod compose;
pub mod config;
pub mod core;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod io;
pub mod manifest;
pub mod metadata;
pub mod retrieval;
pub mod storage;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{Chunk, Document, DocumentFilterColumns};

// Re-export configuration
pub use config::Settings;

// Re-export storage types
pub use storage::{DEFAULT_DB_PATH, SqliteStorage, Storage};

// Re-export chunking types
pub use chunking::{Chunker, RegulatoryChunker};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};

// Re-export embedding types
#[cfg(feature = "fastembed-embeddings")]
pub use embedding::FastEmbedEmbedder;
pub use embedding::{DEFAULT_DIMENSIONS, Embedder, FallbackEmbedder, cosine_similarity, create_embedder};

// Re-export metadata/ingest/manifest/compose types
pub use compose::{ComposedAnswer, Refiner, compose};
pub use manifest::corpus_hash;
pub use metadata::{NormalizedRecord, Vocabulary};

// Re-export retrieval types
pub use retrieval::{EvidenceHit, FilterSet, retrieve};
