//! Storage layer for `citespine`.
//!
//! Provides persistent storage for the document/chunk catalog, the dense
//! vector index, and the FTS5 lexical index using `SQLite`. The storage
//! layer handles documents, chunks, and embeddings with proper
//! transaction support.

pub mod schema;
pub mod sqlite;
pub mod traits;

pub use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};
pub use sqlite::SqliteStorage;
pub use traits::{FilterPredicate, Storage, StorageStats};

/// Default database file name.
pub const DEFAULT_DB_NAME: &str = "citespine.db";

/// Default database path relative to project root.
pub const DEFAULT_DB_PATH: &str = ".citespine/citespine.db";
