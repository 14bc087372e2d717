//! Database schema definitions.
//!
//! Contains SQL schema and migration logic for the `citespine` catalog
//! `SQLite` database.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// SQL schema for initial database setup.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Documents (catalog of ingested source files)
CREATE TABLE IF NOT EXISTS documents (
    source_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    doc_type TEXT NOT NULL,
    framework TEXT NOT NULL,
    jurisdiction TEXT NOT NULL,
    authority_level TEXT NOT NULL,
    effective_date TEXT NOT NULL,
    version TEXT NOT NULL,
    source_path TEXT NOT NULL,
    ingest_timestamp INTEGER NOT NULL,
    hash TEXT NOT NULL
);

-- Indexes supporting the filter planner's equality and temporal predicates
CREATE INDEX IF NOT EXISTS idx_documents_filters
    ON documents(framework, jurisdiction, doc_type, authority_level);

CREATE INDEX IF NOT EXISTS idx_documents_temporal
    ON documents(framework, jurisdiction, effective_date, version);

-- Chunks (citable segments of a document's text). chunk_id is the
-- declared text primary key; SQLite still maintains an implicit integer
-- rowid distinct from it, which chunks_fts links against below.
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    text TEXT NOT NULL,
    tokens INTEGER NOT NULL,
    page_start INTEGER,
    page_end INTEGER,
    section_path TEXT NOT NULL DEFAULT '',
    framework TEXT NOT NULL,
    jurisdiction TEXT NOT NULL,
    doc_type TEXT NOT NULL,
    authority_level TEXT NOT NULL,
    effective_date TEXT NOT NULL,
    version TEXT NOT NULL,
    content_hash INTEGER NOT NULL,
    FOREIGN KEY (source_id) REFERENCES documents(source_id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_chunks_source_seq ON chunks(source_id, seq);

-- Chunks are content-addressed within a section: the same document must
-- not carry two chunks with identical text under the same section_path.
CREATE UNIQUE INDEX IF NOT EXISTS idx_chunks_section_content
    ON chunks(source_id, section_path, content_hash);

CREATE INDEX IF NOT EXISTS idx_chunks_filters
    ON chunks(framework, jurisdiction, doc_type, authority_level);

CREATE INDEX IF NOT EXISTS idx_chunks_temporal
    ON chunks(framework, jurisdiction, effective_date, version);

-- Chunk embeddings (dense vectors for the cosine-scan vector index)
CREATE TABLE IF NOT EXISTS chunk_embeddings (
    chunk_id TEXT PRIMARY KEY,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL,
    model_name TEXT,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (chunk_id) REFERENCES chunks(chunk_id) ON DELETE CASCADE
);

-- FTS5 virtual table for BM25 lexical search, linked via the implicit
-- integer rowid rather than the TEXT chunk_id primary key.
CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
    text,
    content='chunks',
    content_rowid='rowid',
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
    INSERT INTO chunks_fts(rowid, text) VALUES (new.rowid, new.text);
END;

CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, text) VALUES('delete', old.rowid, old.text);
END;

CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
    INSERT INTO chunks_fts(chunks_fts, rowid, text) VALUES('delete', old.rowid, old.text);
    INSERT INTO chunks_fts(chunks_fts, rowid, text) VALUES (new.rowid, new.text);
END;
";

/// SQL to check if schema is initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_info';
";

/// SQL to get schema version.
pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_info WHERE key = 'version';
";

/// SQL to set schema version.
pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?);
";

/// A schema migration from one version to the next.
pub struct Migration {
    /// Version this migration upgrades from.
    pub from_version: u32,
    /// Version this migration upgrades to.
    pub to_version: u32,
    /// SQL statements to execute.
    pub sql: &'static str,
}

/// Available migrations. Empty: the catalog schema has had exactly one
/// shape since this crate's first release.
pub const MIGRATIONS: &[Migration] = &[];

/// Gets migrations needed to upgrade from a version.
#[must_use]
pub fn get_migrations_from(current_version: u32) -> Vec<&'static Migration> {
    MIGRATIONS
        .iter()
        .filter(|m| m.from_version >= current_version && m.to_version <= CURRENT_SCHEMA_VERSION)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version() {
        const _: () = assert!(CURRENT_SCHEMA_VERSION >= 1);
    }

    #[test]
    fn test_schema_sql_not_empty() {
        assert!(!SCHEMA_SQL.is_empty());
        assert!(SCHEMA_SQL.contains("CREATE TABLE"));
        assert!(SCHEMA_SQL.contains("documents"));
        assert!(SCHEMA_SQL.contains("chunks_fts"));
    }

    #[test]
    fn test_migrations_ordered() {
        for migration in MIGRATIONS {
            assert!(migration.to_version > migration.from_version);
        }
    }

    #[test]
    fn test_get_migrations_from() {
        let migrations = get_migrations_from(0);
        assert!(migrations.len() <= MIGRATIONS.len());
    }
}
