//! Error types for `citespine` operations.
//!
//! This module provides a comprehensive error hierarchy using `thiserror` for
//! all pipeline stages: storage, chunking, metadata normalization,
//! retrieval, answer composition, I/O, and CLI commands.

use thiserror::Error;

/// Result type alias for `citespine` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for `citespine` operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage-related errors (database operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Chunking-related errors (text processing).
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// A document's metadata failed controlled-vocabulary normalization
    /// and was routed to the exceptions ledger instead of the catalog.
    #[error("validation rejected for {filename}: {field_count} field(s) failed normalization")]
    ValidationRejected {
        /// Source filename the rejected record came from.
        filename: String,
        /// Number of fields that failed normalization.
        field_count: usize,
    },

    /// A document resolved to empty text after reading and merging,
    /// so it contributes no chunks and no catalog entry.
    #[error("document is empty after text extraction: {source_path}")]
    EmptyDocument {
        /// Path the empty document was read from.
        source_path: String,
    },

    /// A document's text produced zero chunks, typically because it is
    /// shorter than what the chunker considers a viable window.
    #[error("document produced no chunks: {source_id}")]
    NoChunks {
        /// `source_id` of the document that produced no chunks.
        source_id: String,
    },

    /// A configured backend (embedder, external vector store) is
    /// unreachable or refused the request.
    #[error("backend unavailable: {backend}: {reason}")]
    BackendUnavailable {
        /// Name of the backend that failed.
        backend: String,
        /// Underlying failure reason.
        reason: String,
    },

    /// A refiner produced output that failed the citation-validation gate
    /// (cited an evidence id outside the set actually supplied to it).
    /// Internal-only: always recovered from by falling back to extractive
    /// composition, never surfaced to a CLI caller.
    #[error("refiner output invalid: {reason}")]
    RefinerInvalid {
        /// Reason the refiner's output was rejected.
        reason: String,
    },

    /// A query produced zero evidence after retrieval and filtering, so
    /// no answer can be grounded.
    #[error("no evidence found for query")]
    NoEvidence,

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Storage-specific errors for database operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Storage not initialized (ingest command not run).
    #[error("catalog not initialized. Run: citespine ingest")]
    NotInitialized,

    /// Document not found by `source_id`.
    #[error("document not found: {source_id}")]
    DocumentNotFound {
        /// `source_id` that was not found.
        source_id: String,
    },

    /// Chunk not found by `chunk_id`.
    #[error("chunk not found: {chunk_id}")]
    ChunkNotFound {
        /// `chunk_id` that was not found.
        chunk_id: String,
    },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Embedding error (feature-gated).
    #[cfg(feature = "fastembed-embeddings")]
    #[error("embedding error: {0}")]
    Embedding(String),
}

/// Chunking-specific errors for text processing.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// Invalid UTF-8 encountered at specific byte offset.
    #[error("invalid UTF-8 at byte offset {offset}")]
    InvalidUtf8 {
        /// Byte offset where invalid UTF-8 was found.
        offset: usize,
    },

    /// Invalid chunk configuration.
    #[error("invalid chunk configuration: {reason}")]
    InvalidConfig {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// Overlap exceeds chunk size.
    #[error("overlap {overlap} must be less than chunk size {size}")]
    OverlapTooLarge {
        /// Overlap size.
        overlap: usize,
        /// Chunk size.
        size: usize,
    },

    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(String),
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Memory mapping error.
    #[error("memory mapping failed: {path}: {reason}")]
    MmapFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Directory creation error.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Path traversal security error.
    #[error("path traversal denied: {path}")]
    PathTraversal {
        /// Path that was denied.
        path: String,
    },

    /// CSV parsing or writing error.
    #[error("CSV error: {path}: {reason}")]
    Csv {
        /// Path to the CSV file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Unknown command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// User cancelled operation.
    #[error("operation cancelled by user")]
    Cancelled,

    /// Output format error.
    #[error("output format error: {0}")]
    OutputFormat(String),
}

// Implement From traits for standard library errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<regex::Error> for ChunkingError {
    fn from(err: regex::Error) -> Self {
        Self::Regex(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<csv::Error> for IoError {
    fn from(err: csv::Error) -> Self {
        Self::Csv {
            path: String::new(),
            reason: err.to_string(),
        }
    }
}

impl From<std::string::FromUtf8Error> for ChunkingError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::InvalidUtf8 {
            offset: err.utf8_error().valid_up_to(),
        }
    }
}

impl From<std::str::Utf8Error> for ChunkingError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::InvalidUtf8 {
            offset: err.valid_up_to(),
        }
    }
}
