//! Chunker trait definition.
//!
//! Defines the interface for text segmentation strategies producing
//! citable [`Chunk`](crate::core::Chunk)s for a single document.

use crate::core::{Chunk, Document};
use crate::error::Result;

/// Trait for chunking a document's text into citable segments.
///
/// Implementations must be `Send + Sync` and deterministic: the same
/// text and configuration always produce the same chunks in the same
/// order, since chunk identity (`chunk_id`) is derived from sequence
/// position alone.
pub trait Chunker: Send + Sync {
    /// Splits `text` into chunks owned by `document`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunker's configuration is invalid.
    fn chunk(&self, document: &Document, text: &str) -> Result<Vec<Chunk>>;

    /// Returns the name of the chunking strategy.
    fn name(&self) -> &'static str;

    /// Returns a description of the chunking strategy.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Validates this chunker's own configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid (e.g. overlap
    /// greater than or equal to chunk size).
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}
