//! Token-approximate sliding-window chunker.
//!
//! Splits document text into overlapping windows of whitespace-delimited
//! tokens. This is deliberately not a true subword tokenizer: token count
//! is approximated by counting runs of non-whitespace characters, the
//! same approximation the embedder and filter planner use when reasoning
//! about chunk size, so the three stay consistent with each other without
//! sharing a tokenizer dependency.

use crate::chunking::traits::Chunker;
use crate::core::{Chunk, Document};
use crate::error::{ChunkingError, Result};
use regex::Regex;
use std::sync::OnceLock;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    #[allow(clippy::unwrap_used)]
    PATTERN.get_or_init(|| Regex::new(r"\S+").unwrap())
}

/// Splits `text` into a flat list of whitespace-delimited token spans.
#[must_use]
pub fn approx_tokens(text: &str) -> Vec<&str> {
    token_pattern().find_iter(text).map(|m| m.as_str()).collect()
}

/// Counts whitespace-delimited tokens in `text`.
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    approx_tokens(text).len()
}

/// A sliding-window chunker over whitespace-approximate tokens.
///
/// Produces windows of up to `target_tokens` tokens, advancing by
/// `target_tokens - overlap_tokens` tokens each step (clamped to at least
/// one token so chunking always terminates), rejoining each window's
/// tokens with single spaces.
#[derive(Debug, Clone, Copy)]
pub struct RegulatoryChunker {
    target_tokens: usize,
    overlap_tokens: usize,
}

impl RegulatoryChunker {
    /// Default target window size in tokens (matches the reference
    /// ingest pipeline's `CHUNK_SIZE_TOKENS`).
    pub const DEFAULT_TARGET_TOKENS: usize = 900;

    /// Default overlap in tokens (matches `CHUNK_OVERLAP_TOKENS`).
    pub const DEFAULT_OVERLAP_TOKENS: usize = 150;

    /// Builds a chunker with explicit window and overlap sizes.
    #[must_use]
    pub const fn new(target_tokens: usize, overlap_tokens: usize) -> Self {
        Self {
            target_tokens,
            overlap_tokens,
        }
    }

    /// Builds a chunker using the crate's defaults.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self::new(Self::DEFAULT_TARGET_TOKENS, Self::DEFAULT_OVERLAP_TOKENS)
    }

    /// Splits raw text into token windows (without attaching document
    /// identity), the pure algorithmic core shared by [`Chunker::chunk`].
    #[must_use]
    pub fn windows(&self, text: &str) -> Vec<String> {
        let tokens = approx_tokens(text);
        let step = (self.target_tokens.saturating_sub(self.overlap_tokens)).max(1);

        let mut out = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let end = (i + self.target_tokens).min(tokens.len());
            let segment = &tokens[i..end];
            if segment.is_empty() {
                break;
            }
            out.push(segment.join(" "));
            i += step;
        }
        out
    }
}

impl Default for RegulatoryChunker {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Chunker for RegulatoryChunker {
    fn chunk(&self, document: &Document, text: &str) -> Result<Vec<Chunk>> {
        self.validate()?;
        let columns = document.filter_columns();
        Ok(self
            .windows(text)
            .into_iter()
            .enumerate()
            .map(|(i, segment)| {
                // Dense, 1-based per I3: chunk_id sequence numbers start at 0001.
                let seq = u32::try_from(i + 1).unwrap_or(u32::MAX);
                Chunk::with_filter_columns(&document.source_id, seq, segment, columns.clone())
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "regulatory"
    }

    fn description(&self) -> &'static str {
        "Token-approximate sliding-window chunker for regulatory and audit text"
    }

    fn validate(&self) -> Result<()> {
        if self.target_tokens == 0 {
            return Err(ChunkingError::InvalidConfig {
                reason: "target_tokens must be > 0".to_string(),
            }
            .into());
        }
        if self.overlap_tokens >= self.target_tokens {
            return Err(ChunkingError::OverlapTooLarge {
                overlap: self.overlap_tokens,
                size: self.target_tokens,
            }
            .into());
        }
        Ok(())
    }
}
