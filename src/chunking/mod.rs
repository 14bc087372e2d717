//! Chunking strategies for `citespine`.
//!
//! Splits ingested document text into citable, independently retrievable
//! segments. The primary (and, today, only) strategy is the
//! token-approximate sliding window in [`regulatory`], chosen to keep
//! citations aligned to predictable, overlap-bounded spans of regulatory
//! and audit text rather than prose-aware boundaries.

pub mod regulatory;
pub mod traits;

pub use regulatory::RegulatoryChunker;
pub use traits::Chunker;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regulatory_chunker_is_the_default() {
        let chunker = RegulatoryChunker::with_defaults();
        assert_eq!(chunker.name(), "regulatory");
    }
}
