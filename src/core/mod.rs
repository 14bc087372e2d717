//! Core domain models for `citespine`.
//!
//! This module contains the fundamental data structures used throughout the
//! retrieval pipeline: documents and chunks. These are pure domain models
//! with no I/O dependencies.

pub mod chunk;
pub mod document;

pub use chunk::Chunk;
pub use document::{Document, DocumentFilterColumns};
