//! Ingest orchestrator (C11).
//!
//! A single idempotent pass over a directory of raw source files: resolve
//! each file's metadata from a sidecar manifest, normalize it (C1),
//! extract and merge its text, chunk it (C2), upsert the result into the
//! catalog (C4), and embed only the chunks that are actually new (C3).
//! Re-running over unchanged inputs inserts no new chunks and overwrites
//! no embeddings.
//!
//! PDF byte-to-text extraction and OCR are external collaborators (out of
//! scope for this crate): [`TextExtractor`] and [`OcrEngine`] are the
//! seams a caller plugs a real implementation into.

use crate::chunking::{Chunker, RegulatoryChunker};
use crate::config::Settings;
use crate::core::{Chunk, Document};
use crate::embedding::Embedder;
use crate::error::{IoError, Result};
use crate::metadata::{self, NormalizedRecord, Vocabulary};
use crate::storage::Storage;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Minimum page text length below which OCR is attempted as a fallback.
const OCR_THRESHOLD_CHARS: usize = 20;

/// Extracts a source file's text, one entry per page.
///
/// Implementations may be backed by any PDF library; this crate ships
/// none, since byte-to-text extraction is explicitly out of scope.
pub trait TextExtractor: Send + Sync {
    /// Extracts `(page_number, text)` pairs from `path`, one-based page
    /// numbers in document order.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    fn extract_text_by_page(&self, path: &Path) -> Result<Vec<(u32, String)>>;
}

/// Falls back to OCR for a single page whose extracted text looks too
/// short to be real content.
pub trait OcrEngine: Send + Sync {
    /// Runs OCR over `page` of `path`, returning whatever text it
    /// recovers (possibly empty).
    ///
    /// # Errors
    ///
    /// Returns an error if the OCR backend is unreachable or fails.
    fn ocr_page(&self, path: &Path, page: u32) -> Result<String>;
}

/// Summary of one ingest pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Number of documents accepted into the catalog.
    pub accepted: usize,
    /// Number of documents rejected (validation, empty text, or zero
    /// chunks).
    pub rejected: usize,
    /// Path to the exceptions ledger, if any rows were written.
    pub exceptions_path: Option<PathBuf>,
    /// Directory processed JSONL files were written to.
    pub processed_dir: PathBuf,
}

/// Loads `manifest.csv` from `raw_dir`, mapping filename to its raw
/// metadata row. A missing manifest yields an empty map (every document
/// is then rejected for missing required fields, matching the reference
/// behavior rather than failing the whole run).
///
/// # Errors
///
/// Returns an error if the manifest exists but cannot be parsed.
fn load_manifest(raw_dir: &Path) -> Result<HashMap<String, HashMap<String, String>>> {
    let path = raw_dir.join("manifest.csv");
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let mut reader = csv::Reader::from_path(&path).map_err(|e| IoError::Csv {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let headers = reader
        .headers()
        .map_err(|e| IoError::Csv {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?
        .clone();

    let mut out = HashMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| IoError::Csv {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut row = HashMap::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            row.insert(header.to_string(), value.to_string());
        }
        if let Some(filename) = row.get("filename").cloned() {
            out.insert(filename, row);
        }
    }
    Ok(out)
}

fn merge_pages(pages: &[(u32, String)], source_path: &Path, ocr: Option<&dyn OcrEngine>) -> Result<String> {
    let mut merged = Vec::with_capacity(pages.len());
    for (page_number, text) in pages {
        let trimmed = text.trim();
        let resolved = if trimmed.chars().count() < OCR_THRESHOLD_CHARS {
            if let Some(ocr) = ocr {
                let ocr_text = ocr.ocr_page(source_path, *page_number)?;
                if ocr_text.chars().count() > trimmed.chars().count() {
                    ocr_text
                } else {
                    trimmed.to_string()
                }
            } else {
                trimmed.to_string()
            }
        } else {
            trimmed.to_string()
        };
        merged.push(resolved);
    }
    Ok(merged.join("\n\n").trim().to_string())
}

enum Rejection {
    Validation(HashMap<String, metadata::FieldError>),
    EmptyDocument,
    NoChunks,
}

struct Accepted {
    document: Document,
    chunks: Vec<Chunk>,
}

struct PreparedDocument {
    filename: String,
    outcome: std::result::Result<Accepted, Rejection>,
}

fn prepare_document(
    path: &Path,
    vocab: &Vocabulary,
    manifest: &HashMap<String, HashMap<String, String>>,
    extractor: &dyn TextExtractor,
    ocr: Option<&dyn OcrEngine>,
    chunker: &RegulatoryChunker,
    ingest_timestamp: i64,
) -> Result<PreparedDocument> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let empty_row = HashMap::new();
    let raw_row = manifest.get(&filename).unwrap_or(&empty_row);
    let normalized: NormalizedRecord = match metadata::normalize_record(raw_row, vocab) {
        Ok(record) => record,
        Err(errors) => {
            return Ok(PreparedDocument {
                filename,
                outcome: Err(Rejection::Validation(errors)),
            });
        }
    };

    let bytes = crate::io::FileReader::open(path)?.read_to_bytes()?;
    let source_id = metadata::compute_source_id(&bytes);

    let pages = extractor.extract_text_by_page(path)?;
    let page_count = u32::try_from(pages.len()).unwrap_or(u32::MAX);
    let full_text = merge_pages(&pages, path, ocr)?;

    if full_text.is_empty() {
        return Ok(PreparedDocument {
            filename,
            outcome: Err(Rejection::EmptyDocument),
        });
    }

    let document = Document::new(source_id, &normalized, path.to_path_buf(), ingest_timestamp);
    let chunks: Vec<Chunk> = chunker
        .chunk(&document, &full_text)?
        .into_iter()
        .map(|c| c.with_pages(Some(1), Some(page_count.max(1))).with_section_path(document.title.clone()))
        .collect();

    if chunks.is_empty() {
        return Ok(PreparedDocument {
            filename,
            outcome: Err(Rejection::NoChunks),
        });
    }

    Ok(PreparedDocument {
        filename,
        outcome: Ok(Accepted { document, chunks }),
    })
}

fn write_chunk_jsonl(path: &Path, document: &Document, chunks: &[Chunk], ingest_ts: &str) -> Result<()> {
    use std::io::Write as _;

    let file = std::fs::File::create(path).map_err(|e| IoError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let mut writer = std::io::BufWriter::new(file);

    for chunk in chunks {
        let row = serde_json::json!({
            "source_id": chunk.source_id,
            "title": document.title,
            "doc_type": chunk.doc_type,
            "framework": chunk.framework,
            "jurisdiction": chunk.jurisdiction,
            "authority_level": chunk.authority_level,
            "effective_date": chunk.effective_date.to_string(),
            "version": chunk.version,
            "section_path": chunk.section_path,
            "chunk_id": chunk.chunk_id,
            "text": chunk.text,
            "tokens": chunk.tokens,
            "page_start": chunk.page_start,
            "page_end": chunk.page_end,
            "source_path": document.source_path.display().to_string(),
            "ingest_ts": ingest_ts,
        });
        writeln!(writer, "{row}").map_err(|e| IoError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    }
    writer.flush().map_err(|e| IoError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Runs one ingest pass over every `*.pdf` file in `settings.raw_dir`.
///
/// Page extraction and chunk preparation run in parallel across
/// documents (via `rayon`); storage writes happen sequentially afterward
/// so `chunk_id` sequence density (I3) and idempotent skip-existing
/// behavior are never subject to write races.
///
/// # Errors
///
/// Returns an error if the raw or manifest directories cannot be read,
/// or if a storage operation fails. Per-document validation or
/// extraction failures are recorded in the exceptions ledger and do not
/// abort the run.
pub fn run_ingest(
    storage: &mut dyn Storage,
    embedder: &dyn Embedder,
    settings: &Settings,
    vocab: &Vocabulary,
    extractor: &dyn TextExtractor,
    ocr: Option<&dyn OcrEngine>,
    ingest_timestamp: i64,
) -> Result<IngestReport> {
    std::fs::create_dir_all(&settings.processed_dir).map_err(|e| IoError::DirectoryFailed {
        path: settings.processed_dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let manifest = load_manifest(&settings.raw_dir)?;
    let chunker = RegulatoryChunker::new(settings.chunk_size_tokens, settings.chunk_overlap_tokens);

    let mut pdf_paths: Vec<PathBuf> = if settings.raw_dir.is_dir() {
        std::fs::read_dir(&settings.raw_dir)
            .map_err(|e| IoError::ReadFailed {
                path: settings.raw_dir.display().to_string(),
                reason: e.to_string(),
            })?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "pdf"))
            .collect()
    } else {
        Vec::new()
    };
    pdf_paths.sort();

    let prepared: Vec<Result<PreparedDocument>> = pdf_paths
        .par_iter()
        .map(|path| prepare_document(path, vocab, &manifest, extractor, ocr, &chunker, ingest_timestamp))
        .collect();

    let exceptions_path = settings.processed_dir.join("exceptions.csv");

    let mut accepted = 0usize;
    let mut rejected = 0usize;
    let mut any_exceptions = false;
    let ingest_ts_iso = chrono::DateTime::from_timestamp(ingest_timestamp, 0)
        .unwrap_or_default()
        .to_rfc3339();

    for result in prepared {
        let prepared = result?;
        match prepared.outcome {
            Ok(doc) => {
                let existing_ids = storage.existing_chunk_ids(&doc.document.source_id)?;
                let existing: std::collections::HashSet<&str> = existing_ids.iter().map(String::as_str).collect();

                storage.upsert_document(&doc.document)?;
                storage.upsert_chunks(&doc.chunks)?;

                let new_chunks: Vec<&Chunk> = doc
                    .chunks
                    .iter()
                    .filter(|c| !existing.contains(c.chunk_id.as_str()))
                    .collect();

                if !new_chunks.is_empty() {
                    let texts: Vec<&str> = new_chunks.iter().map(|c| c.text.as_str()).collect();
                    let embeddings = embedder.embed_batch(&texts)?;
                    let batch: Vec<(String, Vec<f32>)> = new_chunks
                        .iter()
                        .zip(embeddings)
                        .map(|(chunk, embedding)| (chunk.chunk_id.clone(), embedding))
                        .collect();
                    storage.store_embeddings_batch(&batch)?;
                }

                let jsonl_path = settings.processed_dir.join(format!("{}.jsonl", doc.document.source_id));
                write_chunk_jsonl(&jsonl_path, &doc.document, &doc.chunks, &ingest_ts_iso)?;

                accepted += 1;
            }
            Err(Rejection::Validation(errors)) => {
                metadata::write_exception_rows(&exceptions_path, &prepared.filename, &errors)?;
                any_exceptions = true;
                rejected += 1;
            }
            Err(Rejection::EmptyDocument) => {
                let mut errors = HashMap::new();
                errors.insert(
                    "text".to_string(),
                    metadata::FieldError {
                        provided: String::new(),
                        suggestion: String::new(),
                        reason: "empty_document",
                    },
                );
                metadata::write_exception_rows(&exceptions_path, &prepared.filename, &errors)?;
                any_exceptions = true;
                rejected += 1;
            }
            Err(Rejection::NoChunks) => {
                let mut errors = HashMap::new();
                errors.insert(
                    "chunking".to_string(),
                    metadata::FieldError {
                        provided: String::new(),
                        suggestion: String::new(),
                        reason: "no_chunks_produced",
                    },
                );
                metadata::write_exception_rows(&exceptions_path, &prepared.filename, &errors)?;
                any_exceptions = true;
                rejected += 1;
            }
        }
    }

    Ok(IngestReport {
        accepted,
        rejected,
        exceptions_path: if any_exceptions { Some(exceptions_path) } else { None },
        processed_dir: settings.processed_dir.clone(),
    })
}
