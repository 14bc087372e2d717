//! Output formatting for CLI commands.
//!
//! Every command returns plain data; this module is the only place that
//! decides how it looks on a terminal versus as JSON, so adding an
//! output format never touches command logic.

use crate::compose::ComposedAnswer;
use crate::error::{
    ChunkingError, CommandError, Error, IoError, StorageError,
};
use crate::ingest::IngestReport;
use crate::storage::StorageStats;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
    /// Newline-delimited JSON (NDJSON) for streaming.
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name, defaulting to [`Self::Text`] for anything
    /// unrecognized rather than erroring.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" | "stream" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Returns true if this format emits one record per line rather than
    /// a single pretty-printed document.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Ndjson)
    }
}

fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

fn format_ndjson<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[unit])
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

/// Formats the result of `citespine init`.
#[must_use]
pub fn format_init(db_path: &Path, force: bool, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = String::new();
            if force {
                let _ = writeln!(out, "Re-initialized catalog at {}", db_path.display());
            } else {
                let _ = writeln!(out, "Initialized catalog at {}", db_path.display());
            }
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let payload = serde_json::json!({ "db_path": db_path.display().to_string(), "force": force });
            if format.is_streaming() {
                format_ndjson(&payload)
            } else {
                format_json(&payload)
            }
        }
    }
}

/// Formats a `citespine status` response.
#[must_use]
pub fn format_status(stats: &StorageStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_status_text(stats),
        OutputFormat::Json => format_json(stats),
        OutputFormat::Ndjson => format_ndjson(stats),
    }
}

fn format_status_text(stats: &StorageStats) -> String {
    let mut out = String::new();
    out.push_str("citespine status\n");
    out.push_str("=================\n\n");
    let _ = writeln!(out, "  Documents:        {}", stats.document_count);
    let _ = writeln!(out, "  Chunks:           {}", stats.chunk_count);
    let _ = writeln!(out, "  Embedded chunks:  {}", stats.embedded_chunk_count);
    let _ = writeln!(out, "  Schema version:   {}", stats.schema_version);
    if let Some(size) = stats.db_size {
        let _ = writeln!(out, "  Database size:    {}", format_size(size));
    }
    out
}

/// Formats the result of `citespine ingest`.
#[must_use]
pub fn format_ingest_report(report: &IngestReport, manifest_path: &Path, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str("Ingest complete\n");
            out.push_str("===============\n\n");
            let _ = writeln!(out, "  Accepted:   {}", report.accepted);
            let _ = writeln!(out, "  Rejected:   {}", report.rejected);
            if let Some(path) = &report.exceptions_path {
                let _ = writeln!(out, "  Exceptions: {}", path.display());
            }
            let _ = writeln!(out, "  Manifest:   {}", manifest_path.display());
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let payload = serde_json::json!({
                "accepted": report.accepted,
                "rejected": report.rejected,
                "exceptions_path": report.exceptions_path.as_ref().map(|p| p.display().to_string()),
                "processed_dir": report.processed_dir.display().to_string(),
                "manifest_path": manifest_path.display().to_string(),
            });
            if format.is_streaming() {
                format_ndjson(&payload)
            } else {
                format_json(&payload)
            }
        }
    }
}

/// Formats the result of `citespine normalize-check`.
#[must_use]
pub fn format_normalize_check(
    accepted: &[String],
    rejected: &[(String, Vec<String>)],
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = String::new();
            let _ = writeln!(out, "Accepted: {}", accepted.len());
            for filename in accepted {
                let _ = writeln!(out, "  ok    {filename}");
            }
            let _ = writeln!(out, "Rejected: {}", rejected.len());
            for (filename, fields) in rejected {
                let _ = writeln!(out, "  reject {filename}  ({})", fields.join(", "));
            }
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let payload = serde_json::json!({
                "accepted": accepted,
                "rejected": rejected.iter().map(|(f, fields)| serde_json::json!({
                    "filename": f,
                    "fields": fields,
                })).collect::<Vec<_>>(),
            });
            if format.is_streaming() {
                format_ndjson(&payload)
            } else {
                format_json(&payload)
            }
        }
    }
}

/// Formats the result of `citespine query`.
#[must_use]
pub fn format_query_response(
    answer: &ComposedAnswer,
    manifest_path: &Path,
    latency_ms: u64,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = String::new();
            let _ = writeln!(out, "{}\n", answer.answer);
            if !answer.citations.is_empty() {
                out.push_str("Citations:\n");
                for citation in &answer.citations {
                    let _ = writeln!(
                        out,
                        "  [{}] {} (p.{}-{})",
                        citation.chunk_id, citation.section_path, citation.page_span.0, citation.page_span.1
                    );
                }
                out.push('\n');
            }
            let _ = writeln!(out, "confidence: {:.3}  method: {}", answer.confidence, answer.method);
            let _ = writeln!(out, "manifest:   {}", manifest_path.display());
            let _ = writeln!(out, "latency:    {latency_ms}ms");
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let citations: Vec<serde_json::Value> = answer
                .citations
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "chunk_id": c.chunk_id,
                        "section_path": c.section_path,
                        "page_span": [c.page_span.0, c.page_span.1],
                        "text": c.text,
                    })
                })
                .collect();
            let payload = serde_json::json!({
                "answer": answer.answer,
                "citations": citations,
                "confidence": answer.confidence,
                "missing_evidence": answer.missing_evidence,
                "method": answer.method,
                "manifest_path": manifest_path.display().to_string(),
                "latency_ms": latency_ms,
            });
            if format.is_streaming() {
                format_ndjson(&payload)
            } else {
                format_json(&payload)
            }
        }
    }
}

/// Formats an arbitrary manifest JSON document for display.
#[must_use]
pub fn format_manifest_value(value: &serde_json::Value, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<invalid manifest: {e}>"))
        }
        OutputFormat::Json => format_json(value),
        OutputFormat::Ndjson => format_ndjson(value),
    }
}

/// Formats the result of `citespine reset`.
#[must_use]
pub fn format_reset(format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => "Catalog reset.\n".to_string(),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let payload = serde_json::json!({ "reset": true });
            if format.is_streaming() {
                format_ndjson(&payload)
            } else {
                format_json(&payload)
            }
        }
    }
}

/// Returns a short, human-readable description of an error, used for
/// text-mode error output.
#[must_use]
pub fn get_error_details(error: &Error) -> String {
    match error {
        Error::Storage(StorageError::NotInitialized) => {
            "catalog not initialized. Run: citespine init".to_string()
        }
        Error::Storage(StorageError::DocumentNotFound { source_id }) => {
            format!("no such document: {source_id}")
        }
        Error::Storage(StorageError::ChunkNotFound { chunk_id }) => {
            format!("no such chunk: {chunk_id}")
        }
        Error::Storage(StorageError::Database(msg) | StorageError::Migration(msg) | StorageError::Transaction(msg)) => {
            msg.clone()
        }
        Error::Storage(StorageError::Serialization(msg)) => msg.clone(),
        #[cfg(feature = "fastembed-embeddings")]
        Error::Storage(StorageError::Embedding(msg)) => msg.clone(),
        Error::Chunking(ChunkingError::InvalidUtf8 { offset }) => {
            format!("invalid UTF-8 at byte offset {offset}")
        }
        Error::Chunking(ChunkingError::InvalidConfig { reason }) => reason.clone(),
        Error::Chunking(ChunkingError::OverlapTooLarge { overlap, size }) => {
            format!("chunk overlap {overlap} must be smaller than chunk size {size}")
        }
        Error::Chunking(ChunkingError::Regex(msg)) => msg.clone(),
        Error::Io(IoError::FileNotFound { path }) => format!("file not found: {path}"),
        Error::Io(IoError::ReadFailed { path, reason } | IoError::WriteFailed { path, reason } | IoError::MmapFailed { path, reason } | IoError::DirectoryFailed { path, reason }) => {
            format!("{path}: {reason}")
        }
        Error::Io(IoError::PathTraversal { path }) => format!("path escapes allowed root: {path}"),
        Error::Io(IoError::Csv { path, reason }) => format!("{path}: {reason}"),
        Error::Io(IoError::Generic(msg)) => msg.clone(),
        Error::Command(CommandError::Cancelled) => "cancelled (pass --yes to confirm)".to_string(),
        Error::Command(CommandError::UnknownCommand(msg) | CommandError::InvalidArgument(msg) | CommandError::MissingArgument(msg) | CommandError::ExecutionFailed(msg) | CommandError::OutputFormat(msg)) => {
            msg.clone()
        }
        Error::ValidationRejected { filename, field_count } => {
            format!("{filename}: {field_count} field(s) failed vocabulary validation")
        }
        Error::EmptyDocument { source_path } => format!("empty document: {source_path}"),
        Error::NoChunks { source_id } => format!("document produced zero chunks: {source_id}"),
        Error::BackendUnavailable { backend, reason } => format!("{backend} backend unavailable: {reason}"),
        Error::RefinerInvalid { reason } => format!("refiner output rejected: {reason}"),
        Error::NoEvidence => "no evidence matched the given filters".to_string(),
        Error::InvalidState { message } | Error::Config { message } => message.clone(),
    }
}

/// Formats an error for display, honoring the requested output format.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => get_error_details(error),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let payload = serde_json::json!({ "error": get_error_details(error) });
            if format.is_streaming() {
                format_ndjson(&payload)
            } else {
                format_json(&payload)
            }
        }
    }
}
