//! CLI command implementations.
//!
//! Each function here wires a `Commands` variant onto the library's
//! public pipeline API (metadata, ingest, retrieval, compose, manifest)
//! exactly as an external caller would, so the CLI is a thin, testable
//! shell around the crate rather than a second implementation of it.

#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]

use crate::cli::output::{self, OutputFormat};
use crate::cli::parser::{Cli, Commands};
use crate::compose::{self, ComposedAnswer};
use crate::config::Settings;
use crate::embedding::create_embedder;
use crate::error::{IoError, Result, StorageError};
use crate::ingest::{self, IngestReport, OcrEngine, TextExtractor};
use crate::metadata::{self, Vocabulary};
use crate::retrieval::{self, FilterSet};
use crate::storage::{SqliteStorage, Storage, StorageStats};
use chrono::NaiveDate;
use std::path::Path;

/// Reads a source file's bytes and treats the whole thing as page 1 of
/// text. PDF byte-to-text extraction is an external collaborator (out of
/// scope for this crate, per [`TextExtractor`]); this is the CLI's
/// built-in stand-in so `citespine ingest` is runnable against plain-text
/// fixtures without wiring a real PDF library.
struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text_by_page(&self, path: &Path) -> Result<Vec<(u32, String)>> {
        let bytes = std::fs::read(path).map_err(|e| IoError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(vec![(1, String::from_utf8_lossy(&bytes).into_owned())])
    }
}

/// Loads the controlled vocabulary, falling back to an unrestricted
/// (allow-everything) vocabulary if `vocab_path` doesn't exist, so a
/// fresh checkout can ingest before an operator has authored one.
fn load_vocab(settings: &Settings) -> Result<Vocabulary> {
    if settings.vocab_path.exists() {
        Vocabulary::load(&settings.vocab_path)
    } else {
        Ok(Vocabulary::default())
    }
}

/// Executes the parsed CLI command, returning the string to print to
/// stdout.
///
/// # Errors
///
/// Returns an error if the underlying storage, ingest, or retrieval
/// operation fails. Per-document ingest rejections are not errors; they
/// are recorded in the exceptions ledger and reflected in the ingest
/// report.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let settings = cli.settings();

    match &cli.command {
        Commands::Init { force } => cmd_init(&settings, *force, format),
        Commands::Ingest => cmd_ingest(&settings, format),
        Commands::NormalizeCheck => cmd_normalize_check(&settings, format),
        Commands::Query {
            question,
            framework,
            jurisdiction,
            doc_type,
            authority_level,
            as_of,
            top_k,
            probes,
        } => cmd_query(
            &settings,
            question,
            framework.as_deref(),
            jurisdiction.as_deref(),
            doc_type.as_deref(),
            authority_level.as_deref(),
            as_of.as_deref(),
            *top_k,
            *probes,
            format,
        ),
        Commands::Status => cmd_status(&settings, format),
        Commands::Manifest { path } => cmd_manifest_show(path, format),
        Commands::Reset { yes } => cmd_reset(&settings, *yes, format),
    }
}

fn open_storage(settings: &Settings) -> Result<SqliteStorage> {
    let mut storage = SqliteStorage::open(&settings.db_path)?;
    storage.init()?;
    Ok(storage)
}

fn cmd_init(settings: &Settings, force: bool, format: OutputFormat) -> Result<String> {
    for dir in [&settings.raw_dir, &settings.processed_dir, &settings.manifests_dir] {
        std::fs::create_dir_all(dir).map_err(|e| IoError::DirectoryFailed {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
    }

    let mut storage = SqliteStorage::open(&settings.db_path)?;
    if force {
        storage.init()?;
        storage.reset()?;
    } else {
        storage.init()?;
    }

    Ok(output::format_init(&settings.db_path, force, format))
}

fn cmd_ingest(settings: &Settings, format: OutputFormat) -> Result<String> {
    let mut storage = open_storage(settings)?;
    let vocab = load_vocab(settings)?;
    let embedder = create_embedder()?;
    let now = chrono::Utc::now();

    let report: IngestReport = ingest::run_ingest(
        &mut storage,
        embedder.as_ref(),
        settings,
        &vocab,
        &PlainTextExtractor,
        None::<&dyn OcrEngine>,
        now.timestamp(),
    )?;

    let manifest_payload = serde_json::json!({
        "accepted": report.accepted,
        "rejected": report.rejected,
        "exceptions_path": report.exceptions_path.as_ref().map(|p| p.display().to_string()),
        "raw_dir": settings.raw_dir.display().to_string(),
    });
    let manifest_path = crate::manifest::write(&settings.manifests_dir, "ingest", manifest_payload, now)?;

    Ok(output::format_ingest_report(&report, &manifest_path, format))
}

fn cmd_normalize_check(settings: &Settings, format: OutputFormat) -> Result<String> {
    let vocab = load_vocab(settings)?;
    let manifest_path = settings.raw_dir.join("manifest.csv");

    if !manifest_path.exists() {
        return Ok(output::format_normalize_check(&[], &[("<manifest.csv missing>".to_string(), vec![])], format));
    }

    let mut reader = csv::Reader::from_path(&manifest_path).map_err(|e| IoError::Csv {
        path: manifest_path.display().to_string(),
        reason: e.to_string(),
    })?;
    let headers = reader
        .headers()
        .map_err(|e| IoError::Csv {
            path: manifest_path.display().to_string(),
            reason: e.to_string(),
        })?
        .clone();

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| IoError::Csv {
            path: manifest_path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mut row = std::collections::HashMap::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            row.insert(header.to_string(), value.to_string());
        }
        let filename = row.get("filename").cloned().unwrap_or_default();

        match metadata::normalize_record(&row, &vocab) {
            Ok(_) => accepted.push(filename),
            Err(errors) => {
                let mut fields: Vec<String> = errors.keys().cloned().collect();
                fields.sort();
                rejected.push((filename, fields));
            }
        }
    }

    Ok(output::format_normalize_check(&accepted, &rejected, format))
}

fn parse_as_of(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    raw.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            crate::error::Error::Config {
                message: format!("invalid --as-of date (expected YYYY-MM-DD): {s}"),
            }
        })
    })
    .transpose()
}

fn cmd_query(
    settings: &Settings,
    question: &str,
    framework: Option<&str>,
    jurisdiction: Option<&str>,
    doc_type: Option<&str>,
    authority_level: Option<&str>,
    as_of: Option<&str>,
    top_k: Option<usize>,
    probes: Option<usize>,
    format: OutputFormat,
) -> Result<String> {
    let start = std::time::Instant::now();
    let storage = open_storage(settings)?;
    let embedder = create_embedder()?;

    let mut settings = settings.clone();
    if let Some(p) = probes {
        settings.probes = p;
    }

    let filters = FilterSet {
        framework: framework.map(str::to_string),
        jurisdiction: jurisdiction.map(str::to_string),
        doc_type: doc_type.map(str::to_string),
        authority_level: authority_level.map(str::to_string),
        as_of: parse_as_of(as_of)?,
        focus_source_id: None,
    };

    let evidence = retrieval::retrieve(&storage, embedder.as_ref(), &settings, question, &filters, top_k)?;
    let answer: ComposedAnswer = compose::compose(&evidence, question, None);

    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let corpus_hash = crate::manifest::corpus_hash(&settings.processed_dir).unwrap_or_default();

    let citation_ids: Vec<&str> = answer.citations.iter().map(|c| c.chunk_id.as_str()).collect();
    let now = chrono::Utc::now();
    let manifest_payload = serde_json::json!({
        "question": question,
        "filters": {
            "framework": framework,
            "jurisdiction": jurisdiction,
            "doc_type": doc_type,
            "authority_level": authority_level,
            "as_of": as_of,
        },
        "top_k": top_k.unwrap_or(settings.top_k),
        "probes": settings.probes,
        "corpus_hash": corpus_hash,
        "citations": citation_ids,
        "method": answer.method,
    });
    let manifest_path = crate::manifest::write(&settings.manifests_dir, "query", manifest_payload, now)?;

    Ok(output::format_query_response(&answer, &manifest_path, latency_ms, format))
}

fn cmd_status(settings: &Settings, format: OutputFormat) -> Result<String> {
    let storage = open_storage(settings)?;
    let stats: StorageStats = storage.stats()?;
    Ok(output::format_status(&stats, format))
}

fn cmd_manifest_show(path: &Path, format: OutputFormat) -> Result<String> {
    let text = std::fs::read_to_string(path).map_err(|e| IoError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let value: serde_json::Value = serde_json::from_str(&text).map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(output::format_manifest_value(&value, format))
}

fn cmd_reset(settings: &Settings, yes: bool, format: OutputFormat) -> Result<String> {
    if !yes {
        return Err(crate::error::CommandError::Cancelled.into());
    }
    let mut storage = open_storage(settings)?;
    storage.reset()?;
    Ok(output::format_reset(format))
}
