//! Controlled-vocabulary metadata normalization and the exceptions ledger.
//!
//! Every ingested document's descriptive fields (framework, jurisdiction,
//! document type, ...) must resolve to a member of a controlled vocabulary
//! before the document is allowed into the catalog. Fields that don't
//! resolve are recorded as rows in an append-only exceptions ledger instead
//! of silently defaulting or aborting the whole ingest run.

use crate::error::{IoError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Fields every document record must supply to enter the catalog.
pub const REQUIRED_DOC_FIELDS: [&str; 7] = [
    "title",
    "doc_type",
    "framework",
    "jurisdiction",
    "authority_level",
    "effective_date",
    "version",
];

/// Allowed values and synonym substitutions for a single controlled field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldVocab {
    /// Accepted values. An empty or absent set means the field is
    /// free-form once trimmed (no membership check is applied).
    #[serde(default)]
    pub allowed: Vec<String>,
    /// Case-sensitive substitutions applied before the membership check,
    /// e.g. `"Sarbanes-Oxley" -> "SOX"`.
    #[serde(default)]
    pub synonyms: HashMap<String, String>,
}

/// The full set of controlled vocabularies, one per normalizable field,
/// as loaded from a vocabulary YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Vocabulary {
    #[serde(flatten)]
    fields: HashMap<String, FieldVocab>,
}

impl Vocabulary {
    /// Loads a vocabulary from a YAML file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse as
    /// the expected `{field: {allowed, synonyms}}` structure.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| IoError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_yaml::from_str(&text).map_err(|e| {
            IoError::ReadFailed {
                path: path.display().to_string(),
                reason: format!("invalid vocabulary YAML: {e}"),
            }
            .into()
        })
    }

    /// Returns the vocabulary for a single field, if configured.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldVocab> {
        self.fields.get(name)
    }
}

/// A document's metadata once every required field has normalized
/// successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Human-readable title.
    pub title: String,
    /// Controlled document type.
    pub doc_type: String,
    /// Controlled regulatory framework.
    pub framework: String,
    /// Controlled jurisdiction.
    pub jurisdiction: String,
    /// Controlled authority level.
    pub authority_level: String,
    /// Parsed ISO-8601 effective date.
    pub effective_date: NaiveDate,
    /// Opaque version label.
    pub version: String,
}

/// Why a single field failed normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// The raw value as supplied, before normalization.
    pub provided: String,
    /// A suggested replacement, when one can be inferred (a
    /// case-insensitive match in the allowed set), or a sentinel:
    /// `"UNKNOWN"` when nothing close was found, `"YYYY-MM-DD"` for a
    /// malformed `effective_date`. Empty when the field was simply missing.
    pub suggestion: String,
    /// Short machine-readable cause: `"REQUIRED"`, `"UNKNOWN"`, or
    /// `"BAD_DATE_FORMAT"`.
    pub reason: &'static str,
}

/// Computes a document's content-addressed `source_id`: the SHA-256 hex
/// digest of its raw bytes.
#[must_use]
pub fn compute_source_id(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

fn canon(raw: &str) -> String {
    raw.trim().to_string()
}

fn is_iso_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Normalizes one field value against its controlled vocabulary.
///
/// Returns the normalized value, or an error describing why it was
/// rejected. Mirrors the reference normalizer: trim, empty check,
/// synonym substitution, then an allowed-set membership check with a
/// case-insensitive suggestion on mismatch.
fn normalize_field(name: &str, raw: &str, vocab: &Vocabulary) -> std::result::Result<String, FieldError> {
    let value = canon(raw);
    if value.is_empty() {
        return Err(FieldError {
            provided: raw.to_string(),
            suggestion: String::new(),
            reason: "REQUIRED",
        });
    }

    let Some(field_vocab) = vocab.field(name) else {
        return Ok(value);
    };

    let value = field_vocab
        .synonyms
        .get(&value)
        .cloned()
        .unwrap_or(value);

    if field_vocab.allowed.is_empty() || field_vocab.allowed.iter().any(|a| a == &value) {
        return Ok(value);
    }

    let suggestion = field_vocab
        .allowed
        .iter()
        .find(|a| a.eq_ignore_ascii_case(&value))
        .cloned()
        .unwrap_or_else(|| "UNKNOWN".to_string());

    Err(FieldError {
        provided: raw.to_string(),
        suggestion,
        reason: "UNKNOWN",
    })
}

/// Normalizes a raw field map into a [`NormalizedRecord`], or collects one
/// [`FieldError`] per rejected field.
///
/// `raw` is keyed by field name (a parsed `manifest.csv` row, typically).
/// Fields absent from `raw` are treated as empty and rejected as
/// `"REQUIRED"`. `effective_date` additionally undergoes a strict
/// ISO-8601 format check after passing the controlled-vocabulary step.
///
/// # Errors
///
/// Returns `Err` with one entry per field that failed normalization. A
/// caller should route these into the exceptions ledger via
/// [`write_exception_rows`] rather than aborting the whole ingest run.
pub fn normalize_record(
    raw: &HashMap<String, String>,
    vocab: &Vocabulary,
) -> std::result::Result<NormalizedRecord, HashMap<String, FieldError>> {
    let mut errors = HashMap::new();
    let mut values: HashMap<&str, String> = HashMap::new();

    for field in REQUIRED_DOC_FIELDS {
        let raw_value = raw.get(field).map_or("", String::as_str);
        match normalize_field(field, raw_value, vocab) {
            Ok(v) => {
                values.insert(field, v);
            }
            Err(e) => {
                errors.insert(field.to_string(), e);
            }
        }
    }

    let effective_date = values.get("effective_date").and_then(|v| {
        let parsed = is_iso_date(v);
        if parsed.is_none() {
            errors.insert(
                "effective_date".to_string(),
                FieldError {
                    provided: raw.get("effective_date").cloned().unwrap_or_default(),
                    suggestion: "YYYY-MM-DD".to_string(),
                    reason: "BAD_DATE_FORMAT",
                },
            );
        }
        parsed
    });

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NormalizedRecord {
        title: values.remove("title").unwrap_or_default(),
        doc_type: values.remove("doc_type").unwrap_or_default(),
        framework: values.remove("framework").unwrap_or_default(),
        jurisdiction: values.remove("jurisdiction").unwrap_or_default(),
        authority_level: values.remove("authority_level").unwrap_or_default(),
        version: values.remove("version").unwrap_or_default(),
        effective_date: effective_date.unwrap_or_default(),
    })
}

/// One row of the append-only exceptions ledger: a single field, on a
/// single source file, that failed normalization during ingest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptionEntry {
    /// Source filename the record came from.
    pub filename: String,
    /// Name of the field that failed.
    pub field: String,
    /// The raw value as supplied.
    pub provided: String,
    /// Suggested replacement, or a sentinel (see [`FieldError::suggestion`]).
    pub suggestion: String,
    /// Short machine-readable cause (see [`FieldError::reason`]).
    pub reason: &'static str,
}

/// Appends one row per failed field to the exceptions CSV at `path`,
/// writing the header first if the file doesn't exist yet or is empty.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or the
/// file cannot be opened or written.
pub fn write_exception_rows(
    path: &Path,
    filename: &str,
    errors: &HashMap<String, FieldError>,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
            path: parent.display().to_string(),
            reason: e.to_string(),
        })?;
    }

    let write_header = !path.exists() || std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| IoError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if write_header {
        writer
            .write_record(["filename", "field", "provided", "suggestion", "reason"])
            .map_err(|e| IoError::Csv {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
    }

    let mut fields: Vec<_> = errors.keys().collect();
    fields.sort();
    for field in fields {
        let err = &errors[field];
        writer
            .write_record([filename, field, &err.provided, &err.suggestion, err.reason])
            .map_err(|e| IoError::Csv {
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
