//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros. Every subcommand
//! maps directly onto one pipeline operation (C11 ingest, C8/C9 query,
//! C4 status/reset) or a dry-run of C1 (`normalize-check`); flags that
//! aren't given fall back to [`crate::config::Settings`] defaults, so a
//! bare `citespine query "..."` is always a valid invocation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// citespine: a citation-grounded retrieval engine for regulatory and
/// audit documents.
///
/// Ingests a corpus of metadata-annotated source documents, segments and
/// embeds them, and answers filtered queries with evidence-bound
/// citations. "No citation, no claim."
#[derive(Parser, Debug)]
#[command(name = "citespine")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the catalog database file.
    #[arg(long, env = "CITESPINE_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Directory raw source documents and `manifest.csv` are ingested from.
    #[arg(long, env = "CITESPINE_RAW_DIR", global = true)]
    pub raw_dir: Option<PathBuf>,

    /// Directory processed chunk JSONL and `exceptions.csv` are written to.
    #[arg(long, env = "CITESPINE_PROCESSED_DIR", global = true)]
    pub processed_dir: Option<PathBuf>,

    /// Directory run manifests are written to.
    #[arg(long, env = "CITESPINE_MANIFESTS_DIR", global = true)]
    pub manifests_dir: Option<PathBuf>,

    /// Path to the controlled-vocabulary YAML file.
    #[arg(long, env = "CITESPINE_VOCAB_PATH", global = true)]
    pub vocab_path: Option<PathBuf>,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, ndjson).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initializes the catalog database and scaffolds the raw/processed/
    /// manifests directories.
    Init {
        /// Re-initialize even if a catalog already exists (destroys
        /// existing data).
        #[arg(short, long)]
        force: bool,
    },

    /// Runs one idempotent ingest pass (C11) over `raw_dir`.
    ///
    /// Reads `manifest.csv`, validates each document's metadata (C1),
    /// chunks (C2) and embeds (C3) newly accepted text, and upserts it
    /// into the catalog (C4). Rejected documents are appended to
    /// `exceptions.csv` rather than aborting the run.
    Ingest,

    /// Dry-runs metadata normalization (C1) over `manifest.csv` without
    /// ingesting any document: reports which rows would be accepted and
    /// which would be rejected, and why, without writing to the catalog
    /// or the exceptions ledger.
    #[command(name = "normalize-check")]
    NormalizeCheck,

    /// Runs a filtered, citation-grounded query (C7/C8/C9) and writes a
    /// replayable manifest (C10).
    Query {
        /// The question text.
        question: String,

        /// Restrict to a single controlled framework (e.g. "SOX").
        #[arg(long)]
        framework: Option<String>,

        /// Restrict to a single controlled jurisdiction (e.g. "US").
        #[arg(long)]
        jurisdiction: Option<String>,

        /// Restrict to a single controlled document type.
        #[arg(long = "doc-type")]
        doc_type: Option<String>,

        /// Restrict to a single controlled authority level.
        #[arg(long = "authority-level")]
        authority_level: Option<String>,

        /// Restrict to documents effective on or before this ISO-8601 date.
        #[arg(long = "as-of")]
        as_of: Option<String>,

        /// Maximum number of citations to return.
        #[arg(long = "top-k")]
        top_k: Option<usize>,

        /// ANN search probe count (1..200).
        #[arg(long)]
        probes: Option<usize>,
    },

    /// Shows catalog and index statistics.
    Status,

    /// Prints a previously written run manifest.
    Manifest {
        /// Path to the manifest JSON file.
        path: PathBuf,
    },

    /// Resets all catalogued state (documents, chunks, embeddings,
    /// indexes), preserving the schema.
    Reset {
        /// Skip the confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

impl Cli {
    /// Builds [`crate::config::Settings`] from the process environment,
    /// then overrides any field a global CLI flag explicitly set.
    #[must_use]
    pub fn settings(&self) -> crate::config::Settings {
        let mut settings = crate::config::Settings::load();
        if let Some(v) = &self.db_path {
            settings.db_path.clone_from(v);
        }
        if let Some(v) = &self.raw_dir {
            settings.raw_dir.clone_from(v);
        }
        if let Some(v) = &self.processed_dir {
            settings.processed_dir.clone_from(v);
        }
        if let Some(v) = &self.manifests_dir {
            settings.manifests_dir.clone_from(v);
        }
        if let Some(v) = &self.vocab_path {
            settings.vocab_path.clone_from(v);
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn settings_uses_cli_override_over_env_default() {
        let cli = Cli {
            db_path: Some(PathBuf::from("/custom/path.db")),
            raw_dir: None,
            processed_dir: None,
            manifests_dir: None,
            vocab_path: None,
            verbose: false,
            format: "text".to_string(),
            command: Commands::Status,
        };
        assert_eq!(cli.settings().db_path, PathBuf::from("/custom/path.db"));
    }

    #[test]
    fn settings_falls_back_to_defaults_when_unset() {
        let cli = Cli {
            db_path: None,
            raw_dir: None,
            processed_dir: None,
            manifests_dir: None,
            vocab_path: None,
            verbose: false,
            format: "text".to_string(),
            command: Commands::Status,
        };
        assert_eq!(cli.settings().db_path, crate::config::Settings::default().db_path);
    }
}
