//! CLI layer for citespine.
//!
//! Provides the command-line interface using clap, with commands for
//! initializing the catalog, ingesting documents, checking metadata
//! normalization, querying, and inspecting run manifests.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
