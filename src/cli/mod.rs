//! Command-line interface for ingesting and searching study documents.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Index study documents and search them per user.
#[derive(Debug, Parser)]
#[command(name = "studyrag")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch, chunk, embed and index one document
    Ingest(commands::IngestArgs),

    /// Search a user's indexed documents
    Search(commands::SearchArgs),

    /// Remove a document's chunks from the index
    Remove(commands::RemoveArgs),

    /// Show index and configuration status
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
