use anyhow::{Context, Result};
use clap::Args;

use super::open_store;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Path of the document whose chunks should be removed
    #[arg(required = true)]
    pub doc_path: String,

    #[arg(long, short = 'o', help = "User who owns the document")]
    pub owner: String,
}

pub async fn handle_remove(args: RemoveArgs, format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let store = open_store(&config);

    let removed = store
        .remove_document(&args.owner, &args.doc_path)
        .await
        .with_context(|| format!("failed to remove {}", args.doc_path))?;

    print!(
        "{}",
        formatter.format_message(&format!(
            "Removed {} chunks of {} for {}",
            removed, args.doc_path, args.owner
        ))
    );
    Ok(())
}
