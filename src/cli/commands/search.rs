use anyhow::{Context, Result};
use clap::Args;

use super::build_retrieval;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat, RetrievalQuery};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Search query text")]
    pub query: String,

    #[arg(long, short = 'o', help = "Only search this user's documents")]
    pub owner: String,

    #[arg(long, help = "Restrict results to one folder title")]
    pub folder: Option<String>,

    #[arg(long, short = 'n', help = "Maximum number of results to return")]
    pub limit: Option<u32>,

    #[arg(long, help = "Minimum similarity score threshold (-1.0 to 1.0)")]
    pub min_score: Option<f32>,

    #[arg(long, help = "Print results as context blocks for a chat model")]
    pub context: bool,
}

pub async fn handle_search(args: SearchArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let query_text = args.query.trim();
    if query_text.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);

    let limit = args.limit.unwrap_or(config.retrieval.default_top_k);
    if limit == 0 {
        anyhow::bail!("limit must be at least 1");
    }

    let min_score = args.min_score.or(config.retrieval.min_score);
    if let Some(score) = min_score
        && !(-1.0..=1.0).contains(&score)
    {
        anyhow::bail!("min_score must be between -1.0 and 1.0");
    }

    let mut query = RetrievalQuery::new(args.owner, limit as usize);
    if let Some(folder) = args.folder {
        query = query.with_folder(folder);
    }
    if let Some(score) = min_score {
        query = query.with_min_score(score);
    }

    if verbose {
        eprintln!("Query: \"{query_text}\"");
        eprintln!("  Owner: {}", query.owner);
        eprintln!("  Limit: {limit}");
        if let Some(ref folder) = query.folder_title {
            eprintln!("  Folder: {folder}");
        }
        if let Some(score) = min_score {
            eprintln!("  Min score: {score:.3}");
        }
    }

    let service = build_retrieval(&config)?;
    let results = service
        .search_text(query_text, &query)
        .await
        .context("search failed")?;

    if verbose {
        eprintln!("Total: {}ms", results.duration_ms);
        eprintln!();
    }

    if args.context {
        print!("{}", formatter.format_context(&results));
    } else {
        print!("{}", formatter.format_search_results(&results));
    }

    Ok(())
}
