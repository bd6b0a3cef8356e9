use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use super::build_pipeline;
use crate::cli::output::{Formatter, IngestReport, get_formatter};
use crate::models::{Config, IngestRequest, OutputFormat};
use crate::services::{IngestQueue, IngestionPipeline, JobStatus};

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Paths of the documents inside the document store
    #[arg(required = true, num_args = 1..)]
    pub doc_paths: Vec<String>,

    #[arg(long, short = 'o', help = "User who owns the documents")]
    pub owner: String,

    #[arg(long, help = "Folder (course) title, used as the default section title")]
    pub folder: String,
}

pub async fn handle_ingest(args: IngestArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    if args.owner.trim().is_empty() {
        anyhow::bail!("owner cannot be empty");
    }

    let pipeline = build_pipeline(&config)?;
    let requests: Vec<IngestRequest> = args
        .doc_paths
        .into_iter()
        .map(|path| IngestRequest::new(&args.owner, &args.folder, path))
        .collect();

    if verbose {
        eprintln!("Owner: {}", args.owner);
        eprintln!("  Folder: {}", args.folder);
        eprintln!("  Documents: {}", requests.len());
        eprintln!("  Index: {}", config.index.dir.display());
    }

    if requests.len() == 1 {
        ingest_one(&pipeline, &requests[0], format, formatter.as_ref()).await
    } else {
        ingest_many(pipeline, requests, format, formatter.as_ref()).await
    }
}

async fn ingest_one(
    pipeline: &IngestionPipeline,
    request: &IngestRequest,
    format: OutputFormat,
    formatter: &dyn Formatter,
) -> Result<()> {
    let spinner = if format == OutputFormat::Text {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .context("invalid progress template")?,
        );
        pb.set_message(format!("Indexing {}", request.doc_path));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let start = Instant::now();
    let result = pipeline.ingest(request).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let outcome = result.with_context(|| format!("failed to ingest {}", request.doc_path))?;
    let report = IngestReport {
        request: request.clone(),
        outcome,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    print!("{}", formatter.format_ingest(&report));

    Ok(())
}

async fn ingest_many(
    pipeline: IngestionPipeline,
    requests: Vec<IngestRequest>,
    format: OutputFormat,
    formatter: &dyn Formatter,
) -> Result<()> {
    let queue = IngestQueue::spawn(Arc::new(pipeline), requests.len());

    let pb = if format == OutputFormat::Text {
        let pb = ProgressBar::new(requests.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .context("invalid progress template")?
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let start = Instant::now();
    let mut jobs = Vec::with_capacity(requests.len());
    for request in requests {
        let id = queue.submit(request.clone()).await?;
        jobs.push((id, request));
    }

    let mut failed = 0usize;
    for (id, request) in jobs {
        pb.set_message(request.doc_path.clone());
        match queue.wait(id).await {
            Some(JobStatus::Completed(outcome)) => {
                let report = IngestReport {
                    request,
                    outcome,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
                pb.suspend(|| print!("{}", formatter.format_ingest(&report)));
            }
            Some(JobStatus::Failed { stage, message }) => {
                failed += 1;
                pb.suspend(|| {
                    eprint!(
                        "{}",
                        formatter.format_error(&format!(
                            "{} failed at {} stage: {}",
                            request.doc_path, stage, message
                        ))
                    )
                });
            }
            other => {
                failed += 1;
                tracing::warn!(job = %id, status = ?other, "job did not finish");
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    queue.shutdown().await;

    if failed > 0 {
        anyhow::bail!("{failed} documents failed to ingest");
    }
    Ok(())
}
