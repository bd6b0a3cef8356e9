use std::fmt::Write as FmtWrite;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use console::style;
use serde::Serialize;

use crate::models::{IngestOutcome, IngestRequest, OutputFormat, RetrievalResults};
use crate::services::{IndexStats, render_context};

pub trait Formatter {
    fn format_search_results(&self, results: &RetrievalResults) -> String;
    fn format_context(&self, results: &RetrievalResults) -> String;
    fn format_ingest(&self, report: &IngestReport) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    #[serde(flatten)]
    pub request: IngestRequest,
    pub outcome: IngestOutcome,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_reachable: Option<bool>,
    pub dimension: u32,
    pub documents_driver: String,
    pub documents_location: String,
    pub vectors_path: PathBuf,
    pub metadata_path: PathBuf,
    pub last_modified: Option<DateTime<Local>>,
    pub index: Option<IndexStats>,
    pub index_error: Option<String>,
}

const PREVIEW_CHARS: usize = 200;

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_search_results(&self, results: &RetrievalResults) -> String {
        if results.is_empty() {
            return format!(
                "No results for {} in {}'s documents\n",
                results.query, results.owner
            );
        }

        let mut output = String::new();
        writeln!(
            output,
            "{} \"{}\"",
            style("Results for").bold(),
            results.query
        )
        .unwrap();
        writeln!(
            output,
            "Found {} chunks in {}ms\n",
            results.len(),
            results.duration_ms
        )
        .unwrap();

        for (i, result) in results.results.iter().enumerate() {
            let record = &result.record;
            writeln!(
                output,
                "{}. [Score: {}]",
                i + 1,
                style(format!("{:.3}", result.score)).cyan()
            )
            .unwrap();
            writeln!(
                output,
                "   {} / {}",
                record.folder_title, record.section_title
            )
            .unwrap();
            writeln!(
                output,
                "   {} #{}",
                style(&record.doc_path).dim(),
                record.chunk_index
            )
            .unwrap();
            writeln!(output, "   ---").unwrap();

            let preview: String = record.content.chars().take(PREVIEW_CHARS).collect();
            let preview = if record.content.chars().count() > PREVIEW_CHARS {
                format!("{}...", preview)
            } else {
                preview
            };
            for line in preview.lines() {
                writeln!(output, "   {}", line).unwrap();
            }
            writeln!(output).unwrap();
        }

        output
    }

    fn format_context(&self, results: &RetrievalResults) -> String {
        let mut context = render_context(&results.results);
        context.push('\n');
        context
    }

    fn format_ingest(&self, report: &IngestReport) -> String {
        let mut output = String::new();
        match report.outcome {
            IngestOutcome::Indexed { chunks, replaced } => {
                writeln!(
                    output,
                    "{} {} ({} chunks)",
                    style("Indexed").green().bold(),
                    report.request.doc_path,
                    chunks
                )
                .unwrap();
                if replaced > 0 {
                    writeln!(output, "  Replaced: {} previous chunks", replaced).unwrap();
                }
            }
            IngestOutcome::NothingToIndex { removed } => {
                writeln!(
                    output,
                    "{} {} (no text found)",
                    style("Skipped").yellow().bold(),
                    report.request.doc_path
                )
                .unwrap();
                if removed > 0 {
                    writeln!(output, "  Removed:  {} previous chunks", removed).unwrap();
                }
            }
        }
        writeln!(output, "  Owner:    {}", report.request.owner).unwrap();
        writeln!(output, "  Folder:   {}", report.request.folder_title).unwrap();
        writeln!(output, "  Duration: {}ms", report.duration_ms).unwrap();
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        writeln!(
            output,
            "Embedding:     {} ({})",
            status.embedding_provider, status.embedding_model
        )
        .unwrap();
        writeln!(output, "  Dimension:   {}", status.dimension).unwrap();
        if let Some(reachable) = status.embedding_reachable {
            let state = if reachable {
                style("[CONNECTED]").green()
            } else {
                style("[DISCONNECTED]").red()
            };
            writeln!(output, "  Server:      {}", state).unwrap();
        }
        writeln!(
            output,
            "Documents:     {} ({})",
            status.documents_driver, status.documents_location
        )
        .unwrap();
        writeln!(output).unwrap();

        let state = match (&status.index, &status.index_error) {
            (_, Some(_)) => style("[CORRUPT]").red(),
            (Some(stats), None) if stats.entries > 0 => style("[READY]").green(),
            _ => style("[EMPTY]").yellow(),
        };
        writeln!(output, "Index:         {}", state).unwrap();
        writeln!(output, "  Vectors:     {}", status.vectors_path.display()).unwrap();
        writeln!(output, "  Metadata:    {}", status.metadata_path.display()).unwrap();
        if let Some(ref stats) = status.index {
            writeln!(output, "  Entries:     {}", stats.entries).unwrap();
            writeln!(output, "  Documents:   {}", stats.documents).unwrap();
            writeln!(output, "  Owners:      {}", stats.owners).unwrap();
            writeln!(output, "  Generation:  {}", stats.generation).unwrap();
        }
        if let Some(modified) = status.last_modified {
            writeln!(
                output,
                "  Updated:     {}",
                modified.format("%Y-%m-%d %H:%M:%S")
            )
            .unwrap();
        }
        if let Some(ref error) = status.index_error {
            writeln!(output, "  Error:       {}", error).unwrap();
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("{} {}\n", style("Error:").red().bold(), error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        let mut rendered =
            rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string());
        rendered.push('\n');
        rendered
    }
}

impl Formatter for JsonFormatter {
    fn format_search_results(&self, results: &RetrievalResults) -> String {
        self.render(results)
    }

    fn format_context(&self, results: &RetrievalResults) -> String {
        self.render(&serde_json::json!({
            "query": results.query,
            "owner": results.owner,
            "context": render_context(&results.results),
        }))
    }

    fn format_ingest(&self, report: &IngestReport) -> String {
        self.render(report)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(status)
    }

    fn format_message(&self, message: &str) -> String {
        self.render(&serde_json::json!({"message": message}))
    }

    fn format_error(&self, error: &str) -> String {
        self.render(&serde_json::json!({"error": error}))
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}
