mod batch;
mod extract;
mod pipeline;
mod progress;
mod report;

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

use batch::PendingAnalyzer;
use pipeline::RunOptions;
use progress::ProgressStore;
use report::ReportWriter;

/// Default source documents: the top-level readme plus dated resource digests.
const SOURCE_DOCS: &[&str] = &[
    "README.md",
    "resources/2025-06.md",
    "resources/2025-07.md",
    "resources/2025-08.md",
];

#[derive(Parser)]
#[command(
    name = "arxiv_harvester",
    about = "Harvest arXiv paper references from markdown digests into a dataset"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract new papers, analyze them in batches, append to the dataset
    Run {
        /// Max papers to process this run (default: all new)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Papers per batch
        #[arg(short, long, default_value = "10")]
        batch_size: usize,
        /// Source documents (default: readme + dated resource files)
        docs: Vec<PathBuf>,
    },
    /// List extracted records without touching progress or the dataset
    Extract {
        /// Source documents (default: readme + dated resource files)
        docs: Vec<PathBuf>,
    },
    /// Show progress statistics
    Stats,
}

/// File locations and pacing, overridable via HARVESTER_* environment
/// variables.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Settings {
    progress_path: PathBuf,
    report_path: PathBuf,
    batch_delay_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            progress_path: "data/progress.json".into(),
            report_path: "data/dataset.md".into(),
            batch_delay_secs: 30,
        }
    }
}

fn load_settings() -> Settings {
    config::Config::builder()
        .add_source(config::Environment::with_prefix("HARVESTER"))
        .build()
        .and_then(|c| c.try_deserialize())
        .unwrap_or_default()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = load_settings();
    info!(settings = ?settings, "starting harvester");

    let result = match cli.command {
        Commands::Run {
            limit,
            batch_size,
            docs,
        } => {
            let store = ProgressStore::new(&settings.progress_path);
            let report = ReportWriter::new(&settings.report_path);
            let opts = RunOptions {
                docs: source_docs(docs),
                batch_size,
                max_papers: limit,
                batch_delay: Duration::from_secs(settings.batch_delay_secs),
            };
            let summary = pipeline::run(&opts, &store, &report, &PendingAnalyzer)?;
            summary.print();
            Ok(())
        }
        Commands::Extract { docs } => cmd_extract(&source_docs(docs)),
        Commands::Stats => cmd_stats(&settings),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn source_docs(docs: Vec<PathBuf>) -> Vec<PathBuf> {
    if docs.is_empty() {
        SOURCE_DOCS.iter().map(PathBuf::from).collect()
    } else {
        docs
    }
}

fn cmd_extract(docs: &[PathBuf]) -> anyhow::Result<()> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut total = 0usize;

    println!("{:>3} | {:<14} | {:<50}", "#", "Identifier", "Title");
    println!("{}", "-".repeat(73));

    for path in docs {
        let Some(text) = pipeline::read_source_doc(path)? else {
            continue;
        };
        for record in extract::extract_records(&text) {
            if !seen.insert(record.identifier.clone()) {
                continue;
            }
            total += 1;
            println!(
                "{:>3} | {:<14} | {:<50}",
                total,
                record.identifier,
                truncate(&record.title, 50),
            );
        }
    }

    println!("\n{} records across {} documents", total, docs.len());
    Ok(())
}

fn cmd_stats(settings: &Settings) -> anyhow::Result<()> {
    let state = ProgressStore::new(&settings.progress_path).load()?;
    let rows = ReportWriter::new(&settings.report_path).row_count()?;
    println!("Completed:  {}", state.completed.len());
    println!("Last batch: {}", state.last_batch);
    println!("Rows:       {}", rows);
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
