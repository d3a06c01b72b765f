//! voicematch - ingest voice samples and find the closest matches.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use voicematch_retrieval::{IngestSummary, QueryResponse, RetrievalConfig, VoiceMatch};

/// Match a voice sample against a corpus of stored speaker embeddings.
#[derive(Parser, Debug)]
#[command(name = "voicematch", version, about = "Voice sample similarity search")]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract and store embeddings for every audio file in a directory
    Ingest {
        /// Directory of WAV files
        dir: PathBuf,

        /// Output the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find the stored samples closest to a WAV file
    Query {
        /// Query WAV file
        wav: PathBuf,

        /// Number of matches (defaults to query.default_k)
        #[arg(short, long)]
        k: Option<usize>,

        /// Output the matches as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show store statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RetrievalConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RetrievalConfig::default(),
    };
    let engine = VoiceMatch::new(config)
        .await
        .context("failed to start voicematch")?;

    match cli.command {
        Commands::Ingest { dir, json } => {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, finishing in-flight items");
                    on_interrupt.cancel();
                }
            });

            let summary = engine
                .ingest_directory_with_cancel(&dir, cancel)
                .await
                .with_context(|| format!("failed to ingest {}", dir.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Commands::Query { wav, k, json } => {
            let audio = tokio::fs::read(&wav)
                .await
                .with_context(|| format!("failed to read {}", wav.display()))?;
            let response = engine.find_matches(&audio, k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_matches(&response);
            }
        }
        Commands::Stats => {
            let stats = engine.stats().await?;
            println!("store:          {}", stats.store);
            println!("extractor:      {}", stats.extractor);
            println!("dimension:      {}", stats.dimension);
            println!("records:        {}", stats.records);
            println!("legacy records: {}", stats.legacy_records);
        }
    }

    Ok(())
}

fn print_summary(summary: &IngestSummary) {
    println!("stored: {}", summary.succeeded);
    println!("failed: {}", summary.failed.len());
    for failure in &summary.failed {
        println!("  {} ({:?}): {}", failure.identifier, failure.reason, failure.message);
    }
    if summary.interrupted {
        println!("interrupted, {} not started", summary.not_started);
    }
}

fn print_matches(response: &QueryResponse) {
    if response.results.is_empty() {
        println!("no matches");
    }
    for result in &response.results {
        println!(
            "{:>2}. {:.4}  {:>7.2}s  {}",
            result.rank + 1,
            result.similarity,
            result.duration_seconds,
            result.identifier
        );
    }
    let skipped = response.skipped_mismatches + response.skipped_degenerate;
    if skipped > 0 {
        println!("({skipped} stored records skipped)");
    }
}
