mod briefing;
mod config;
mod fetcher;
mod summarizer;

use std::path::PathBuf;

use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::briefing::{group_by_date, write_briefing};
use crate::config::Config;
use crate::fetcher::Fetcher;
use crate::summarizer::Summarizer;

#[derive(Parser, Debug)]
#[command(name = "newsbrief", about = "Low-bandwidth news briefing generator")]
struct Args {
    /// Path to the sources configuration file
    #[arg(long, default_value = "sources.toml")]
    config: String,

    /// Override the configured output directory
    #[arg(long)]
    output_dir: Option<String>,

    /// Fetch all available entries (not just today's) and write one briefing per date
    #[arg(long)]
    fetch_all: bool,

    /// Claude API key
    #[arg(long, env = "CLAUDE_API_KEY", hide_env_values = true)]
    api_key: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsbrief=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;
    info!("Loaded {} sources from configuration", config.sources.len());
    if args.fetch_all {
        info!("Fetch-all mode: keeping historical entries");
    }

    let output_dir = PathBuf::from(
        args.output_dir
            .unwrap_or_else(|| config.output.dir.clone()),
    );

    // Fetch all sources, skipping the ones that fail
    let fetcher = Fetcher::new(args.fetch_all);
    let mut articles = fetcher.fetch_all_sources(&config.sources).await;
    info!("Total articles fetched: {}", articles.len());

    if articles.is_empty() {
        warn!("No articles found, check your source URLs");
        return Ok(());
    }

    // Generate summaries batch by batch
    let summarizer = Summarizer::new(config.summarizer.clone(), args.api_key)?;
    summarizer.summarize_all(&mut articles).await;

    if args.fetch_all {
        // One briefing file per publication date, newest date first
        let grouped = group_by_date(articles);
        let mut written = 0;

        for (date, batch) in grouped.into_iter().rev() {
            if date == "unknown" {
                warn!("Skipping {} articles with unknown dates", batch.len());
                continue;
            }
            let count = batch.len();
            let path = write_briefing(batch, &date, &output_dir, config.output.html)?;
            info!("{}: {} articles -> {}", date, count, path.display());
            written += 1;
        }

        info!("Created {} daily briefings", written);
    } else {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let total = articles.len();
        let path = write_briefing(articles, &today, &output_dir, config.output.html)?;
        info!("{} articles summarized -> {}", total, path.display());
    }

    Ok(())
}
