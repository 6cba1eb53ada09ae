mod config;
mod db;
mod error;
mod fetch;
mod parser;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::config::Settings;
use crate::db::Dataset;
use crate::fetch::{Fetcher, PageCache};

#[derive(Parser)]
#[command(
    name = "jpdic_scraper",
    about = "Look up a Korean word on the Naver Korean-Japanese dictionary and merge it into a dataset"
)]
struct Cli {
    /// Search keyword
    keyword: String,
    /// Dataset file; read if present, written back after the merge
    dataset: PathBuf,
    /// Page cache directory (default: $JPDIC_CACHE_DIR or <temp>/naver)
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Neither read nor write the page cache
    #[arg(long)]
    no_cache: bool,
    /// Print the rows that would be merged without touching the dataset
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Wrong arguments print usage and exit cleanly.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            e.print()?;
            return Ok(());
        }
    };

    let settings = Settings::load()?;
    let t0 = Instant::now();
    run(&cli, &settings)?;
    info!(elapsed_ms = t0.elapsed().as_millis() as u64, "done");
    Ok(())
}

fn run(cli: &Cli, settings: &Settings) -> Result<()> {
    let cache = if cli.no_cache {
        None
    } else {
        let dir = cli.cache_dir.as_ref().unwrap_or(&settings.cache_dir);
        Some(PageCache::open(dir)?)
    };
    let fetcher = Fetcher::new(settings, cache)?;
    let page = fetcher.fetch(&cli.keyword)?;
    let entries = parser::extract_words(&page)
        .with_context(|| format!("Failed to extract entries for {:?}", cli.keyword))?;

    // A dry run merges into a scratch dataset so the preview shows stored rows.
    let dataset = if cli.dry_run {
        Dataset::new()?
    } else {
        Dataset::load(&cli.dataset)?
    };
    let mut ids = Vec::new();
    let mut meanings = 0;
    for word in entries {
        let word = word.with_context(|| format!("Failed to extract entries for {:?}", cli.keyword))?;
        meanings += dataset.merge_word(&word)?;
        ids.push(word.id);
    }

    if cli.dry_run {
        for id in ids {
            if let Some(word) = dataset.word(id)? {
                println!("{}", word);
            }
        }
        return Ok(());
    }
    dataset.save(&cli.dataset)?;

    let stats = dataset.stats()?;
    info!(words = stats.words, meanings = stats.meanings, "dataset totals");
    println!(
        "Merged {} words ({} meanings) into {}",
        ids.len(),
        meanings,
        cli.dataset.display()
    );
    Ok(())
}
