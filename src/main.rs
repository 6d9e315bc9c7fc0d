//! Webtoon catalog downloader.
//!
//! Crawls a series' paginated episode list, discovers the extent of the list
//! while walking it, downloads every episode's images in parallel with
//! retry/resume, and writes a `meta.js` manifest for the static viewer.
//!
//! Code structure:
//! - `base_system`: configuration and logging infrastructure
//! - `fetcher`: resilient HTTP GET / streamed download primitives
//! - `catalog`: list-page crawling and HTML extraction
//! - `download`: relay buffer, worker pools and the pipeline orchestrator
//! - `viewer`: manifest output

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

mod base_system;
mod catalog;
mod download;
mod fetcher;
mod viewer;

use base_system::config::load_or_create;
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use download::ToonDownloader;

#[derive(Debug, Parser)]
#[command(name = "webtoon-downloader")]
#[command(about = "Webtoon catalog downloader")]
struct Cli {
    /// Title id of the series to download
    title_id: u64,

    /// Enable debug log output
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Output directory (overrides the config file)
    #[arg(long)]
    output: Option<String>,

    /// Path to config.yml
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log = LogSystem::init(LogOptions {
        debug: cli.debug,
        ..LogOptions::default()
    })?;

    let mut config: Config = load_or_create(cli.config.as_deref())?;
    if let Some(output) = cli.output {
        config.output_dir = output;
    }

    let downloader = ToonDownloader::new(config, cli.title_id)?;
    let result = downloader.run()?;

    info!(
        discovered = result.discovered,
        downloaded = result.completed,
        "finished"
    );
    println!("Finished! Downloaded: {}", result.completed);
    Ok(())
}
