//! Pipeline orchestration: crawl the catalog, fan entries out to download
//! workers, and aggregate completions into the viewer manifest.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, anyhow};
use crossbeam_channel::{Sender, bounded, unbounded};
use tracing::{error, info, warn};
use url::Url;

use super::pool::{self, Worker};
use super::progress::{Stats, spawn_reporter};
use super::relay::relay;
use crate::base_system::context::Config;
use crate::catalog::{Entry, HttpPageSource, ListLoader, detail, metadata};
use crate::fetcher::Fetcher;
use crate::viewer::{Renderer, ViewerEntry, ViewerInfo};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DownloadResult {
    pub discovered: u64,
    pub completed: u64,
}

/// One fully processed entry, ready for the manifest.
#[derive(Debug, Clone)]
pub(crate) struct DownloadedEntry {
    pub number: u32,
    pub title: String,
    /// Entry directory relative to the output root.
    pub dir: String,
    pub thumbnail_file: String,
    pub content_files: Vec<String>,
}

/// Derive the destination file name from the URL's last path segment.
fn file_name_of(url: &Url) -> anyhow::Result<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no file name in asset url \"{url}\""))
}

/// Download one file into `dir`, resuming an existing partial file.
fn download_file(fetcher: &Fetcher, dir: &Path, url: &Url) -> anyhow::Result<String> {
    let name = file_name_of(url)?;
    let path = dir.join(&name);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&path)
        .with_context(|| format!("failed to open file \"{}\"", path.display()))?;
    let existing_size = file
        .metadata()
        .with_context(|| format!("failed to stat file \"{}\"", path.display()))?
        .len();
    fetcher.get_to(url.as_str(), &mut file, existing_size)?;
    Ok(name)
}

/// Downloads a single content image.
struct AssetWorker {
    fetcher: Arc<Fetcher>,
    dir: PathBuf,
}

impl Worker for AssetWorker {
    type Item = Url;
    type Output = String;

    fn process(&self, url: Url, out: &Sender<String>) -> anyhow::Result<()> {
        let name = download_file(&self.fetcher, &self.dir, &url)?;
        let _ = out.send(name);
        Ok(())
    }
}

/// Processes one catalog entry: scrape its detail page, download every
/// content image through an inner asset pool, and fetch the thumbnail.
struct EntryWorker {
    fetcher: Arc<Fetcher>,
    output_root: PathBuf,
    title_id: u64,
    asset_workers: usize,
    err_tx: Sender<anyhow::Error>,
    stats: Arc<Stats>,
}

impl Worker for EntryWorker {
    type Item = Entry;
    type Output = DownloadedEntry;

    fn process(&self, entry: Entry, out: &Sender<DownloadedEntry>) -> anyhow::Result<()> {
        let rel_dir = format!("{}/{}", self.title_id, entry.number);
        let dir = self
            .output_root
            .join(self.title_id.to_string())
            .join(entry.number.to_string());
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to make directory \"{}\"", dir.display()))?;

        let urls = detail::asset_urls(&self.fetcher, &entry.detail_url)?;

        let (asset_tx, asset_rx) = bounded(0);
        let (files_rx, handles) = pool::run_pool(
            Arc::new(AssetWorker {
                fetcher: Arc::clone(&self.fetcher),
                dir: dir.clone(),
            }),
            self.asset_workers,
            asset_rx,
            self.err_tx.clone(),
        );
        for url in urls {
            if asset_tx.send(url).is_err() {
                break;
            }
        }
        drop(asset_tx);

        let mut content_files: Vec<String> = files_rx.iter().collect();
        for handle in handles {
            let _ = handle.join();
        }
        content_files.sort_unstable();

        // A failed thumbnail is reported but does not fail the entry.
        let thumbnail_file = match download_file(&self.fetcher, &dir, &entry.thumbnail_url) {
            Ok(name) => name,
            Err(err) => {
                let _ = self.err_tx.send(err);
                String::new()
            }
        };

        self.stats.inc_completed();
        let _ = out.send(DownloadedEntry {
            number: entry.number,
            title: entry.title,
            dir: rel_dir,
            thumbnail_file,
            content_files,
        });
        Ok(())
    }
}

pub(crate) struct ToonDownloader {
    config: Config,
    fetcher: Arc<Fetcher>,
    title_id: u64,
}

impl ToonDownloader {
    pub(crate) fn new(config: Config, title_id: u64) -> anyhow::Result<Self> {
        let fetcher = Arc::new(Fetcher::new(&config)?);
        Ok(Self {
            config,
            fetcher,
            title_id,
        })
    }

    /// Run the whole pipeline to completion and write the viewer manifest.
    ///
    /// Item-level failures are logged through the error channel and never
    /// abort the run; the result carries the final counter values.
    pub(crate) fn run(&self) -> anyhow::Result<DownloadResult> {
        let (err_tx, err_rx) = unbounded::<anyhow::Error>();
        let err_logger = thread::spawn(move || {
            for err in err_rx.iter() {
                error!("{err:#}");
            }
        });

        let stats = Arc::new(Stats::default());
        let output_root = PathBuf::from(&self.config.output_dir);
        fs::create_dir_all(output_root.join(self.title_id.to_string())).with_context(|| {
            format!(
                "failed to make directory \"{}\"",
                output_root.join(self.title_id.to_string()).display()
            )
        })?;

        let meta = match metadata::fetch(&self.fetcher, &self.config.list_url_base, self.title_id)
        {
            Ok(meta) => meta,
            Err(err) => {
                warn!("metadata unavailable: {err:#}");
                metadata::Metadata {
                    id: self.title_id,
                    title: String::new(),
                    author: String::new(),
                    description: String::new(),
                    thumbnail_url: None,
                }
            }
        };
        info!(title_id = self.title_id, title = %meta.title, "starting download");

        // A failed series thumbnail is reported but does not fail the run.
        let thumbnail_file = match &meta.thumbnail_url {
            Some(url) => {
                match download_file(&self.fetcher, &output_root.join(self.title_id.to_string()), url)
                {
                    Ok(name) => format!("{}/{}", self.title_id, name),
                    Err(err) => {
                        let _ = err_tx.send(err);
                        String::new()
                    }
                }
            }
            None => String::new(),
        };

        let bar = spawn_reporter(Arc::clone(&stats), REPORT_INTERVAL);

        // Stage 1: adaptive list crawl.
        let loader = ListLoader::new(
            HttpPageSource::new(
                Arc::clone(&self.fetcher),
                &self.config.list_url_base,
                self.title_id,
            ),
            self.config.list_workers,
        );
        let (entry_rx, list_handles) = loader.start(err_tx.clone());

        // Stage 2: count discoveries and buffer them without ever blocking
        // the crawl behind the download pool.
        let (buf_in_tx, buf_in_rx) = unbounded();
        let (buf_out_tx, buf_out_rx) = bounded(0);
        let relay_handle = relay(buf_in_rx, buf_out_tx);
        let counter_handle = {
            let stats = Arc::clone(&stats);
            thread::spawn(move || {
                for entry in entry_rx.iter() {
                    stats.inc_discovered();
                    if buf_in_tx.send(entry).is_err() {
                        break;
                    }
                }
            })
        };

        // Stage 3: per-entry detail fetch and asset download.
        let (done_rx, pool_handles) = pool::run_pool(
            Arc::new(EntryWorker {
                fetcher: Arc::clone(&self.fetcher),
                output_root: output_root.clone(),
                title_id: self.title_id,
                asset_workers: self.config.asset_workers,
                err_tx: err_tx.clone(),
                stats: Arc::clone(&stats),
            }),
            self.config.entry_workers,
            buf_out_rx,
            err_tx.clone(),
        );

        // Stage 4: fan completed entries out to the manifest builder and the
        // completion log.
        let (manifest_tx, manifest_rx) = bounded(0);
        let (log_tx, log_rx) = bounded(0);
        let tee_handle = pool::tee(done_rx, manifest_tx, log_tx);
        let manifest_handle = thread::spawn(move || {
            manifest_rx
                .iter()
                .map(|done: DownloadedEntry| ViewerEntry {
                    number: done.number,
                    title: done.title,
                    path: done.dir,
                    thumbnail_file_name: done.thumbnail_file,
                    content_file_names: done.content_files,
                })
                .collect::<Vec<_>>()
        });
        let log_handle = thread::spawn(move || {
            for done in log_rx.iter() {
                info!(number = done.number, title = %done.title, "entry downloaded");
            }
        });

        for handle in list_handles
            .into_iter()
            .chain([counter_handle, relay_handle])
            .chain(pool_handles)
            .chain([tee_handle, log_handle])
        {
            handle
                .join()
                .map_err(|_| anyhow!("pipeline thread panicked"))?;
        }
        let manifest_entries = manifest_handle
            .join()
            .map_err(|_| anyhow!("manifest thread panicked"))?;

        let renderer = Renderer::new(&output_root);
        renderer.write_meta(ViewerInfo {
            id: meta.id,
            title: meta.title,
            author: meta.author,
            description: meta.description,
            thumbnail_file,
            entries: manifest_entries,
        })?;

        drop(err_tx);
        err_logger
            .join()
            .map_err(|_| anyhow!("error logger thread panicked"))?;
        bar.finish_and_clear();

        Ok(DownloadResult {
            discovered: stats.discovered(),
            completed: stats.completed(),
        })
    }
}
