//! Adaptive pagination crawler.
//!
//! One seeking thread discovers the true extent of the list while walking it:
//! it fetches a page, forwards every strictly-later page reference onto the
//! frontier, and jumps past the highest page seen so far. The frontier runs
//! through the unbounded relay so the seeker is never blocked by the fixed
//! worker pool draining it. Once no page claims a successor past the current
//! maximum (or the source clamps a request to its last page), seeking ends
//! and the seeker demotes itself to a plain page worker.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use tracing::{debug, info};
use url::Url;

use super::parse;
use crate::download::pool::{self, Worker};
use crate::download::relay::relay;
use crate::fetcher::Fetcher;

/// One catalog item, immutable once parsed from a list page.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    /// Episode number assigned by the source; unique but not necessarily
    /// contiguous.
    pub number: u32,
    pub title: String,
    pub thumbnail_url: Url,
    pub detail_url: Url,
}

/// One fetched-and-parsed list page.
#[derive(Debug, Clone)]
pub(crate) struct ListPage {
    pub entries: Vec<Entry>,
    /// Page numbers the paginator references besides the requested one.
    pub other_pages: Vec<u32>,
    /// The page number the document claims to be. A mismatch with the
    /// requested page means the source clamped past its end.
    pub current_page: Option<u32>,
}

/// Site-specific page access, seam for the crawler.
pub(crate) trait PageSource: Send + Sync + 'static {
    fn load_page(&self, page: u32) -> anyhow::Result<ListPage>;
}

pub(crate) struct HttpPageSource {
    fetcher: Arc<Fetcher>,
    list_url_base: String,
    title_id: u64,
}

impl HttpPageSource {
    pub(crate) fn new(fetcher: Arc<Fetcher>, list_url_base: &str, title_id: u64) -> Self {
        Self {
            fetcher,
            list_url_base: list_url_base.trim_end_matches('/').to_string(),
            title_id,
        }
    }

    fn page_url(&self, page: u32) -> anyhow::Result<Url> {
        let raw = format!(
            "{}/webtoon/list.nhn?titleId={}&page={}",
            self.list_url_base, self.title_id, page
        );
        Url::parse(&raw).with_context(|| format!("invalid list url \"{raw}\""))
    }
}

impl PageSource for HttpPageSource {
    fn load_page(&self, page: u32) -> anyhow::Result<ListPage> {
        let url = self.page_url(page)?;
        let resp = self.fetcher.get(url.as_str())?;
        let body = resp
            .text()
            .with_context(|| format!("failed to read body from \"{url}\""))?;
        Ok(parse::parse_list_page(&body, &url, page))
    }
}

/// Fetches one frontier page and forwards its entries downstream.
struct PageWorker<S> {
    source: Arc<S>,
}

impl<S: PageSource> Worker for PageWorker<S> {
    type Item = u32;
    type Output = Entry;

    fn process(&self, page: u32, out: &Sender<Entry>) -> anyhow::Result<()> {
        let doc = self.source.load_page(page)?;
        for entry in doc.entries {
            if out.send(entry).is_err() {
                break;
            }
        }
        Ok(())
    }
}

pub(crate) struct ListLoader<S> {
    source: Arc<S>,
    parallelism: usize,
}

impl<S: PageSource> ListLoader<S> {
    pub(crate) fn new(source: S, parallelism: usize) -> Self {
        Self {
            source: Arc::new(source),
            parallelism: parallelism.max(1),
        }
    }

    /// Start the crawl. Entries arrive on the returned channel in no
    /// particular order across workers; the channel closes once every page
    /// has been processed. Page-level failures go to `err_tx`.
    pub(crate) fn start(
        &self,
        err_tx: Sender<anyhow::Error>,
    ) -> (Receiver<Entry>, Vec<JoinHandle<()>>) {
        let (frontier_tx, frontier_rx) = unbounded();
        let (page_tx, page_rx) = bounded(0);
        let (entry_tx, entry_rx) = bounded(0);

        let mut handles = Vec::with_capacity(self.parallelism + 1);
        handles.push(relay(frontier_rx, page_tx));
        handles.extend(pool::spawn_workers(
            Arc::new(PageWorker {
                source: Arc::clone(&self.source),
            }),
            self.parallelism - 1,
            page_rx.clone(),
            entry_tx.clone(),
            err_tx.clone(),
        ));

        let source = Arc::clone(&self.source);
        handles.push(thread::spawn(move || {
            seek_pages(source.as_ref(), &frontier_tx, &entry_tx, &err_tx);
            drop(frontier_tx);
            // Seeking is over; contribute this thread to draining the
            // remaining frontier like any other worker.
            let worker = PageWorker { source };
            pool::worker_loop(&worker, &page_rx, &entry_tx, &err_tx);
        }));

        (entry_rx, handles)
    }
}

/// The seeking phase. Walks forward from page 1 until no page references a
/// successor beyond the known maximum. On a fetch or parse error, discovery
/// stops where it is; already-queued frontier pages are still drained.
fn seek_pages<S: PageSource>(
    source: &S,
    frontier: &Sender<u32>,
    entries: &Sender<Entry>,
    err_tx: &Sender<anyhow::Error>,
) {
    let mut current: u32 = 1;
    loop {
        let doc = match source.load_page(current) {
            Ok(doc) => doc,
            Err(err) => {
                let _ = err_tx.send(err);
                return;
            }
        };
        if doc.current_page != Some(current) {
            // The source silently clamps requests past its last page.
            debug!(
                requested = current,
                reported = ?doc.current_page,
                "past the end of the list, seeking done"
            );
            return;
        }

        for entry in doc.entries {
            if entries.send(entry).is_err() {
                return;
            }
        }

        // Duplicate references across source pages are not de-duplicated;
        // downstream tolerates a page fetched twice.
        let mut max_page = current;
        for page in doc.other_pages {
            if page > current && frontier.send(page).is_err() {
                return;
            }
            if page > max_page {
                max_page = page;
            }
        }

        if max_page == current {
            info!(last_page = current, "no further pages referenced, seeking done");
            return;
        }
        current = max_page + 1;
    }
}
