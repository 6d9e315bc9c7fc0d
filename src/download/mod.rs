//! The concurrent discovery-and-fetch pipeline.
//!
//! `relay` and `pool` are the generic plumbing (unbounded buffering, fan-out
//! workers, tee); `downloader` composes them with the catalog crawler into
//! the full list-crawl → buffer → detail-fetch → asset-download pipeline.

pub(crate) mod downloader;
pub(crate) mod pool;
pub(crate) mod progress;
pub(crate) mod relay;

pub(crate) use downloader::ToonDownloader;
