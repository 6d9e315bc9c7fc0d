//! Resilient HTTP fetch primitives.
//!
//! Every request made by the crawler and the asset downloaders goes through
//! [`Fetcher`], which owns the shared client (with the fixed User-Agent) and
//! applies bounded retries with full-jitter exponential backoff. Streamed
//! downloads additionally support seek-and-resume on recoverable transport
//! failures.

pub(crate) mod errors;
mod get;

pub(crate) use get::Fetcher;
