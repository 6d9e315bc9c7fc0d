//! Catalog discovery: list pages, the adaptive pagination crawler, episode
//! detail pages and series metadata.

pub(crate) mod detail;
pub(crate) mod list;
pub(crate) mod metadata;
mod parse;

pub(crate) use list::{Entry, HttpPageSource, ListLoader};
