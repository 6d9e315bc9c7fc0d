//! Episode detail-page extraction: the ordered content image URLs.

use anyhow::Context;
use scraper::{Html, Selector};
use url::Url;

use crate::fetcher::Fetcher;

/// Fetch an episode's detail page and return its content image URLs in
/// viewer order, resolved absolute.
pub(crate) fn asset_urls(fetcher: &Fetcher, detail_url: &Url) -> anyhow::Result<Vec<Url>> {
    let resp = fetcher.get(detail_url.as_str())?;
    let body = resp
        .text()
        .with_context(|| format!("failed to read body from \"{detail_url}\""))?;
    Ok(parse_asset_urls(&body, detail_url))
}

fn parse_asset_urls(html: &str, base_url: &Url) -> Vec<Url> {
    let sel = Selector::parse(".wt_viewer img[id^='content_image_']")
        .expect("valid static selector");
    Html::parse_document(html)
        .select(&sel)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| base_url.join(src).ok())
        .collect()
}
