//! Series metadata from the first list page.

use anyhow::Context;
use scraper::{Html, Selector};
use url::Url;

use crate::fetcher::Fetcher;

#[derive(Debug, Clone)]
pub(crate) struct Metadata {
    pub id: u64,
    pub title: String,
    pub author: String,
    pub description: String,
    pub thumbnail_url: Option<Url>,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid static selector")
}

pub(crate) fn fetch(
    fetcher: &Fetcher,
    list_url_base: &str,
    title_id: u64,
) -> anyhow::Result<Metadata> {
    let raw = format!(
        "{}/webtoon/list.nhn?titleId={}",
        list_url_base.trim_end_matches('/'),
        title_id
    );
    let url = Url::parse(&raw).with_context(|| format!("invalid list url \"{raw}\""))?;
    let resp = fetcher
        .get(url.as_str())
        .with_context(|| format!("failed to get metadata from \"{url}\""))?;
    let body = resp
        .text()
        .with_context(|| format!("failed to read body from \"{url}\""))?;
    Ok(parse_metadata(&body, &url, title_id))
}

fn parse_metadata(html: &str, base_url: &Url, title_id: u64) -> Metadata {
    let doc = Html::parse_document(html);

    let info = doc.select(&selector(".comicinfo")).next();

    let thumbnail_url = info
        .and_then(|el| el.select(&selector(".thumb img[src*='thumb']")).next())
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| base_url.join(src).ok());

    let detail = info.and_then(|el| el.select(&selector(".detail")).next());

    // The series title is the h2's own text, not the author span nested in it.
    let title = detail
        .and_then(|el| el.select(&selector("h2")).next())
        .map(|h2| {
            let mut title = String::new();
            for node in h2.children() {
                if let Some(text) = node.value().as_text() {
                    title.push_str(&text.text);
                }
            }
            title
        })
        .unwrap_or_default()
        .trim()
        .to_string();

    let author = detail
        .and_then(|el| el.select(&selector(".wrt_nm")).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let description = detail
        .and_then(|el| el.select(&selector("p:not(.detail_info)")).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    Metadata {
        id: title_id,
        title,
        author,
        description,
        thumbnail_url,
    }
}
