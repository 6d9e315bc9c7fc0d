//! List-page HTML extraction: episode rows and the paginator.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::trace;
use url::Url;

use super::list::{Entry, ListPage};

static EPISODE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]no=(\d+)").expect("valid episode number pattern"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid static selector")
}

/// Extract entries and paginator state from one list page document.
///
/// Rows without a usable thumbnail, detail link or episode number are
/// skipped; extraction is best-effort, never an error.
pub(crate) fn parse_list_page(html: &str, base_url: &Url, source_page: u32) -> ListPage {
    let doc = Html::parse_document(html);
    let entries = parse_entries(&doc, base_url);
    let (other_pages, current_page) = parse_paginator(&doc, source_page);
    ListPage {
        entries,
        other_pages,
        current_page,
    }
}

fn parse_entries(doc: &Html, base_url: &Url) -> Vec<Entry> {
    let row_sel = selector(".viewList li");
    let thumb_sel = selector("img[src*='thumb']");
    let title_sel = selector(".title a[href*='detail']");

    let mut entries = Vec::new();
    for row in doc.select(&row_sel) {
        let Some(thumb_path) = row
            .select(&thumb_sel)
            .next()
            .and_then(|img| img.value().attr("src"))
        else {
            continue;
        };
        let Some(title_link) = row.select(&title_sel).next() else {
            continue;
        };
        let Some(detail_path) = title_link.value().attr("href") else {
            continue;
        };
        let Some(number) = EPISODE_NUMBER
            .captures(detail_path)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            trace!(detail_path, "no episode number in detail link, skipping row");
            continue;
        };
        let (Ok(thumbnail_url), Ok(detail_url)) =
            (base_url.join(thumb_path), base_url.join(detail_path))
        else {
            continue;
        };

        entries.push(Entry {
            number,
            title: title_link.text().collect::<String>().trim().to_string(),
            thumbnail_url,
            detail_url,
        });
    }
    entries
}

fn parse_paginator(doc: &Html, source_page: u32) -> (Vec<u32>, Option<u32>) {
    let other_sel = selector(".paginate a.page .num_page");
    let current_sel = selector(".paginate .page:not(a) .num_page");

    let other_pages = doc
        .select(&other_sel)
        .filter_map(|el| el.text().collect::<String>().trim().parse::<u32>().ok())
        .filter(|&page| page != source_page)
        .collect();

    let current_page = doc
        .select(&current_sel)
        .next()
        .and_then(|el| el.text().collect::<String>().trim().parse::<u32>().ok());

    (other_pages, current_page)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_html(rows: &str, paginator: &str) -> String {
        format!(
            "<html><body>\
             <ul class=\"viewList\">{rows}</ul>\
             <div class=\"paginate\">{paginator}</div>\
             </body></html>"
        )
    }

    fn row(number: u32, title: &str) -> String {
        format!(
            "<li><img src=\"/thumb/{number}.jpg\">\
             <span class=\"title\"><a href=\"/webtoon/detail.nhn?titleId=42&no={number}\">{title}</a></span></li>"
        )
    }

    fn base() -> Url {
        Url::parse("https://comic.example.com/webtoon/list.nhn?titleId=42&page=1").unwrap()
    }

    #[test]
    fn extracts_entries_with_resolved_urls() {
        let rows = format!("{}{}", row(3, "Episode 3"), row(4, "Episode 4"));
        let paginator = "<span class=\"page\"><span class=\"num_page\">1</span></span>";
        let page = parse_list_page(&list_html(&rows, paginator), &base(), 1);

        assert_eq!(page.entries.len(), 2);
        let first = &page.entries[0];
        assert_eq!(first.number, 3);
        assert_eq!(first.title, "Episode 3");
        assert_eq!(
            first.thumbnail_url.as_str(),
            "https://comic.example.com/thumb/3.jpg"
        );
        assert_eq!(
            first.detail_url.as_str(),
            "https://comic.example.com/webtoon/detail.nhn?titleId=42&no=3"
        );
        assert_eq!(page.current_page, Some(1));
    }

    #[test]
    fn skips_rows_without_detail_link_or_number() {
        let rows = format!(
            "<li><img src=\"/thumb/x.jpg\"></li>\
             <li><img src=\"/thumb/y.jpg\">\
             <span class=\"title\"><a href=\"/webtoon/detail.nhn?titleId=42\">No number</a></span></li>\
             {}",
            row(7, "Kept")
        );
        let page = parse_list_page(&list_html(&rows, ""), &base(), 1);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].number, 7);
    }

    #[test]
    fn paginator_splits_current_from_other_pages() {
        let paginator = "\
            <a class=\"page\" href=\"?page=1\"><span class=\"num_page\">1</span></a>\
            <span class=\"page\"><span class=\"num_page\">2</span></span>\
            <a class=\"page\" href=\"?page=3\"><span class=\"num_page\">3</span></a>\
            <a class=\"page\" href=\"?page=4\"><span class=\"num_page\">4</span></a>";
        let page = parse_list_page(&list_html("", paginator), &base(), 2);

        assert_eq!(page.other_pages, vec![1, 3, 4]);
        assert_eq!(page.current_page, Some(2));
    }

    #[test]
    fn missing_paginator_yields_no_current_page() {
        let page = parse_list_page(&list_html(&row(1, "Only"), ""), &base(), 1);
        assert_eq!(page.current_page, None);
        assert!(page.other_pages.is_empty());
    }
}
