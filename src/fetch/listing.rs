// src/fetch/listing.rs
use anyhow::{anyhow, Context, Result};
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

use super::http;

/// File names linked from an HTML directory index whose target ends in `.{extension}`.
///
/// Links are resolved against `page_url`; only the last path segment is kept. `Ok(None)` when
/// the index did not answer in time.
pub fn linked_files(page_url: &str, extension: &str, timeout: Duration) -> Result<Option<Vec<String>>> {
    let Some(html) = http::get_text(page_url, timeout)? else {
        return Ok(None);
    };
    let base = Url::parse(page_url).with_context(|| format!("parsing listing URL {page_url}"))?;
    extract_links(&html, &base, extension).map(Some)
}

fn extract_links(html: &str, base: &Url, extension: &str) -> Result<Vec<String>> {
    let selector = Selector::parse(&format!(r#"a[href$=".{extension}"]"#))
        .map_err(|e| anyhow!("invalid link selector for .{extension}: {e:?}"))?;

    let mut names = Html::parse_document(html)
        .select(&selector)
        .filter_map(|elem| elem.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .filter_map(|u| {
            u.path_segments()
                .and_then(|mut segs| segs.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>();
    names.sort();
    names.dedup();
    Ok(names)
}
