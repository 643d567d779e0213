//! Link discovery on captured pages

use crate::extract::snapshot::DomSnapshot;
use crate::url::{is_crawlable, is_same_site, normalize_parsed};
use std::collections::HashSet;
use url::Url;

/// Resolves a link href to a normalized absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: and data: schemes
/// - fragment-only links (same page anchors)
/// - invalid URLs
/// - non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    normalize_parsed(absolute).ok()
}

/// All distinct `a[href]` targets of a page, in document order
///
/// Hidden anchors are included: they are part of the site's link graph
/// even when not rendered.
pub fn extract_links(snapshot: &DomSnapshot) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for node in snapshot.nodes() {
        if node.tag != "a" {
            continue;
        }
        let Some(href) = node.attr("href") else {
            continue;
        };
        if let Some(url) = resolve_link(href, &snapshot.url) {
            if seen.insert(url.as_str().to_string()) {
                links.push(url);
            }
        }
    }

    links
}

/// Links the crawler may follow from a scan rooted at `seed`
///
/// Same site as the seed and not a media, archive, document or asset URL.
pub fn crawlable_links(snapshot: &DomSnapshot, seed: &Url) -> Vec<Url> {
    extract_links(snapshot)
        .into_iter()
        .filter(|link| is_same_site(link, seed) && is_crawlable(link))
        .collect()
}
