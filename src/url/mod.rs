//! URL handling module for TapMap
//!
//! This module provides URL normalization, domain extraction, same-site checks
//! and the crawlability filter applied to discovered links.

mod domain;
mod normalize;

use ::url::Url;

// Re-export main functions
pub use domain::{extract_domain, is_external, is_same_site, site_key};
pub use normalize::{normalize_parsed, normalize_url};

/// File extensions that are never navigated to by the crawler
const SKIP_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "mp4", "mp3", "wav", "avi", "mov",
    "zip", "tar", "gz", "rar", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "csv", "css", "js",
    "json", "xml",
];

/// File extensions that mark a link as a document download
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip", "csv",
];

/// Returns the lowercase extension of the last path segment, if any
fn path_extension(url: &Url) -> Option<String> {
    let last = url.path_segments()?.last()?;
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Checks whether a URL should be placed on the frontier
///
/// Only http(s) pages are crawlable; links to media, archives, office
/// documents and static assets are skipped.
///
/// # Arguments
///
/// * `url` - The absolute URL to check
///
/// # Returns
///
/// * `true` - If the crawler may navigate to the URL
/// * `false` - If the URL has a non-web scheme or a skipped extension
pub fn is_crawlable(url: &Url) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }

    match path_extension(url) {
        Some(ext) => !SKIP_EXTENSIONS.contains(&ext.as_str()),
        None => true,
    }
}

/// Checks whether a URL points at a downloadable document
pub fn is_document_url(url: &Url) -> bool {
    path_extension(url).map_or(false, |ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()))
}
