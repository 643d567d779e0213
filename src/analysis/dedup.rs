//! Cross-page element deduplication
//!
//! Headers, footers and shared navigation repeat on every page of a site.
//! Grouping elements by fingerprint collapses those repeats into one entry
//! that lists every page the element appeared on.

use crate::storage::ElementRecord;
use serde::Serialize;
use std::collections::HashMap;

/// Elements sharing one fingerprint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DedupGroup {
    pub fingerprint: String,
    /// First occurrence in extraction order
    pub representative: ElementRecord,
    pub page_count: usize,
    /// Distinct pages in first-seen order
    pub page_urls: Vec<String>,
}

impl DedupGroup {
    fn new(record: &ElementRecord) -> Self {
        Self {
            fingerprint: record.fingerprint.clone(),
            representative: record.clone(),
            page_count: 1,
            page_urls: vec![record.page_url.clone()],
        }
    }

    fn add_page(&mut self, page_url: &str) {
        if !self.page_urls.iter().any(|url| url == page_url) {
            self.page_urls.push(page_url.to_string());
            self.page_count = self.page_urls.len();
        }
    }
}

/// Groups elements by fingerprint
///
/// Groups come out in the order their fingerprint was first seen.
///
/// # Arguments
///
/// * `elements` - Element records in extraction order
///
/// # Returns
///
/// One group per distinct fingerprint
pub fn dedup(elements: &[ElementRecord]) -> Vec<DedupGroup> {
    let mut groups: Vec<DedupGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for element in elements {
        match index.get(element.fingerprint.as_str()) {
            Some(&pos) => groups[pos].add_page(&element.page_url),
            None => {
                index.insert(&element.fingerprint, groups.len());
                groups.push(DedupGroup::new(element));
            }
        }
    }

    groups
}

/// Merges groups that share a fingerprint
///
/// Regrouping the output of [`dedup`] returns it unchanged.
pub fn regroup(groups: &[DedupGroup]) -> Vec<DedupGroup> {
    let mut merged: Vec<DedupGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for group in groups {
        match index.get(group.fingerprint.as_str()) {
            Some(&pos) => {
                for url in &group.page_urls {
                    merged[pos].add_page(url);
                }
            }
            None => {
                index.insert(&group.fingerprint, merged.len());
                merged.push(group.clone());
            }
        }
    }

    merged
}
