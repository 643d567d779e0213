//! Per-scan robots.txt cache
//!
//! robots.txt is fetched at most once per site for the lifetime of a scan.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Cached robots.txt data for a site
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub content: ParsedRobots,

    /// Whether the site actually served a robots.txt
    pub found: bool,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Creates a new CachedRobots instance stamped with the current time
    pub fn new(content: ParsedRobots, found: bool) -> Self {
        Self {
            content,
            found,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if a URL is allowed according to the cached robots.txt
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to check
    /// * `user_agent` - The product token
    ///
    /// # Returns
    ///
    /// * `true` - If the URL is allowed
    /// * `false` - If the URL is disallowed
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        self.content.is_allowed(url, user_agent)
    }

    /// Gets the crawl delay from the cached robots.txt
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        self.content.crawl_delay(user_agent)
    }
}

/// Cached robots.txt entries keyed by site (`host[:port]`)
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: HashMap<String, CachedRobots>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, site: &str) -> Option<&CachedRobots> {
        self.entries.get(site)
    }

    pub fn insert(&mut self, site: &str, robots: CachedRobots) {
        self.entries.insert(site.to_string(), robots);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
