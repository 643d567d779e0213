//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching
//! robots.txt files.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::{product_token, ParsedRobots};

use crate::governor::{get_following_redirects, HostResolver, MAX_REDIRECTS};
use reqwest::{Client, StatusCode};
use url::Url;

/// Outcome of a robots.txt fetch
#[derive(Debug, Clone)]
pub struct RobotsLookup {
    pub robots: ParsedRobots,
    /// Whether the site served a robots.txt (HTTP 200)
    pub found: bool,
}

impl RobotsLookup {
    fn missing() -> Self {
        Self {
            robots: ParsedRobots::allow_all(),
            found: false,
        }
    }
}

/// Builds the robots.txt URL for the site serving `url`
pub fn robots_url(url: &Url) -> Url {
    let mut robots = url.clone();
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    let _ = robots.set_username("");
    let _ = robots.set_password(None);
    robots
}

/// Fetches robots.txt for the site serving `url`
///
/// Only a 200 response is parsed. Any other status, a network error, or a
/// redirect to an unsafe host means the site is treated as allowing
/// everything.
///
/// # Arguments
///
/// * `client` - HTTP client carrying the crawler's user agent, with
///   redirects disabled
/// * `resolver` - Resolver for the safety check on redirect hops
/// * `url` - Any URL on the site
///
/// # Returns
///
/// The parsed rules and whether a robots.txt was found
pub async fn fetch_robots(client: &Client, resolver: &dyn HostResolver, url: &Url) -> RobotsLookup {
    let target = robots_url(url);

    let response = match get_following_redirects(client, resolver, &target, MAX_REDIRECTS).await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("robots.txt fetch failed for {}: {}", target, e);
            return RobotsLookup::missing();
        }
    };

    if response.status() != StatusCode::OK {
        tracing::debug!(
            "robots.txt for {} returned {}; allowing all",
            target,
            response.status()
        );
        return RobotsLookup::missing();
    }

    match response.text().await {
        Ok(body) => RobotsLookup {
            robots: ParsedRobots::from_content(&body),
            found: true,
        },
        Err(e) => {
            tracing::debug!("robots.txt body unreadable for {}: {}", target, e);
            RobotsLookup::missing()
        }
    }
}
