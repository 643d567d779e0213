//! Politeness governor
//!
//! Decides whether a URL may be fetched and paces fetches that are allowed:
//!
//! - Deadline: the scan's wall-clock budget
//! - Safety: resolved host addresses must be publicly routable, on every
//!   redirect hop as well
//! - Robots: robots.txt rules for the configured user agent
//! - Rate: per-domain token buckets with a hard 0.5 req/s floor
//!
//! One governor belongs to one scan; buckets and robots rules are never
//! shared between scans.

mod deadline;
mod rate;
mod redirect;
mod safety;

pub use deadline::Deadline;
pub use rate::{effective_rate, RateLimiter, TokenBucket, HARD_RATE_FLOOR};
pub use redirect::{get_following_redirects, RedirectError, MAX_REDIRECTS};
pub use safety::{
    check_target, forbidden_range, HostResolver, StaticResolver, SystemResolver, UnsafeTarget,
};

use crate::robots::{fetch_robots, product_token, CachedRobots, RobotsCache};
use crate::url::site_key;
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Why the governor refused a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// robots.txt disallows the path for our user agent
    RobotsDisallowed,
    /// The host is unsafe to contact
    UnsafeTarget(String),
    /// The scan's time budget is spent; halts the scan
    DeadlineExceeded,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RobotsDisallowed => write!(f, "disallowed by robots.txt"),
            Self::UnsafeTarget(reason) => write!(f, "{}", reason),
            Self::DeadlineExceeded => write!(f, "scan deadline exceeded"),
        }
    }
}

/// Result of asking the governor about a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny(DenyReason),
}

/// Settings for one scan's governor
#[derive(Debug, Clone)]
pub struct GovernorSettings {
    /// Requested rate in req/s, before clamping
    pub rate_limit: f64,
    pub rate_floor: f64,
    pub rate_ceiling: f64,
    /// Wall-clock budget of the scan
    pub timeout: Duration,
    /// Full user agent string; robots.txt is matched on its product token
    pub user_agent: String,
}

/// Admission control and pacing for one scan
pub struct Governor {
    limiter: RateLimiter,
    deadline: Deadline,
    resolver: Arc<dyn HostResolver>,
    client: Client,
    robots: RobotsCache,
    agent_token: String,
}

impl Governor {
    /// Creates a governor; the deadline clock starts now
    ///
    /// # Arguments
    ///
    /// * `settings` - Rate, timeout and user agent for this scan
    /// * `client` - HTTP client used for robots.txt requests
    /// * `resolver` - Host resolver used by the safety check
    pub fn new(settings: GovernorSettings, client: Client, resolver: Arc<dyn HostResolver>) -> Self {
        let rate = effective_rate(
            settings.rate_limit,
            settings.rate_floor,
            settings.rate_ceiling,
        );

        tracing::debug!(
            "Governor rate {:.2} req/s (requested {:.2}), timeout {:?}",
            rate,
            settings.rate_limit,
            settings.timeout
        );

        Self {
            limiter: RateLimiter::new(rate),
            deadline: Deadline::new(settings.timeout),
            resolver,
            client,
            robots: RobotsCache::new(),
            agent_token: product_token(&settings.user_agent).to_string(),
        }
    }

    /// The enforced request rate
    pub fn rate(&self) -> f64 {
        self.limiter.rate()
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    /// Decides whether `url` may be fetched
    ///
    /// Checks run in order: deadline, safety, robots. robots.txt is only
    /// requested from hosts that passed the safety check.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL about to be fetched
    ///
    /// # Returns
    ///
    /// `Admission::Allow`, or `Admission::Deny` with the first failing check
    pub async fn admit(&mut self, url: &Url) -> Admission {
        if self.deadline.is_exceeded() {
            return Admission::Deny(DenyReason::DeadlineExceeded);
        }

        if let Err(unsafe_target) = self.check_safety(url).await {
            tracing::warn!("Refusing {}: {}", url, unsafe_target);
            return Admission::Deny(DenyReason::UnsafeTarget(unsafe_target.to_string()));
        }

        if !self.robots_allows(url).await {
            tracing::debug!("robots.txt disallows {}", url);
            return Admission::Deny(DenyReason::RobotsDisallowed);
        }

        Admission::Allow
    }

    /// Checks that `url` resolves only to public addresses
    pub async fn check_safety(&self, url: &Url) -> Result<(), UnsafeTarget> {
        check_target(url, self.resolver.as_ref()).await
    }

    /// Waits for the next permitted request slot on `domain`
    pub async fn throttle(&mut self, domain: &str) {
        self.limiter.throttle(domain).await;
    }

    /// Whether the site serving `url` had a robots.txt, if it has been fetched
    pub fn robots_found(&self, url: &Url) -> Option<bool> {
        let site = site_key(url)?;
        self.robots.get(&site).map(|cached| cached.found)
    }

    async fn robots_allows(&mut self, url: &Url) -> bool {
        let Some(site) = site_key(url) else {
            return false;
        };

        if self.robots.get(&site).is_none() {
            let lookup = fetch_robots(&self.client, self.resolver.as_ref(), url).await;
            let cached = CachedRobots::new(lookup.robots, lookup.found);

            if let Some(delay) = cached.crawl_delay(&self.agent_token) {
                tracing::debug!(
                    "{} requests a crawl delay of {}s; pacing stays at {:.2} req/s",
                    site,
                    delay,
                    self.limiter.rate()
                );
            }

            tracing::debug!("Cached robots.txt for {} (found: {})", site, cached.found);
            self.robots.insert(&site, cached);
        }

        self.robots
            .get(&site)
            .map(|cached| cached.is_allowed(url.as_str(), &self.agent_token))
            .unwrap_or(true)
    }
}
