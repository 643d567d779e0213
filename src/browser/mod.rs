//! Browser session layer
//!
//! A [`BrowserDriver`] loads pages and answers questions about the loaded
//! document. Two drivers exist:
//!
//! - [`ChromiumDriver`]: headless Chromium through the DevTools protocol
//! - [`HttpDriver`]: plain HTTP GET with the DOM built from static HTML
//!
//! The [`SessionRunner`] drives one page fetch on top of a driver:
//! navigation, load wait, consent handling, analytics detection and the DOM
//! snapshot.

mod chromium;
mod consent;
mod http;
mod scripts;
mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use chromium::{find_chromium, ChromiumDriver};
pub use consent::{handle_consent, ConsentSignature, CONSENT_FRAMEWORKS};
pub use http::{build_http_client, detect_static_analytics, HttpDriver};
pub use session::{PageFetch, SessionRunner, SessionSettings};

use crate::config::BrowserSettings;
use crate::extract::snapshot::DomSnapshot;
use crate::governor::HostResolver;
use crate::state::PageOutcome;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A page could not be loaded; aborts that page only
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("Navigation to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("{url} is not HTML ({content_type})")]
    NotHtml { url: String, content_type: String },

    #[error("Failed to load {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("{url} redirected to refused target {target}: {reason}")]
    UnsafeRedirect {
        url: String,
        target: String,
        reason: String,
    },

    #[error("Failed to capture {url}: {source}")]
    Capture {
        url: String,
        #[source]
        source: BrowserError,
    },
}

impl NavigationError {
    /// How the failed fetch is recorded on its page visit
    pub fn outcome(&self) -> PageOutcome {
        match self {
            Self::HttpStatus { .. } => PageOutcome::HttpError,
            Self::NotHtml { .. } => PageOutcome::NotHtml,
            Self::UnsafeRedirect { .. } => PageOutcome::UnsafeRedirect,
            _ => PageOutcome::NavigationFailed,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Problems with the browser itself rather than a page
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Chromium executable not found")]
    ChromiumNotFound,

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("DevTools protocol error: {0}")]
    Protocol(String),

    #[error("Page script failed: {0}")]
    Script(String),

    #[error("No page is loaded")]
    NoPage,

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] crate::extract::ExtractionError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Where a navigation ended up
#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    /// URL after redirects
    pub final_url: Url,
    /// Response status, when the driver can observe it
    pub status: Option<u16>,
    pub content_type: Option<String>,
}

/// Checks a response's status and content type
///
/// # Returns
///
/// * `Ok(())` - Status below 400 and HTML (or unknown) content
/// * `Err(NavigationError)` - An error status or a known non-HTML type
pub fn check_response(url: &Url, status: Option<u16>, content_type: Option<&str>) -> Result<(), NavigationError> {
    if let Some(status) = status.filter(|&s| s >= 400) {
        return Err(NavigationError::HttpStatus {
            url: url.to_string(),
            status,
        });
    }

    if let Some(ct) = content_type.map(str::trim).filter(|ct| !ct.is_empty()) {
        let lower = ct.to_ascii_lowercase();
        if !lower.contains("html") {
            return Err(NavigationError::NotHtml {
                url: url.to_string(),
                content_type: ct.to_string(),
            });
        }
    }

    Ok(())
}

/// A browser-like page loader
///
/// One driver holds one loaded page at a time. Page queries refer to the
/// page of the last successful `navigate`.
#[async_trait]
pub trait BrowserDriver: Send {
    /// Loads `url`, following redirects, within `timeout`
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<Navigation, NavigationError>;

    /// Waits for the page to finish loading; expiry is not an error
    async fn wait_for_load(&mut self, timeout: Duration);

    /// Whether any element of the loaded page matches `selector`
    async fn has_selector(&mut self, selector: &str) -> Result<bool, BrowserError>;

    /// Clicks the first visible element matching `selector`
    ///
    /// # Returns
    ///
    /// `Ok(true)` when something was clicked
    async fn click(&mut self, selector: &str) -> Result<bool, BrowserError>;

    async fn title(&mut self) -> Result<Option<String>, BrowserError>;

    /// Analytics and tag-management products present on the page
    async fn analytics(&mut self) -> Result<Vec<String>, BrowserError>;

    /// Captures the loaded page
    async fn snapshot(&mut self) -> Result<DomSnapshot, BrowserError>;

    /// Releases browser resources
    async fn close(&mut self);
}

/// Creates the driver selected by the browser settings
///
/// Both drivers check every redirect hop against `resolver` before the hop
/// is loaded.
///
/// # Returns
///
/// * `Ok(Box<dyn BrowserDriver>)` - An `HttpDriver` when `static-html` is
///   set, otherwise a launched `ChromiumDriver`
/// * `Err(BrowserError)` - Chromium could not be found or launched
pub async fn launch_driver(
    settings: &BrowserSettings,
    resolver: Arc<dyn HostResolver>,
) -> Result<Box<dyn BrowserDriver>, BrowserError> {
    if settings.static_html {
        tracing::info!("Using static HTML driver");
        return Ok(Box::new(HttpDriver::new(settings, resolver)?));
    }

    let driver = ChromiumDriver::launch(settings, resolver).await?;
    Ok(Box::new(driver))
}
