//! Browserless page driver
//!
//! Fetches pages with a plain GET and builds the DOM from the returned HTML.
//! There is no layout and no script execution: nodes carry no boxes and
//! clicks are never performed. Redirects are followed hop by hop, and each
//! hop must pass the safety check before it is requested.

use crate::browser::{check_response, BrowserDriver, BrowserError, Navigation, NavigationError};
use crate::config::BrowserSettings;
use crate::extract::snapshot::{collapse_whitespace, DomSnapshot, Viewport};
use crate::governor::{get_following_redirects, HostResolver, RedirectError, MAX_REDIRECTS};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Script markers of analytics products, checked against raw HTML
const ANALYTICS_MARKERS: &[(&str, &[&str])] = &[
    ("GTM", &["googletagmanager.com/gtm.js", "window.dataLayer", "datalayer.push"]),
    ("Adobe Launch", &["assets.adobedtm.com", "_satellite"]),
    ("Tealium", &["tags.tiqcdn.com", "utag.js"]),
    ("Segment", &["cdn.segment.com", "analytics.load("]),
    ("GA4", &["googletagmanager.com/gtag/js", "gtag("]),
    ("Adobe Analytics", &["appmeasurement.js", "s_code.js", ".sc.omtrdc.net"]),
    ("Hotjar", &["static.hotjar.com", "hotjar"]),
];

/// Builds the HTTP client shared by page fetches and robots.txt requests
///
/// The client does not follow redirects; callers go through
/// [`get_following_redirects`] so every hop is safety-checked.
///
/// # Arguments
///
/// * `settings` - Browser settings carrying the user agent and timeouts
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(settings: &BrowserSettings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_millis(settings.navigation_timeout_ms))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Analytics products referenced by a page's markup
///
/// # Returns
///
/// Product names in a fixed order, without duplicates
pub fn detect_static_analytics(html: &str) -> Vec<String> {
    let lower = html.to_ascii_lowercase();
    ANALYTICS_MARKERS
        .iter()
        .filter(|(_, markers)| markers.iter().any(|m| lower.contains(&m.to_ascii_lowercase())))
        .map(|(name, _)| name.to_string())
        .collect()
}

fn parse_selector(selector: &str) -> Result<Selector, BrowserError> {
    Selector::parse(selector).map_err(|e| BrowserError::Selector(format!("{}: {:?}", selector, e)))
}

fn document_has(html: &str, selector: &str) -> Result<bool, BrowserError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let found = document.select(&selector).next().is_some();
    Ok(found)
}

fn document_title(html: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let document = Html::parse_document(html);
    let title = document.select(&selector).next()?;
    let text = collapse_whitespace(&title.text().collect::<String>());
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

struct LoadedPage {
    url: Url,
    html: String,
}

/// Page driver backed by plain HTTP requests
pub struct HttpDriver {
    client: Client,
    resolver: Arc<dyn HostResolver>,
    viewport: Viewport,
    page: Option<LoadedPage>,
}

impl HttpDriver {
    /// Creates a driver with its own client
    ///
    /// # Arguments
    ///
    /// * `settings` - User agent, timeouts and viewport
    /// * `resolver` - Resolver for the safety check on redirect hops
    pub fn new(settings: &BrowserSettings, resolver: Arc<dyn HostResolver>) -> Result<Self, BrowserError> {
        let client = build_http_client(settings)?;
        Ok(Self::with_client(client, viewport_of(settings), resolver))
    }

    /// Creates a driver that shares an existing client
    ///
    /// The client must have redirects disabled.
    pub fn with_client(client: Client, viewport: Viewport, resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            client,
            resolver,
            viewport,
            page: None,
        }
    }

    fn loaded(&self) -> Result<&LoadedPage, BrowserError> {
        self.page.as_ref().ok_or(BrowserError::NoPage)
    }
}

pub(crate) fn viewport_of(settings: &BrowserSettings) -> Viewport {
    Viewport {
        width: settings.viewport_width,
        height: settings.viewport_height,
    }
}

fn network_error(url: &Url, timeout: Duration, e: RedirectError) -> NavigationError {
    match e {
        RedirectError::Request(e) if e.is_timeout() => NavigationError::Timeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        },
        RedirectError::Unsafe { to, target, .. } => NavigationError::UnsafeRedirect {
            url: url.to_string(),
            target: to,
            reason: target.to_string(),
        },
        other => NavigationError::Network {
            url: url.to_string(),
            reason: other.to_string(),
        },
    }
}

#[async_trait]
impl BrowserDriver for HttpDriver {
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<Navigation, NavigationError> {
        self.page = None;

        let request = async {
            let response =
                get_following_redirects(&self.client, self.resolver.as_ref(), url, MAX_REDIRECTS).await?;

            let final_url = response.url().clone();
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let body = if status < 400 {
                response.text().await?
            } else {
                String::new()
            };

            Ok::<_, RedirectError>((final_url, status, content_type, body))
        };

        let (final_url, status, content_type, body) = match tokio::time::timeout(timeout, request).await {
            Ok(Ok(parts)) => parts,
            Ok(Err(e)) => return Err(network_error(url, timeout, e)),
            Err(_) => {
                return Err(NavigationError::Timeout {
                    url: url.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };

        check_response(&final_url, Some(status), content_type.as_deref())?;

        self.page = Some(LoadedPage {
            url: final_url.clone(),
            html: body,
        });

        Ok(Navigation {
            final_url,
            status: Some(status),
            content_type,
        })
    }

    async fn wait_for_load(&mut self, _timeout: Duration) {}

    async fn has_selector(&mut self, selector: &str) -> Result<bool, BrowserError> {
        let page = self.loaded()?;
        document_has(&page.html, selector)
    }

    async fn click(&mut self, selector: &str) -> Result<bool, BrowserError> {
        parse_selector(selector)?;
        Ok(false)
    }

    async fn title(&mut self) -> Result<Option<String>, BrowserError> {
        let page = self.loaded()?;
        Ok(document_title(&page.html))
    }

    async fn analytics(&mut self) -> Result<Vec<String>, BrowserError> {
        let page = self.loaded()?;
        Ok(detect_static_analytics(&page.html))
    }

    async fn snapshot(&mut self) -> Result<DomSnapshot, BrowserError> {
        let page = self.loaded()?;
        Ok(DomSnapshot::from_html(page.url.clone(), &page.html, self.viewport))
    }

    async fn close(&mut self) {
        self.page = None;
    }
}
