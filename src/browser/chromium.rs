//! Headless Chromium driver
//!
//! Every request the page makes is paused through the DevTools Fetch domain
//! and released only after its host passes the safety check, so redirect
//! hops never reach a forbidden address.

use crate::browser::http::viewport_of;
use crate::browser::{check_response, scripts, BrowserDriver, BrowserError, Navigation, NavigationError};
use crate::config::BrowserSettings;
use crate::extract::snapshot::{DomSnapshot, Viewport};
use crate::governor::{check_target, HostResolver};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
    RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

/// Environment variable naming a Chromium executable
pub const CHROMIUM_PATH_ENV: &str = "TAPMAP_CHROMIUM_PATH";

const PATH_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Finds a Chromium executable
///
/// Looks at the configured path, then `TAPMAP_CHROMIUM_PATH`, then the
/// system `PATH`, then the usual macOS install location.
pub fn find_chromium(configured: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = configured.map(PathBuf::from) {
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("Configured chromium-path {} does not exist", path.display());
    }

    if let Ok(p) = std::env::var(CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in PATH_CANDIDATES {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    status: Option<u16>,
    #[serde(rename = "contentType")]
    content_type: Option<String>,
    title: Option<String>,
}

/// A document request the guard refused
#[derive(Debug, Clone)]
struct BlockedDocument {
    url: String,
    reason: String,
}

type BlockedSlot = Arc<Mutex<Option<BlockedDocument>>>;

fn take_blocked(slot: &BlockedSlot) -> Option<BlockedDocument> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take()
}

fn put_blocked(slot: &BlockedSlot, document: BlockedDocument) {
    *slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(document);
}

/// Pauses every request of `page` and lets through only safe targets
///
/// Refused document loads are left in `blocked` for `navigate` to report.
async fn spawn_request_guard(
    page: &Page,
    resolver: Arc<dyn HostResolver>,
    blocked: BlockedSlot,
) -> Result<JoinHandle<()>, BrowserError> {
    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| BrowserError::Protocol(e.to_string()))?;

    let intercept_all = EnableParams::builder()
        .pattern(
            RequestPattern::builder()
                .url_pattern("*")
                .request_stage(RequestStage::Request)
                .build(),
        )
        .build();
    page.execute(intercept_all)
        .await
        .map_err(|e| BrowserError::Protocol(e.to_string()))?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let refusal = match Url::parse(&event.request.url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {
                    check_target(&url, resolver.as_ref()).await.err()
                }
                _ => None,
            };

            let reply = match refusal {
                None => page
                    .execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                    .map(|_| ()),
                Some(target) => {
                    tracing::warn!("Blocked browser request to {}: {}", event.request.url, target);
                    if event.resource_type == ResourceType::Document {
                        put_blocked(
                            &blocked,
                            BlockedDocument {
                                url: event.request.url.clone(),
                                reason: target.to_string(),
                            },
                        );
                    }
                    page.execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
                }
            };

            if let Err(e) = reply {
                tracing::debug!("Could not release paused request: {}", e);
            }
        }
    }))
}

/// Page driver backed by a headless Chromium instance
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    guard: JoinHandle<()>,
    blocked: BlockedSlot,
    viewport: Viewport,
    loaded: Option<Url>,
}

impl ChromiumDriver {
    /// Launches Chromium and opens one blank tab
    ///
    /// # Arguments
    ///
    /// * `settings` - Executable path, viewport and user agent
    /// * `resolver` - Resolver for the safety check on every page request
    ///
    /// # Returns
    ///
    /// * `Ok(ChromiumDriver)` - Browser is running
    /// * `Err(BrowserError)` - No executable was found or launch failed
    pub async fn launch(settings: &BrowserSettings, resolver: Arc<dyn HostResolver>) -> Result<Self, BrowserError> {
        let chrome_path =
            find_chromium(settings.chromium_path.as_deref()).ok_or(BrowserError::ChromiumNotFound)?;

        tracing::info!("Launching Chromium from {}", chrome_path.display());

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(settings.viewport_width, settings.viewport_height)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg(format!("--user-agent={}", settings.user_agent))
            .build()
            .map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("DevTools handler event error: {}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;

        let blocked: BlockedSlot = Arc::new(Mutex::new(None));
        let guard = spawn_request_guard(&page, resolver, Arc::clone(&blocked)).await?;

        Ok(Self {
            browser,
            page,
            handler,
            guard,
            blocked,
            viewport: viewport_of(settings),
            loaded: None,
        })
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T, BrowserError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;

        result
            .into_value()
            .map_err(|e| BrowserError::Script(format!("unexpected script result: {}", e)))
    }

    fn loaded(&self) -> Result<&Url, BrowserError> {
        self.loaded.as_ref().ok_or(BrowserError::NoPage)
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<Navigation, NavigationError> {
        self.loaded = None;
        take_blocked(&self.blocked);
        let timeout_ms = timeout.as_millis() as u64;

        let result = tokio::time::timeout(timeout, self.page.goto(url.as_str())).await;

        if let Some(refused) = take_blocked(&self.blocked) {
            return Err(NavigationError::UnsafeRedirect {
                url: url.to_string(),
                target: refused.url,
                reason: refused.reason,
            });
        }

        match result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(NavigationError::Network {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(NavigationError::Timeout {
                    url: url.to_string(),
                    timeout_ms,
                })
            }
        }

        let final_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        let info: PageInfo = self
            .eval(scripts::PAGE_INFO)
            .await
            .map_err(|e| NavigationError::Capture {
                url: final_url.to_string(),
                source: e,
            })?;

        check_response(&final_url, info.status, info.content_type.as_deref())?;

        self.loaded = Some(final_url.clone());

        Ok(Navigation {
            final_url,
            status: info.status,
            content_type: info.content_type,
        })
    }

    async fn wait_for_load(&mut self, timeout: Duration) {
        if tokio::time::timeout(timeout, self.page.wait_for_navigation())
            .await
            .is_err()
        {
            tracing::debug!("Load wait expired after {:?}", timeout);
        }
    }

    async fn has_selector(&mut self, selector: &str) -> Result<bool, BrowserError> {
        self.loaded()?;
        self.eval(&scripts::has_selector(selector)).await
    }

    async fn click(&mut self, selector: &str) -> Result<bool, BrowserError> {
        self.loaded()?;
        let clicked: bool = self.eval(&scripts::click_visible(selector)).await?;
        if clicked {
            // give the banner's handlers a moment to tear it down
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Ok(clicked)
    }

    async fn title(&mut self) -> Result<Option<String>, BrowserError> {
        self.loaded()?;
        let info: PageInfo = self.eval(scripts::PAGE_INFO).await?;
        Ok(info
            .title
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty()))
    }

    async fn analytics(&mut self) -> Result<Vec<String>, BrowserError> {
        self.loaded()?;
        self.eval(scripts::DETECT_ANALYTICS).await
    }

    async fn snapshot(&mut self) -> Result<DomSnapshot, BrowserError> {
        let url = self.loaded()?.clone();
        let json: String = self.eval(scripts::CAPTURE_DOM).await?;
        let mut snapshot = DomSnapshot::from_capture_json(url, &json)?;
        if snapshot.viewport.height == 0 {
            snapshot.viewport = self.viewport;
        }
        Ok(snapshot)
    }

    async fn close(&mut self) {
        self.loaded = None;
        if let Err(e) = self.page.clone().close().await {
            tracing::debug!("Closing page failed: {}", e);
        }
        if let Err(e) = self.browser.close().await {
            tracing::debug!("Closing browser failed: {}", e);
        }
        self.guard.abort();
        self.handler.abort();
    }
}
