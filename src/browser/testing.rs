//! In-memory driver for unit tests

use crate::browser::{check_response, BrowserDriver, BrowserError, Navigation, NavigationError};
use crate::extract::snapshot::{DomSnapshot, Viewport};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

/// Serves one fixed HTML document for every URL
pub struct FakeDriver {
    pub html: String,
    pub status: u16,
    /// Whether clicks on matching selectors succeed
    pub clickable: bool,
    /// Selectors that were clicked successfully
    pub clicks: Vec<String>,
    pub analytics: Vec<String>,
    loaded: Option<Url>,
}

impl FakeDriver {
    pub fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
            status: 200,
            clickable: false,
            clicks: Vec::new(),
            analytics: Vec::new(),
            loaded: None,
        }
    }

    fn matches(&self, selector: &str) -> Result<bool, BrowserError> {
        let selector = Selector::parse(selector).map_err(|e| BrowserError::Selector(format!("{:?}", e)))?;
        let document = Html::parse_document(&self.html);
        let found = document.select(&selector).next().is_some();
        Ok(found)
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn navigate(&mut self, url: &Url, _timeout: Duration) -> Result<Navigation, NavigationError> {
        check_response(url, Some(self.status), Some("text/html"))?;
        self.loaded = Some(url.clone());
        Ok(Navigation {
            final_url: url.clone(),
            status: Some(self.status),
            content_type: Some("text/html".to_string()),
        })
    }

    async fn wait_for_load(&mut self, _timeout: Duration) {}

    async fn has_selector(&mut self, selector: &str) -> Result<bool, BrowserError> {
        self.matches(selector)
    }

    async fn click(&mut self, selector: &str) -> Result<bool, BrowserError> {
        if self.clickable && self.matches(selector)? {
            self.clicks.push(selector.to_string());
            return Ok(true);
        }
        Ok(false)
    }

    async fn title(&mut self) -> Result<Option<String>, BrowserError> {
        let selector = Selector::parse("title").map_err(|e| BrowserError::Selector(format!("{:?}", e)))?;
        let document = Html::parse_document(&self.html);
        let title = document
            .select(&selector)
            .next()
            .map(|t| t.text().collect::<String>());
        Ok(title)
    }

    async fn analytics(&mut self) -> Result<Vec<String>, BrowserError> {
        Ok(self.analytics.clone())
    }

    async fn snapshot(&mut self) -> Result<DomSnapshot, BrowserError> {
        let url = self.loaded.clone().ok_or(BrowserError::NoPage)?;
        Ok(DomSnapshot::from_html(
            url,
            &self.html,
            Viewport {
                width: 1280,
                height: 800,
            },
        ))
    }

    async fn close(&mut self) {
        self.loaded = None;
    }
}
