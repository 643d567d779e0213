//! One page fetch on top of a driver

use crate::browser::consent::handle_consent;
use crate::browser::{BrowserDriver, NavigationError};
use crate::config::BrowserSettings;
use crate::extract::snapshot::DomSnapshot;
use crate::state::ConsentInfo;
use std::time::Duration;
use url::Url;

/// Time bounds for a page fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub navigation_timeout: Duration,
    pub load_timeout: Duration,
    pub consent_timeout: Duration,
}

impl From<&BrowserSettings> for SessionSettings {
    fn from(settings: &BrowserSettings) -> Self {
        Self {
            navigation_timeout: Duration::from_millis(settings.navigation_timeout_ms),
            load_timeout: Duration::from_millis(settings.load_timeout_ms),
            consent_timeout: Duration::from_millis(settings.consent_timeout_ms),
        }
    }
}

/// A successfully loaded and captured page
#[derive(Debug, Clone)]
pub struct PageFetch {
    /// URL after redirects
    pub final_url: Url,
    pub status: Option<u16>,
    pub title: Option<String>,
    pub consent: ConsentInfo,
    pub analytics: Vec<String>,
    pub snapshot: DomSnapshot,
}

/// Drives page fetches for one scan
pub struct SessionRunner {
    driver: Box<dyn BrowserDriver>,
    settings: SessionSettings,
}

impl SessionRunner {
    pub fn new(driver: Box<dyn BrowserDriver>, settings: impl Into<SessionSettings>) -> Self {
        Self {
            driver,
            settings: settings.into(),
        }
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Loads and captures one page
    ///
    /// Navigation is bounded by the navigation timeout. The load wait and
    /// the consent step have their own bounds and never fail the page.
    /// Title and analytics are best effort.
    ///
    /// # Arguments
    ///
    /// * `url` - The admitted URL to load
    ///
    /// # Returns
    ///
    /// * `Ok(PageFetch)` - The captured page
    /// * `Err(NavigationError)` - The page could not be loaded or captured
    pub async fn fetch(&mut self, url: &Url) -> Result<PageFetch, NavigationError> {
        let navigation = self
            .driver
            .navigate(url, self.settings.navigation_timeout)
            .await?;

        if navigation.final_url != *url {
            tracing::debug!("{} redirected to {}", url, navigation.final_url);
        }

        self.driver.wait_for_load(self.settings.load_timeout).await;

        let consent = handle_consent(self.driver.as_mut(), self.settings.consent_timeout).await;

        let analytics = match self.driver.analytics().await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!("Analytics detection failed on {}: {}", navigation.final_url, e);
                Vec::new()
            }
        };

        let title = match self.driver.title().await {
            Ok(title) => title,
            Err(e) => {
                tracing::debug!("Title lookup failed on {}: {}", navigation.final_url, e);
                None
            }
        };

        let snapshot = self
            .driver
            .snapshot()
            .await
            .map_err(|source| NavigationError::Capture {
                url: navigation.final_url.to_string(),
                source,
            })?;

        Ok(PageFetch {
            final_url: navigation.final_url,
            status: navigation.status,
            title,
            consent,
            analytics,
            snapshot,
        })
    }

    /// Shuts the driver down
    pub async fn close(&mut self) {
        self.driver.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::FakeDriver;
    use crate::state::ConsentAction;

    fn settings() -> SessionSettings {
        SessionSettings {
            navigation_timeout: Duration::from_secs(1),
            load_timeout: Duration::from_millis(10),
            consent_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_fetch_page() {
        let mut driver = FakeDriver::new(
            r#"<html><head><title>Home</title></head><body>
                <div id="CybotCookiebotDialog"></div><a href="/about">About</a></body></html>"#,
        );
        driver.analytics = vec!["GTM".to_string()];
        let mut runner = SessionRunner::new(Box::new(driver), settings());

        let url = Url::parse("https://brand.com/").unwrap();
        let fetch = runner.fetch(&url).await.unwrap();

        assert_eq!(fetch.final_url, url);
        assert_eq!(fetch.title.as_deref(), Some("Home"));
        assert_eq!(fetch.analytics, vec!["GTM".to_string()]);
        assert_eq!(fetch.consent.framework.as_deref(), Some("Cookiebot"));
        assert_eq!(fetch.consent.action, ConsentAction::Failed);
        assert!(fetch.snapshot.nodes().iter().any(|n| n.tag == "a"));
    }

    #[tokio::test]
    async fn test_fetch_navigation_error() {
        let mut driver = FakeDriver::new("<body></body>");
        driver.status = 500;
        let mut runner = SessionRunner::new(Box::new(driver), settings());

        let url = Url::parse("https://brand.com/").unwrap();
        let err = runner.fetch(&url).await.unwrap_err();
        assert_eq!(err.http_status(), Some(500));
    }

    #[test]
    fn test_settings_from_browser_settings() {
        let browser = BrowserSettings::default();
        let settings = SessionSettings::from(&browser);
        assert_eq!(settings.navigation_timeout, Duration::from_millis(browser.navigation_timeout_ms));
        assert_eq!(settings.consent_timeout, Duration::from_millis(browser.consent_timeout_ms));
    }
}
