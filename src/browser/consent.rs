//! Consent-banner detection and dismissal

use crate::browser::BrowserDriver;
use crate::state::{ConsentAction, ConsentInfo};
use std::time::{Duration, Instant};

/// Selector signature of one consent framework
#[derive(Debug, Clone, Copy)]
pub struct ConsentSignature {
    pub framework: &'static str,
    /// Matches the framework's banner or its injected markup
    pub detect: &'static str,
    /// Accept buttons, tried in order
    pub accept: &'static [&'static str],
}

/// Known frameworks in detection order; the generic signature comes last
pub const CONSENT_FRAMEWORKS: &[ConsentSignature] = &[
    ConsentSignature {
        framework: "OneTrust",
        detect: "#onetrust-banner-sdk, #onetrust-consent-sdk, .onetrust-pc-dark-filter",
        accept: &["#onetrust-accept-btn-handler"],
    },
    ConsentSignature {
        framework: "TrustArc",
        detect: "#truste-consent-track, .truste_overlay, #consent_blackbar",
        accept: &["#truste-consent-button"],
    },
    ConsentSignature {
        framework: "Cookiebot",
        detect: "#CybotCookiebotDialog, .CybotCookiebotDialogActive",
        accept: &[
            "#CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll",
            "#CybotCookiebotDialogBodyButtonAccept",
        ],
    },
    ConsentSignature {
        framework: "Evidon",
        detect: "#_evidon_banner, #_evidon-barrier-wrapper",
        accept: &["#_evidon-accept-button", "#_evidon-banner-acceptbutton"],
    },
    ConsentSignature {
        framework: "Quantcast",
        detect: ".qc-cmp2-container, #qc-cmp2-ui",
        accept: &[".qc-cmp2-summary-buttons button:last-child"],
    },
    ConsentSignature {
        framework: "Didomi",
        detect: "#didomi-host, .didomi-popup-container",
        accept: &["#didomi-notice-agree-button"],
    },
    ConsentSignature {
        framework: "Generic",
        detect: "[id*=\"cookie-banner\"], [class*=\"cookie-banner\"], [id*=\"consent-banner\"], [class*=\"consent-banner\"], [class*=\"cookie-notice\"], [id*=\"cookie-notice\"]",
        accept: &[
            "#accept-all-cookies",
            "#accept-cookies",
            "#cookie-accept",
            "button[id*=\"accept\"]",
            "button[class*=\"accept\"]",
            "a[id*=\"accept\"]",
        ],
    },
];

async fn detect(driver: &mut dyn BrowserDriver) -> Option<&'static ConsentSignature> {
    for signature in CONSENT_FRAMEWORKS {
        match driver.has_selector(signature.detect).await {
            Ok(true) => return Some(signature),
            Ok(false) => {}
            Err(e) => {
                tracing::debug!("Consent detection for {} failed: {}", signature.framework, e);
            }
        }
    }
    None
}

async fn accept(driver: &mut dyn BrowserDriver, signature: &ConsentSignature) -> bool {
    let generic = CONSENT_FRAMEWORKS.last().map(|s| s.accept).unwrap_or(&[]);
    let candidates = signature
        .accept
        .iter()
        .chain(generic.iter().filter(|s| !signature.accept.contains(*s)));

    for selector in candidates {
        match driver.click(selector).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => tracing::debug!("Consent click on {} failed: {}", selector, e),
        }
    }
    false
}

/// Detects a consent banner on the loaded page and tries to accept it
///
/// Detection and dismissal share one time budget. Running out of time
/// during detection reports no banner; running out while clicking reports
/// a failed dismissal. Nothing here aborts the page.
///
/// # Arguments
///
/// * `driver` - Driver holding the loaded page
/// * `timeout` - Budget for the whole consent step
///
/// # Returns
///
/// What was found and what was done about it
pub async fn handle_consent(driver: &mut dyn BrowserDriver, timeout: Duration) -> ConsentInfo {
    let started = Instant::now();

    let signature = match tokio::time::timeout(timeout, detect(driver)).await {
        Ok(Some(signature)) => signature,
        Ok(None) => return ConsentInfo::none(),
        Err(_) => {
            tracing::debug!("Consent detection timed out");
            return ConsentInfo::none();
        }
    };

    tracing::info!("Consent banner detected ({})", signature.framework);

    let remaining = timeout.saturating_sub(started.elapsed());
    let dismissed = tokio::time::timeout(remaining, accept(driver, signature))
        .await
        .unwrap_or(false);

    let action = if dismissed {
        ConsentAction::Dismissed
    } else {
        tracing::warn!("Could not dismiss {} consent banner", signature.framework);
        ConsentAction::Failed
    };

    ConsentInfo {
        detected: true,
        framework: Some(signature.framework.to_string()),
        action,
    }
}
