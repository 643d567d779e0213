//! Outcome of a single frontier entry
//!
//! Every dequeued URL that reaches the governor produces one page visit with
//! one of these outcomes.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents what happened when the scheduler processed a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageOutcome {
    // ===== Fetch attempts =====
    /// Page was rendered and its elements extracted
    Fetched,

    /// Server answered with an HTTP error status
    HttpError,

    /// Navigation failed (timeout, DNS failure, connection error)
    NavigationFailed,

    /// Response was not an HTML document
    NotHtml,

    /// Navigation ended on another site
    OffDomainRedirect,

    /// Navigation ended on an address rejected by the SSRF guard
    UnsafeRedirect,

    // ===== Governor denials =====
    /// robots.txt disallows the path
    RobotsDenied,

    /// SSRF guard rejected the URL before navigation
    UnsafeTarget,
}

impl PageOutcome {
    /// Returns true if a navigation was attempted for this visit
    ///
    /// Only attempted fetches count against the scan's page budget.
    pub fn is_fetch_attempt(&self) -> bool {
        !matches!(self, Self::RobotsDenied | Self::UnsafeTarget)
    }

    /// Returns true if the page produced element records
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fetched)
    }

    /// Converts the outcome to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::HttpError => "http_error",
            Self::NavigationFailed => "navigation_failed",
            Self::NotHtml => "not_html",
            Self::OffDomainRedirect => "off_domain_redirect",
            Self::UnsafeRedirect => "unsafe_redirect",
            Self::RobotsDenied => "robots_denied",
            Self::UnsafeTarget => "unsafe_target",
        }
    }

    /// Parses an outcome from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "fetched" => Some(Self::Fetched),
            "http_error" => Some(Self::HttpError),
            "navigation_failed" => Some(Self::NavigationFailed),
            "not_html" => Some(Self::NotHtml),
            "off_domain_redirect" => Some(Self::OffDomainRedirect),
            "unsafe_redirect" => Some(Self::UnsafeRedirect),
            "robots_denied" => Some(Self::RobotsDenied),
            "unsafe_target" => Some(Self::UnsafeTarget),
            _ => None,
        }
    }
}

impl fmt::Display for PageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
