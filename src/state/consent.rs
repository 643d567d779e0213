//! Consent-banner handling results and scan quality grading

use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to a detected consent banner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentAction {
    /// An accept control was clicked
    Dismissed,
    /// A banner was detected but could not be dismissed in time
    Failed,
    /// No banner was detected
    None,
}

impl ConsentAction {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Dismissed => "dismissed",
            Self::Failed => "failed",
            Self::None => "none",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "dismissed" => Some(Self::Dismissed),
            "failed" => Some(Self::Failed),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

impl fmt::Display for ConsentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Consent-banner details recorded on each page visit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentInfo {
    pub detected: bool,
    pub framework: Option<String>,
    pub action: ConsentAction,
}

impl ConsentInfo {
    /// No banner found on the page
    pub fn none() -> Self {
        Self {
            detected: false,
            framework: None,
            action: ConsentAction::None,
        }
    }
}

impl Default for ConsentInfo {
    fn default() -> Self {
        Self::none()
    }
}

/// How much a consent banner may have obscured the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanQuality {
    /// No banner, or every banner was dismissed
    Clean,
    /// Banners were detected and never dismissed
    BlockedByConsent,
    /// Some pages dismissed the banner, others did not
    PartialConsent,
}

impl ScanQuality {
    /// Grades a scan from the consent results of its visited pages
    pub fn grade<'a>(results: impl IntoIterator<Item = &'a ConsentInfo>) -> Self {
        let mut dismissed = false;
        let mut failed = false;
        for info in results {
            match info.action {
                ConsentAction::Dismissed => dismissed = true,
                ConsentAction::Failed => failed = true,
                ConsentAction::None => {}
            }
        }

        match (dismissed, failed) {
            (_, false) => Self::Clean,
            (false, true) => Self::BlockedByConsent,
            (true, true) => Self::PartialConsent,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::BlockedByConsent => "blocked_by_consent",
            Self::PartialConsent => "partial_consent",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "clean" => Some(Self::Clean),
            "blocked_by_consent" => Some(Self::BlockedByConsent),
            "partial_consent" => Some(Self::PartialConsent),
            _ => None,
        }
    }
}
