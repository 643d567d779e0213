//! TapMap: an interactive-element crawl engine
//!
//! This crate drives a headless browser through a polite, safety-checked
//! breadth-first crawl of a single site, extracts every interactive element
//! with its structural context, tags domain-specific elements, and provides
//! cross-page deduplication, scan-to-scan diffs and value-tier enrichment.

pub mod analysis;
pub mod browser;
pub mod classify;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod governor;
pub mod robots;
pub mod state;
pub mod storage;
pub mod tagger;
pub mod url;

use thiserror::Error;

/// Main error type for TapMap operations
#[derive(Debug, Error)]
pub enum TapmapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Policy violation for {url}: {reason}")]
    PolicyViolation { url: String, reason: String },

    #[error("Navigation error: {0}")]
    Navigation(#[from] browser::NavigationError),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("Classification error: {0}")]
    Classification(#[from] classify::ClassificationError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Scan not found: {0}")]
    ScanNotFound(String),

    #[error("Scan {scan_id} is {status}, expected a finished scan")]
    ScanNotFinished {
        scan_id: String,
        status: state::ScanStatus,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for TapMap operations
pub type Result<T> = std::result::Result<T, TapmapError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{ActionType, ElementType, PageOutcome, ScanStatus, ValueTier};
pub use storage::{ElementRecord, PageVisit, ScanJob};
pub use crate::url::{extract_domain, normalize_url};
