use serde::{Deserialize, Serialize};

/// Default user agent presented to sites and used for robots.txt matching
pub const DEFAULT_USER_AGENT: &str = "TapMap/1.0 (internal pharma audit tool)";

/// Main configuration structure for TapMap
///
/// Every table has defaults, so an empty file (or no file) is a valid config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub defaults: ScanDefaults,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Browser session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    /// User agent string sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Viewport width in CSS pixels
    #[serde(rename = "viewport-width", default = "default_viewport_width")]
    pub viewport_width: u32,

    /// Viewport height in CSS pixels (the fold line)
    #[serde(rename = "viewport-height", default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Upper bound on a single navigation (milliseconds)
    #[serde(rename = "navigation-timeout-ms", default = "default_navigation_timeout")]
    pub navigation_timeout_ms: u64,

    /// Upper bound on the post-navigation load wait (milliseconds)
    #[serde(rename = "load-timeout-ms", default = "default_load_timeout")]
    pub load_timeout_ms: u64,

    /// Upper bound on consent-banner dismissal (milliseconds)
    #[serde(rename = "consent-timeout-ms", default = "default_consent_timeout")]
    pub consent_timeout_ms: u64,

    /// Explicit Chromium executable; searched for when absent
    #[serde(rename = "chromium-path", default)]
    pub chromium_path: Option<String>,

    /// Fetch pages over plain HTTP without a browser
    #[serde(rename = "static-html", default)]
    pub static_html: bool,
}

/// Admin-configured bounds applied to every scan request
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Largest allowed max_pages
    #[serde(rename = "max-pages-limit", default = "default_max_pages_limit")]
    pub max_pages_limit: u32,

    /// Largest allowed max_depth
    #[serde(rename = "max-depth-limit", default = "default_max_depth_limit")]
    pub max_depth_limit: u32,

    /// Lowest request rate (req/s); never below the governor's hard floor
    #[serde(rename = "rate-limit-floor", default = "default_rate_floor")]
    pub rate_limit_floor: f64,

    /// Highest request rate (req/s)
    #[serde(rename = "rate-limit-ceiling", default = "default_rate_ceiling")]
    pub rate_limit_ceiling: f64,

    /// Default and maximum wall-clock duration of a scan (seconds)
    #[serde(rename = "scan-timeout-seconds", default = "default_scan_timeout")]
    pub scan_timeout_seconds: u64,

    /// Maximum number of URLs discovered (queued plus visited) per scan
    #[serde(rename = "max-frontier-size", default = "default_max_frontier_size")]
    pub max_frontier_size: usize,
}

/// Values used when a scan request leaves a field unset
#[derive(Debug, Clone, Deserialize)]
pub struct ScanDefaults {
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    #[serde(rename = "rate-limit", default = "default_rate_limit")]
    pub rate_limit: f64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

/// Value-tier classifier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Messages endpoint of the reasoning service
    #[serde(rename = "api-url", default = "default_api_url")]
    pub api_url: String,

    /// Environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model identifier sent with each request
    #[serde(default)]
    pub model: Option<String>,

    /// Elements per request
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Response token budget per request
    #[serde(rename = "max-tokens", default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upper bound on one classifier request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// A scan as requested by a caller, before bounds are applied
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanRequest {
    pub seed_url: String,
    pub max_pages: Option<u32>,
    pub max_depth: Option<u32>,
    pub rate_limit: Option<f64>,
    pub timeout_seconds: Option<u64>,
    pub custom_tag: Option<CustomTagConfig>,
}

/// A custom tag that replaces the default taxonomy for one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomTagConfig {
    pub name: String,
    pub keywords: Vec<String>,
}

/// Effective, bounded configuration of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub max_pages: u32,
    pub max_depth: u32,
    pub rate_limit: f64,
    pub timeout_seconds: u64,
    pub custom_tag: Option<CustomTagConfig>,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_viewport_width() -> u32 {
    1280
}
fn default_viewport_height() -> u32 {
    800
}
fn default_navigation_timeout() -> u64 {
    30_000
}
fn default_load_timeout() -> u64 {
    10_000
}
fn default_consent_timeout() -> u64 {
    5_000
}
fn default_max_pages_limit() -> u32 {
    1000
}
fn default_max_depth_limit() -> u32 {
    20
}
fn default_rate_floor() -> f64 {
    0.5
}
fn default_rate_ceiling() -> f64 {
    5.0
}
fn default_scan_timeout() -> u64 {
    900
}
fn default_max_frontier_size() -> usize {
    10_000
}
fn default_max_pages() -> u32 {
    200
}
fn default_max_depth() -> u32 {
    5
}
fn default_rate_limit() -> f64 {
    1.0
}
fn default_database_path() -> String {
    "data/tapmap.db".to_string()
}
fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}
fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    50
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_request_timeout() -> u64 {
    60
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            navigation_timeout_ms: default_navigation_timeout(),
            load_timeout_ms: default_load_timeout(),
            consent_timeout_ms: default_consent_timeout(),
            chromium_path: None,
            static_html: false,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pages_limit: default_max_pages_limit(),
            max_depth_limit: default_max_depth_limit(),
            rate_limit_floor: default_rate_floor(),
            rate_limit_ceiling: default_rate_ceiling(),
            scan_timeout_seconds: default_scan_timeout(),
            max_frontier_size: default_max_frontier_size(),
        }
    }
}

impl Default for ScanDefaults {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_depth: default_max_depth(),
            rate_limit: default_rate_limit(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            model: None,
            batch_size: default_batch_size(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}
