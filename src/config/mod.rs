//! Configuration module for TapMap
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and turning caller scan requests into bounded scan configurations.
//!
//! # Example
//!
//! ```no_run
//! use tapmap::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("tapmap.toml")).unwrap();
//! println!("Database: {}", config.output.database_path);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserSettings, ClassifierConfig, Config, CustomTagConfig, LimitsConfig, OutputConfig,
    ScanConfig, ScanDefaults, ScanRequest, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_or_default, load_config_with_hash, parse_config,
};

pub use validation::{resolve_scan_request, validate};
