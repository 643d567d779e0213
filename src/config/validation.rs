use crate::config::types::{
    BrowserSettings, ClassifierConfig, Config, CustomTagConfig, LimitsConfig, OutputConfig,
    ScanConfig, ScanRequest,
};
use crate::governor::effective_rate;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_browser_settings(&config.browser)?;
    validate_limits(&config.limits)?;
    validate_output_config(&config.output)?;
    validate_classifier_config(&config.classifier)?;
    Ok(())
}

/// Validates browser session configuration
fn validate_browser_settings(config: &BrowserSettings) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.viewport_width == 0 || config.viewport_height == 0 {
        return Err(ConfigError::Validation(format!(
            "viewport must be non-empty, got {}x{}",
            config.viewport_width, config.viewport_height
        )));
    }

    for (name, value) in [
        ("navigation_timeout_ms", config.navigation_timeout_ms),
        ("load_timeout_ms", config.load_timeout_ms),
        ("consent_timeout_ms", config.consent_timeout_ms),
    ] {
        if value < 100 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 100ms, got {}ms",
                name, value
            )));
        }
    }

    Ok(())
}

/// Validates admin limits
fn validate_limits(config: &LimitsConfig) -> Result<(), ConfigError> {
    if config.max_pages_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages_limit must be >= 1, got {}",
            config.max_pages_limit
        )));
    }

    if config.max_depth_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "max_depth_limit must be >= 1, got {}",
            config.max_depth_limit
        )));
    }

    if !config.rate_limit_floor.is_finite() || config.rate_limit_floor <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "rate_limit_floor must be a positive number, got {}",
            config.rate_limit_floor
        )));
    }

    if !config.rate_limit_ceiling.is_finite() || config.rate_limit_ceiling < config.rate_limit_floor
    {
        return Err(ConfigError::Validation(format!(
            "rate_limit_ceiling must be >= rate_limit_floor ({}), got {}",
            config.rate_limit_floor, config.rate_limit_ceiling
        )));
    }

    if config.scan_timeout_seconds < 1 {
        return Err(ConfigError::Validation(
            "scan_timeout_seconds must be >= 1".to_string(),
        ));
    }

    if (config.max_frontier_size as u64) < config.max_pages_limit as u64 {
        return Err(ConfigError::Validation(format!(
            "max_frontier_size ({}) must be >= max_pages_limit ({})",
            config.max_frontier_size, config.max_pages_limit
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates classifier configuration
fn validate_classifier_config(config: &ClassifierConfig) -> Result<(), ConfigError> {
    Url::parse(&config.api_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid classifier api_url: {}", e)))?;

    if config.batch_size < 1 || config.batch_size > 200 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 200, got {}",
            config.batch_size
        )));
    }

    if config.api_key_env.trim().is_empty() {
        return Err(ConfigError::Validation(
            "api_key_env cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Applies admin bounds and defaults to a scan request
///
/// Out-of-range numeric values are clamped rather than rejected, matching the
/// behaviour callers expect from the scan form. Structural problems (bad seed
/// URL, empty custom tag) are errors.
///
/// # Arguments
///
/// * `request` - The scan as requested
/// * `config` - Loaded configuration providing bounds and defaults
///
/// # Returns
///
/// * `Ok((Url, ScanConfig))` - The parsed seed URL and the bounded scan config
/// * `Err(ConfigError)` - The request cannot be turned into a scan
pub fn resolve_scan_request(
    request: &ScanRequest,
    config: &Config,
) -> Result<(Url, ScanConfig), ConfigError> {
    let seed = parse_seed_url(&request.seed_url)?;
    let limits = &config.limits;
    let defaults = &config.defaults;

    let max_pages = request
        .max_pages
        .unwrap_or(defaults.max_pages)
        .clamp(1, limits.max_pages_limit);

    let max_depth = request
        .max_depth
        .unwrap_or(defaults.max_depth)
        .clamp(1, limits.max_depth_limit);

    let rate_limit = effective_rate(
        request.rate_limit.unwrap_or(defaults.rate_limit),
        limits.rate_limit_floor,
        limits.rate_limit_ceiling,
    );

    let timeout_seconds = request
        .timeout_seconds
        .unwrap_or(limits.scan_timeout_seconds)
        .clamp(1, limits.scan_timeout_seconds);

    let custom_tag = match &request.custom_tag {
        Some(tag) => Some(validate_custom_tag(tag)?),
        None => None,
    };

    Ok((
        seed,
        ScanConfig {
            max_pages,
            max_depth,
            rate_limit,
            timeout_seconds,
            custom_tag,
        },
    ))
}

/// Parses and checks a seed URL
fn parse_seed_url(seed: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(seed.trim())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' must use http or https",
            seed
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' has no host",
            seed
        )));
    }

    Ok(url)
}

/// Trims a custom tag and checks it is usable
fn validate_custom_tag(tag: &CustomTagConfig) -> Result<CustomTagConfig, ConfigError> {
    let name = tag.name.trim();
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "custom tag name cannot be empty".to_string(),
        ));
    }

    let keywords: Vec<String> = tag
        .keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();

    if keywords.is_empty() {
        return Err(ConfigError::Validation(format!(
            "custom tag '{}' needs at least one keyword",
            name
        )));
    }

    Ok(CustomTagConfig {
        name: name.to_string(),
        keywords,
    })
}
