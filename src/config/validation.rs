use crate::config::types::{Config, HttpConfig, ListingConfig, OutputConfig, ReviewsConfig};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Upper bound for pauses, delays and backoff factors (one day)
const MAX_SECONDS: f64 = 86_400.0;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_http_config(&config.http)?;
    validate_output_config(&config.output)?;
    validate_listing_config(&config.listing)?;
    validate_reviews_config(&config.reviews)?;
    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    validate_seconds("pause-secs", config.pause_secs)?;

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.root.as_os_str().is_empty() {
        return Err(ConfigError::Validation("root cannot be empty".to_string()));
    }

    if config.ledger_file.is_empty() {
        return Err(ConfigError::Validation(
            "ledger-file cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_listing_config(config: &ListingConfig) -> Result<(), ConfigError> {
    validate_base_url("listing url", &config.url)?;

    if config.page_param.is_empty() {
        return Err(ConfigError::Validation(
            "page-param cannot be empty".to_string(),
        ));
    }

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "listing max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.max_page_failures < 1 {
        return Err(ConfigError::Validation(format!(
            "max-page-failures must be >= 1, got {}",
            config.max_page_failures
        )));
    }

    validate_seconds("empty-page-delay-secs", config.empty_page_delay_secs)?;
    validate_seconds("failure-backoff-factor", config.failure_backoff_factor)?;

    Ok(())
}

fn validate_reviews_config(config: &ReviewsConfig) -> Result<(), ConfigError> {
    validate_base_url("reviews url", &config.url)?;

    if config.max_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "reviews max-retries must be >= 1, got {}",
            config.max_retries
        )));
    }

    if config.max_errors < 1 {
        return Err(ConfigError::Validation(format!(
            "max-errors must be >= 1, got {}",
            config.max_errors
        )));
    }

    validate_seconds("error-backoff-factor", config.error_backoff_factor)?;

    if let Some(language) = &config.language {
        if language.is_empty() || !language.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation(format!(
                "language must be a non-empty alphanumeric name, got '{}'",
                language
            )));
        }
    }

    if let Some(pattern) = &config.title_filter {
        Regex::new(pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
    }

    Ok(())
}

fn validate_base_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name, value
        )));
    }

    Ok(())
}

fn validate_seconds(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=MAX_SECONDS).contains(&value) {
        return Err(ConfigError::Validation(format!(
            "{} must be between 0 and {}, got {}",
            name, MAX_SECONDS, value
        )));
    }
    Ok(())
}
