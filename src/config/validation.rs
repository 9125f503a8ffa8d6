use crate::config::types::{BrowserConfig, Config, CrawlerConfig, OutputConfig, SiteConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_site_config(&config.site)?;
    validate_browser_config(&config.browser)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    // Kept deliberately small: the upstream throttles aggressively
    if config.max_connections < 1 || config.max_connections > 20 {
        return Err(ConfigError::Validation(format!(
            "max_connections must be between 1 and 20, got {}",
            config.max_connections
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.retry_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "retry_attempts must be >= 1, got {}",
            config.retry_attempts
        )));
    }

    if config.reset_every < 1 {
        return Err(ConfigError::Validation(format!(
            "reset_every must be >= 1, got {}",
            config.reset_every
        )));
    }

    Ok(())
}

/// Validates site endpoints and markup rules
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if !matches!(base.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    if !config.search_path.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "search_path must start with '/', got '{}'",
            config.search_path
        )));
    }

    for (name, value) in [
        ("result_selector", &config.result_selector),
        ("link_selector", &config.link_selector),
        ("image_selector", &config.image_selector),
        ("total_results_selector", &config.total_results_selector),
        ("next_page_selector", &config.next_page_selector),
    ] {
        validate_selector(name, value)?;
    }

    for (name, value) in [
        ("search_query_id", &config.search_query_id),
        ("sponsored_attribute", &config.sponsored_attribute),
        ("state_marker", &config.state_marker),
        ("offset_token", &config.offset_token),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

/// Validates headless browser configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.wait_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "wait_timeout_secs must be >= 1, got {}",
            config.wait_timeout_secs
        )));
    }

    for condition in &config.wait_for {
        if condition.is_empty() {
            return Err(ConfigError::Validation(
                "wait_for entries cannot be empty".to_string(),
            ));
        }
        // XPath conditions are evaluated by the browser itself
        if !condition.starts_with('/') {
            validate_selector("wait_for", condition)?;
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data_dir cannot be empty".to_string(),
        ));
    }

    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a CSS selector parses
fn validate_selector(name: &str, selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("{} '{}': {:?}", name, selector, e)))
}
