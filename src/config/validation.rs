use crate::config::types::{
    Config, CrawlConfig, OutputConfig, SelectorConfig, SourceConfig, TimeoutConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Upper bound for any single wait; unbounded waits are not allowed
const MAX_TIMEOUT_MS: u64 = 60 * 60 * 1000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_source_config(&config.source)?;
    validate_selector_config(&config.selectors)?;
    validate_timeout_config(&config.timeouts)?;
    validate_crawl_config(&config.crawl)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the listing location
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.page_length == Some(0) {
        return Err(ConfigError::Validation(
            "page-length must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates that every selector is a parseable CSS selector
fn validate_selector_config(config: &SelectorConfig) -> Result<(), ConfigError> {
    for (name, selector) in [
        ("table-wrapper", &config.table_wrapper),
        ("rows", &config.rows),
        ("next-button", &config.next_button),
        ("overlay", &config.overlay),
        ("page-length-input", &config.page_length_input),
    ] {
        validate_selector(name, selector)?;
    }
    Ok(())
}

fn validate_selector(name: &str, selector: &str) -> Result<(), ConfigError> {
    if selector.trim().is_empty() {
        return Err(ConfigError::InvalidSelector(format!(
            "{} cannot be empty",
            name
        )));
    }

    Selector::parse(selector).map_err(|e| {
        ConfigError::InvalidSelector(format!("{} '{}': {:?}", name, selector, e))
    })?;

    Ok(())
}

/// Validates wait budgets
fn validate_timeout_config(config: &TimeoutConfig) -> Result<(), ConfigError> {
    for (name, value) in [("table-ms", config.table_ms), ("overlay-ms", config.overlay_ms)] {
        if value == 0 || value > MAX_TIMEOUT_MS {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and {}, got {}",
                name, MAX_TIMEOUT_MS, value
            )));
        }
    }
    Ok(())
}

/// Validates supervision settings
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    let fields = config.schedule.split_whitespace().count();
    // Seconds come first and are mandatory; the year field is optional.
    if !(6..=7).contains(&fields) {
        return Err(ConfigError::Validation(format!(
            "schedule must be a seconds-first cron expression with 6 or 7 fields, got '{}'",
            config.schedule
        )));
    }

    if config.retry_backoff_ms > MAX_TIMEOUT_MS {
        return Err(ConfigError::Validation(format!(
            "retry-backoff-ms must be <= {}, got {}",
            MAX_TIMEOUT_MS, config.retry_backoff_ms
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.store_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "store-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}
