use crate::config::types::{ApiConfig, Config, CrawlerConfig, InputConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_api_config(&config.api)?;
    validate_input_config(&config.input)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.flush_interval_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "flush_interval_secs must be >= 1, got {}",
            config.flush_interval_secs
        )));
    }

    if config.nudge_step < 1 {
        return Err(ConfigError::Validation(format!(
            "nudge_step must be >= 1, got {}",
            config.nudge_step
        )));
    }

    if config.transient_backoff_max_ms < config.transient_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "transient_backoff_max_ms ({}) must be >= transient_backoff_ms ({})",
            config.transient_backoff_max_ms, config.transient_backoff_ms
        )));
    }

    Ok(())
}

/// Validates remote API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("base_url", &config.base_url),
        ("web_base_url", &config.web_base_url),
    ] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::Validation(format!("Invalid {} '{}': {}", name, value, e)))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::Validation(format!(
                "{} '{}' must use http or https",
                name, value
            )));
        }
    }

    for (name, value) in [
        ("version", &config.version),
        ("comments_method", &config.comments_method),
        ("resolve_method", &config.resolve_method),
        ("access_token_env", &config.access_token_env),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

/// Validates input configuration
fn validate_input_config(config: &InputConfig) -> Result<(), ConfigError> {
    if config.sources_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "sources_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "data_dir cannot be empty".to_string(),
        ));
    }
    Ok(())
}
