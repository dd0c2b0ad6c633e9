use crate::config::types::{ApiConfig, Config, CrawlerConfig, GeocodingConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_api_config(&config.api)?;
    validate_geocoding_config(&config.geocoding)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.start_id.trim().is_empty() || config.start_id.trim() == "0" {
        return Err(ConfigError::Validation(format!(
            "start_id must be a WikiTree id, got '{}'",
            config.start_id
        )));
    }

    if config.save_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "save_interval must be >= 1, got {}",
            config.save_interval
        )));
    }

    if config.export_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "export_interval must be >= 1, got {}",
            config.export_interval
        )));
    }

    if config.descendant_depth < 1 || config.descendant_depth > 10 {
        return Err(ConfigError::Validation(format!(
            "descendant_depth must be between 1 and 10, got {}",
            config.descendant_depth
        )));
    }

    if config.max_retry_after_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "max_retry_after_secs must be >= 1, got {}",
            config.max_retry_after_secs
        )));
    }

    Ok(())
}

fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_http_url("api.endpoint", &config.endpoint)?;

    if config.app_id.trim().is_empty() {
        return Err(ConfigError::Validation("app_id cannot be empty".to_string()));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

fn validate_geocoding_config(config: &GeocodingConfig) -> Result<(), ConfigError> {
    validate_http_url("geocoding.endpoint", &config.endpoint)
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.export_path.is_empty() {
        return Err(ConfigError::Validation(
            "export_path cannot be empty".to_string(),
        ));
    }

    if config.backup_dir.is_empty() {
        return Err(ConfigError::Validation(
            "backup_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", field, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got {}",
            field,
            url.scheme()
        )));
    }

    Ok(())
}
