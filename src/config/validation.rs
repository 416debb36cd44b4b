//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{Result, SigeaError};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_database_config(&settings.database)?;
    validate_app_config(&settings.app)?;
    validate_policy_config(&settings.policy)?;
    validate_directory_config(&settings.directory)?;
    validate_logging_config(&settings.logging)?;

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(SigeaError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(SigeaError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(SigeaError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate application configuration
fn validate_app_config(config: &super::AppConfig) -> Result<()> {
    crate::utils::time::parse_timezone(&config.timezone)?;

    regex::Regex::new(&config.control_number_pattern)
        .map_err(|_| SigeaError::Config(
            "Invalid control number pattern".to_string()
        ))?;

    Ok(())
}

/// Validate policy configuration
fn validate_policy_config(config: &super::PolicyConfig) -> Result<()> {
    if config.self_register_grace_minutes < 0 {
        return Err(SigeaError::Config(
            "Self-register grace minutes cannot be negative".to_string()
        ));
    }

    if config.public_confirm_window_days <= 0 {
        return Err(SigeaError::Config(
            "Public confirmation window must be at least one day".to_string()
        ));
    }

    if config.public_pause_available_from_seconds < 0 {
        return Err(SigeaError::Config(
            "Public pause availability offset cannot be negative".to_string()
        ));
    }

    if config.public_pause_available_until_after_end_minutes < 0 {
        return Err(SigeaError::Config(
            "Public pause closing offset cannot be negative".to_string()
        ));
    }

    if config.settings_cache_ttl_seconds == 0 {
        return Err(SigeaError::Config(
            "Settings cache TTL must be greater than 0".to_string()
        ));
    }

    if config.credit_threshold_hours <= 0.0 {
        return Err(SigeaError::Config(
            "Credit threshold hours must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate directory API configuration
fn validate_directory_config(config: &super::DirectoryConfig) -> Result<()> {
    if config.api_url.is_empty() {
        return Err(SigeaError::Config(
            "Directory API URL is required".to_string()
        ));
    }

    url::Url::parse(&config.api_url)
        .map_err(|_| SigeaError::Config(
            format!("Invalid directory API URL: {}", config.api_url)
        ))?;

    if config.timeout_seconds == 0 {
        return Err(SigeaError::Config(
            "Directory timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(SigeaError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(SigeaError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_timezone() {
        let mut settings = Settings::default();
        settings.app.timezone = "Mars/Olympus_Mons".to_string();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_rejects_bad_control_number_pattern() {
        let mut settings = Settings::default();
        settings.app.control_number_pattern = "[unclosed".to_string();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_rejects_bad_directory_url() {
        let mut settings = Settings::default();
        settings.directory.api_url = "not a url".to_string();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_rejects_zero_cache_ttl() {
        let mut settings = Settings::default();
        settings.policy.settings_cache_ttl_seconds = 0;
        assert!(validate_settings(&settings).is_err());
    }
}
