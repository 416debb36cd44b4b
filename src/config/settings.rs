//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub app: AppConfig,
    pub policy: PolicyConfig,
    pub directory: DirectoryConfig,
    pub logging: LoggingConfig,
    pub features: FeaturesConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Application-wide configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// IANA timezone in which naive local inputs are interpreted
    pub timezone: String,
    /// Pattern accepted control numbers must match
    pub control_number_pattern: String,
}

/// Time-window policy configuration. Values here are defaults; operators can
/// override them at runtime through the `app_settings` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyConfig {
    /// Self-registration stays open this long past the activity start
    pub self_register_grace_minutes: i64,
    /// Public confirmation stays open this long past the activity end
    pub public_confirm_window_days: i64,
    /// Public pause/resume opens this long after the activity start
    pub public_pause_available_from_seconds: i64,
    /// Public pause/resume closes this long after the activity end
    pub public_pause_available_until_after_end_minutes: i64,
    /// TTL of the advisory in-process cache over `app_settings`
    pub settings_cache_ttl_seconds: u64,
    /// Confirmed hours needed for complementary credit
    pub credit_threshold_hours: f64,
}

/// Student directory API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryConfig {
    pub api_url: String,
    pub timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
    pub max_file_size: String,
    pub max_files: u32,
}

/// Feature flags configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeaturesConfig {
    /// Resolve unknown control numbers against the external directory
    pub directory_lookup: bool,
    /// Accept public kiosk operations (confirm, pause/resume)
    pub public_kiosk: bool,
    /// Public confirmation also records a full-credit attendance
    pub confirmation_creates_attendance: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("SIGEA"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::SigeaError> {
        super::validation::validate_settings(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/sigea".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            app: AppConfig {
                timezone: "America/Mexico_City".to_string(),
                control_number_pattern: "^[0-9A-Z]{6,12}$".to_string(),
            },
            policy: PolicyConfig {
                self_register_grace_minutes: 20,
                public_confirm_window_days: 30,
                public_pause_available_from_seconds: 0,
                public_pause_available_until_after_end_minutes: 5,
                settings_cache_ttl_seconds: 10,
                credit_threshold_hours: 10.0,
            },
            directory: DirectoryConfig {
                api_url: "https://directorio.universidad.example/api".to_string(),
                timeout_seconds: 6,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: "/var/log/sigea".to_string(),
                max_file_size: "10MB".to_string(),
                max_files: 5,
            },
            features: FeaturesConfig {
                directory_lookup: true,
                public_kiosk: true,
                confirmation_creates_attendance: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_toml_round_trip() {
        let settings = Settings::default();
        let serialized = toml::to_string(&settings).unwrap();
        let parsed: Settings = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.database.url, settings.database.url);
        assert_eq!(parsed.app.timezone, settings.app.timezone);
        assert_eq!(
            parsed.policy.self_register_grace_minutes,
            settings.policy.self_register_grace_minutes
        );
    }
}
