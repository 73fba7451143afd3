//! Configuration management
//!
//! This module handles loading and parsing configuration for timetrack.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Timesheet configuration
    #[serde(default)]
    pub timesheet: TimesheetConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Header carrying the user id forwarded by the auth gateway
    #[serde(default = "default_user_header")]
    pub user_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            user_header: default_user_header(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_user_header() -> String {
    "x-user-id".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/timetrack.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Largest offset accepted for the timesheet reference timezone (UTC+14:00)
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Timesheet configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimesheetConfig {
    /// Offset of the reference timezone used to cut days, in minutes east of UTC
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl TimesheetConfig {
    /// Reference timezone for date ranges
    pub fn offset(&self) -> anyhow::Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "timesheet.utc_offset_minutes out of range: {}",
                    self.utc_offset_minutes
                ))
                .into()
            })
    }
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - TIMETRACK_SERVER_HOST
    /// - TIMETRACK_SERVER_PORT
    /// - TIMETRACK_SERVER_CORS_ORIGIN
    /// - TIMETRACK_SERVER_USER_HEADER
    /// - TIMETRACK_DATABASE_DRIVER
    /// - TIMETRACK_DATABASE_URL
    /// - TIMETRACK_TIMESHEET_UTC_OFFSET_MINUTES
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse fine but cannot be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.user_header.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "server.user_header cannot be empty".to_string(),
            ));
        }
        if !(-MAX_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&self.timesheet.utc_offset_minutes) {
            return Err(ConfigError::ValidationError(format!(
                "timesheet.utc_offset_minutes must be within +/-{}, got {}",
                MAX_UTC_OFFSET_MINUTES, self.timesheet.utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("TIMETRACK_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("TIMETRACK_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("TIMETRACK_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Ok(header) = std::env::var("TIMETRACK_SERVER_USER_HEADER") {
            self.server.user_header = header.to_lowercase();
        }

        // Database configuration
        if let Ok(driver) = std::env::var("TIMETRACK_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("TIMETRACK_DATABASE_URL") {
            self.database.url = url;
        }

        // Timesheet configuration
        if let Ok(offset) = std::env::var("TIMETRACK_TIMESHEET_UTC_OFFSET_MINUTES") {
            if let Ok(offset) = offset.parse::<i32>() {
                self.timesheet.utc_offset_minutes = offset;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches TIMETRACK_* variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
