//! Configuration management for the Fertilizer Procurement Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with FPM__ prefix

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a free connection
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `fertilizer_procurement_backend=debug`
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("FPM__ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Self::builder(&environment)?
            // Override with environment variables (FPM__ prefix)
            .add_source(
                Environment::with_prefix("FPM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Defaults and the environment-specific file, without environment overrides
    pub fn builder(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let builder = config::Config::builder()
            .set_default("environment", environment)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("logging.filter", LoggingConfig::default().filter)?
            .set_default("logging.json", false)?
            .add_source(File::with_name(&format!("config/{}", environment)).required(false));

        Ok(builder)
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "fpm_report=info,fertilizer_procurement_backend=info,sqlx=warn".to_string(),
            json: false,
        }
    }
}
