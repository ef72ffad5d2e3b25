//! Configuration management for the Flood Warning System
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with FWS_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::ModelVariant;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Risk model configuration
    pub model: ModelConfig,

    /// Prediction cycle tuning
    pub cycle: CycleConfig,

    /// Periodic cycle scheduling
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Model variant name: baseline, advanced or historical
    pub variant: String,

    /// Root directory for versioned model artifacts
    pub artifact_dir: String,

    /// Train at startup when no artifact exists for the variant
    pub train_on_startup: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CycleConfig {
    /// Wards evaluated concurrently
    pub max_concurrency: usize,

    /// Per-ward evaluation budget in seconds
    pub ward_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Run prediction cycles periodically
    pub enabled: bool,

    /// Minutes between cycles
    pub interval_minutes: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("FWS_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 8080)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("model.variant", "advanced")?
            .set_default("model.artifact_dir", "ml_models")?
            .set_default("model.train_on_startup", true)?
            .set_default("cycle.max_concurrency", 8)?
            .set_default("cycle.ward_timeout_secs", 30)?
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.interval_minutes", 120)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (FWS_ prefix)
            .add_source(
                Environment::with_prefix("FWS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.model.variant()?;
        Ok(config)
    }
}

impl ModelConfig {
    /// Resolve the configured variant name
    pub fn variant(&self) -> Result<ModelVariant, ConfigError> {
        ModelVariant::from_name(&self.variant).ok_or_else(|| {
            ConfigError::Message(format!(
                "unknown model variant '{}' (expected baseline, advanced or historical)",
                self.variant
            ))
        })
    }
}

impl CycleConfig {
    pub fn ward_timeout(&self) -> Duration {
        Duration::from_secs(self.ward_timeout_secs)
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1) * 60)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            ward_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_config(variant: &str) -> ModelConfig {
        ModelConfig {
            variant: variant.to_string(),
            artifact_dir: "ml_models".to_string(),
            train_on_startup: false,
        }
    }

    #[test]
    fn test_known_variants_resolve() {
        assert_eq!(model_config("baseline").variant().unwrap().version, "v2.0");
        assert_eq!(model_config("advanced").variant().unwrap().version, "v3.0-advanced");
        assert_eq!(model_config("historical").variant().unwrap().version, "v4.0-historical");
    }

    #[test]
    fn test_unknown_variant_rejected() {
        assert!(model_config("neural").variant().is_err());
    }

    #[test]
    fn test_durations() {
        assert_eq!(CycleConfig::default().ward_timeout(), Duration::from_secs(30));
        let scheduler = SchedulerConfig {
            enabled: true,
            interval_minutes: 0,
        };
        assert_eq!(scheduler.interval(), Duration::from_secs(60));
    }
}
