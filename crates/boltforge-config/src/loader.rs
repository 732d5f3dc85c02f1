//! Configuration loading and validation.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::BoltforgeConfig;

const MAX_SIMULATED_LATENCY_MS: u64 = 60_000;
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<BoltforgeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: BoltforgeConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &BoltforgeConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }

    if config.executor.simulated_latency_ms > MAX_SIMULATED_LATENCY_MS {
        return Err(ConfigError::Invalid(format!(
            "executor.simulated_latency_ms must be <= {}",
            MAX_SIMULATED_LATENCY_MS
        )));
    }

    let level = config.observability.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::Invalid(format!(
            "observability.log_level '{}' is not one of {}",
            config.observability.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    if let Some(path) = &config.observability.log_file {
        if path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "observability.log_file must not be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}
