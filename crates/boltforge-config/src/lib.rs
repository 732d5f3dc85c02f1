//! # Boltforge Config
//!
//! Single-file configuration for the boltforge engine.
//! A `boltforge.yaml` sets the parse mode, the executor's failure policy and
//! simulated latency, report semantics, and logging.

mod loader;

pub use loader::{load_config, ConfigError};

use std::time::Duration;

use boltforge_core::{EngineOptions, FailurePolicy, ParseMode};
use serde::Deserialize;

/// Top-level configuration schema.
#[derive(Debug, Clone, Deserialize)]
pub struct BoltforgeConfig {
    /// Config schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for BoltforgeConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            parser: ParserConfig::default(),
            executor: ExecutorConfig::default(),
            report: ReportConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl BoltforgeConfig {
    /// Engine options described by this config.
    pub fn to_engine_options(&self) -> EngineOptions {
        EngineOptions {
            parse_mode: self.parser.mode,
            failure_policy: self.executor.failure_policy,
            simulated_latency: Duration::from_millis(self.executor.simulated_latency_ms),
            fail_on_step_error: self.report.fail_on_step_error,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub mode: ParseMode,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Delay applied to every simulated file write or command.
    #[serde(default)]
    pub simulated_latency_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub fail_on_step_error: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
