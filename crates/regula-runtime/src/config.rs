//! Engine configuration

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use regula_state::{AdmissionPolicy, ConsolidationConfig};

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Logging configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Engine configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// A branch's versions must carry non-decreasing knowledge dates
    pub require_monotonic_knowledge: bool,
    /// Skip storing horizons whose timeline repeats the previous one
    pub collapse_unchanged_horizons: bool,
    /// Upper bound on draft records per trial
    pub max_trial_drafts: usize,
    pub log: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            require_monotonic_knowledge: true,
            collapse_unchanged_horizons: true,
            max_trial_drafts: 1024,
            log: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Every horizon stored, small trials
    pub fn strict() -> Self {
        EngineConfig {
            require_monotonic_knowledge: true,
            collapse_unchanged_horizons: false,
            max_trial_drafts: 256,
            log: LogConfig::default(),
        }
    }

    /// Accept backdated knowledge, large trials
    pub fn lenient() -> Self {
        EngineConfig {
            require_monotonic_knowledge: false,
            collapse_unchanged_horizons: true,
            max_trial_drafts: 4096,
            log: LogConfig::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_trial_drafts == 0 {
            return Err(ConfigError::Invalid("max_trial_drafts must be at least 1".to_string()));
        }
        if self.log.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log.filter must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn admission_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            require_monotonic_knowledge: self.require_monotonic_knowledge,
        }
    }

    pub fn consolidation_config(&self) -> ConsolidationConfig {
        ConsolidationConfig {
            collapse_unchanged_horizons: self.collapse_unchanged_horizons,
        }
    }
}
