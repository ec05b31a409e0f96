//! Logging bootstrap

use tracing_subscriber::EnvFilter;

use crate::{ConfigError, LogConfig};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `config.filter`. Returns `Ok(false)` when a global
/// subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<bool, ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| ConfigError::Invalid(e.to_string()))?,
    };

    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_ok()
    };

    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        let config = LogConfig::default();
        let _ = init_logging(&config).unwrap();
        assert!(!init_logging(&config).unwrap());
    }
}
