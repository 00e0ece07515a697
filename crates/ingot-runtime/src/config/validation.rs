//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{IngotConfig, LogOutput};

/// Validates a loaded configuration.
///
/// Checks the constraints the schema types cannot express: a zero-capacity
/// ring, a zero consumer interval and file output with no file path are all
/// rejected before any component is constructed from the config.
pub fn validate_config(config: &IngotConfig) -> ConfigResult<()> {
    if config.engine.ring_capacity == 0 {
        return Err(ConfigError::validation("engine.ring_capacity must be > 0"));
    }
    if config.engine.latency_ms == 0 {
        return Err(ConfigError::validation("engine.latency_ms must be > 0"));
    }
    if config.engine.api_timeout_ms == 0 {
        return Err(ConfigError::validation("engine.api_timeout_ms must be > 0"));
    }
    if config.logging.output == LogOutput::File && config.logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.output = \"file\" requires logging.file_path",
        ));
    }
    Ok(())
}
