//! Configuration loader using figment.
//!
//! Sources are layered, later ones overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. Programmatic overrides ([`ConfigLoader::merge`])
//! 3. Configuration file (`ingot.toml` / `config.toml`, or an explicit path)
//! 4. Environment variables (`INGOT_*`)
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `INGOT_` prefix with `__` as separator:
//!
//! - `INGOT_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `INGOT_ENGINE__RING_CAPACITY=8192` → `engine.ring_capacity = 8192`
//!
//! # Example
//!
//! ```rust,ignore
//! use ingot_runtime::config::ConfigLoader;
//!
//! // Simple loading from default locations
//! let config = ConfigLoader::new().load()?;
//!
//! // Load from a specific file with env overrides
//! let config = ConfigLoader::new()
//!     .file("./config/ingot.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Serialized};
#[cfg(feature = "toml-config")]
use figment::providers::{Format, Toml};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::IngotConfig;
use super::validation::validate_config;

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<IngotConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from a specific file plus the usual env layer.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<IngotConfig> {
    ConfigLoader::new().file(path).load()
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    /// User-provided programmatic overrides.
    figment: Figment,
    /// Search paths for configuration files.
    search_paths: Vec<PathBuf>,
    /// Whether to load environment variables.
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables the environment variable layer.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: IngotConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<IngotConfig> {
        let figment = self.build_figment()?;

        let config: IngotConfig = figment.extract().map_err(|e| {
            ConfigError::ParseError(format!("Failed to extract configuration: {e}"))
        })?;
        validate_config(&config)?;

        debug!(
            logging_level = %config.logging.level,
            ring_capacity = config.engine.ring_capacity,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Builds the figment instance with all sources.
    fn build_figment(mut self) -> ConfigResult<Figment> {
        // Start with defaults, then programmatic overrides
        let mut figment = Figment::from(Serialized::defaults(IngotConfig::default()));
        let user_figment = std::mem::take(&mut self.figment);
        figment = figment.merge(user_figment);

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with INGOT_ prefix");
            figment = figment.merge(
                Env::prefixed("INGOT_")
                    .split("__")
                    .map(|key| key.as_str().replace("__", ".").into()),
            );
        }

        Ok(figment)
    }

    /// Merges a single config file, dispatching on file extension.
    ///
    /// Only extensions enabled via feature flags are accepted.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            _ => Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            ))),
        }
    }

    /// Resolves the effective list of search paths.
    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if self.search_paths.is_empty() {
            let mut paths = Vec::new();
            if let Ok(cwd) = std::env::current_dir() {
                paths.push(cwd);
            }
            if let Some(config_dir) = dirs::config_dir() {
                paths.push(config_dir.join("ingot"));
            }
            paths
        } else {
            self.search_paths.clone()
        }
    }

    /// Searches for and loads the first configuration file found.
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        #[cfg(feature = "toml-config")]
        for search_path in self.resolve_search_paths() {
            for base_name in ["ingot.toml", "config.toml"] {
                let path = search_path.join(base_name);
                if path.exists() {
                    info!(path = %path.display(), "Loading configuration file");
                    return figment.merge(Toml::file(path));
                }
            }
        }

        warn!("No configuration file found, using defaults");
        figment
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{EngineConfig, LogLevel};

    #[test]
    fn default_config_loads() {
        let config = ConfigLoader::new().without_env().load().unwrap();

        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.engine.ring_capacity, 4096);
        assert_eq!(config.engine.latency_ms, 1);
    }

    #[test]
    fn programmatic_overrides_beat_defaults() {
        let config = ConfigLoader::new()
            .without_env()
            .merge(IngotConfig {
                engine: EngineConfig {
                    ring_capacity: 128,
                    ..EngineConfig::default()
                },
                ..IngotConfig::default()
            })
            .load()
            .unwrap();

        assert_eq!(config.engine.ring_capacity, 128);
        assert_eq!(config.engine.latency_ms, 1);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = ConfigLoader::new()
            .without_env()
            .file("/nonexistent/ingot.toml")
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let result = ConfigLoader::new()
            .without_env()
            .merge(IngotConfig {
                engine: EngineConfig {
                    ring_capacity: 0,
                    ..EngineConfig::default()
                },
                ..IngotConfig::default()
            })
            .load();
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }
}
