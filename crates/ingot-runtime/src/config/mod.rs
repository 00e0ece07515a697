//! Configuration module for the Ingot runtime.
//!
//! This module provides figment-layered configuration loading and validation
//! for logging and dispatch engine settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    EngineConfig, IngotConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SpanEventConfig,
};
pub use validation::validate_config;
