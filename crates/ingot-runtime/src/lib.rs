//! Ingot Runtime - Orchestration layer for the Ingot bot framework.
//!
//! This crate provides:
//! - Figment-layered configuration (`IngotConfig`, `ConfigLoader`)
//! - Logging configuration (`LoggingBuilder`, `init_from_config`)
//! - The event-flow driver wiring ring, registry and dispatcher (`Driver`)
//!
//! ```ignore
//! use ingot_runtime::{Driver, config::load_config, logging};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let driver = Driver::new(&config.engine);
//!     // register matchers through driver.engine("my-plugin")...
//!     driver.start()?;
//!
//!     // hand driver.on_event() to a transport, then run until Ctrl+C
//!     tokio::signal::ctrl_c().await?;
//!     driver.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod logging;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, EngineConfig, IngotConfig, LoggingConfig};
pub use driver::Driver;
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
