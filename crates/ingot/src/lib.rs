//! # Ingot
//!
//! An event matching and dispatch engine for OneBot-style chat bots.
//!
//! ## Overview
//!
//! Ingot sits between a chat transport and bot logic: raw protocol payloads
//! go into a lossy intake ring, a consumer loop decodes them, and each event
//! is routed through a priority-ordered registry of matchers whose async
//! handler chains can pause mid-conversation and resume on a later event.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌───────────┐     ┌─────────────────────────────────┐
//! │ Transport │────▶│  Driver   │────▶│ Matcher (rules → handler chain) │
//! │ callback  │     │ ring +    │────▶│ Matcher                         │
//! └───────────┘     │ dispatch  │────▶│ Matcher                         │
//!                   └───────────┘     └─────────────────────────────────┘
//! ```
//!
//! - **Driver**: owns the intake ring, the registry and the dispatch loop
//! - **Engine**: a named registration scope with pre/mid/post hooks
//! - **Matchers**: rule-gated async handler chains, priority ordered
//! - **Future events**: awaiting later events from inside handler code
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ingot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ingot::runtime::config::load_config()?;
//!     ingot::runtime::logging::init_from_config(&config.logging);
//!
//!     let driver = Driver::new(&config.engine);
//!     driver
//!         .engine("echo")
//!         .on_message()
//!         .rule(full_match("ping"))
//!         .handle([handler(|session: Arc<Session>| async move {
//!             let _ = session.send("pong").await;
//!             Response::Finish
//!         })]);
//!     driver.start()?;
//!
//!     // hand driver.on_event() to a transport, then run until Ctrl+C
//!     tokio::signal::ctrl_c().await?;
//!     driver.shutdown().await;
//!     Ok(())
//! }
//! ```

pub use ingot_core as core;
pub use ingot_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use ingot::prelude::*;
/// ```
pub mod prelude {
    // Driver - main entry point
    pub use ingot_runtime::Driver;

    // Registration and dispatch
    pub use ingot_core::engine::{
        Dispatcher, Engine, EventFilter, FutureEvent, MatcherHandle, Registry, Response, Session,
        full_match, got, handler, hook, keyword, prefix, rule,
    };

    // Event model
    pub use ingot_core::foundation::{Event, Message, PostType, Segment, SessionKey, State};

    // Transport boundary
    pub use ingot_core::integration::{ApiCaller, NullCaller};
}
