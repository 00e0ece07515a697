//! # Ingot Core
//!
//! The matching and dispatch engine of the Ingot bot framework.
//!
//! This crate provides the building blocks between a chat transport and bot
//! logic: decoding inbound protocol events, buffering them through a lossy
//! intake ring, and routing each one through a priority-ordered registry of
//! matchers whose async handler chains can pause mid-conversation and resume
//! on a later event.
//!
//! ## Architecture Layers
//!
//! Ingot Core is organized into three architectural layers:
//!
//! ### Foundation Layer
//!
//! Core abstractions and type system:
//! - **Event Model**: Decoded protocol events ([`Event`], [`PostType`])
//! - **Message Body**: Typed message segments ([`Message`], [`Segment`])
//! - **Dispatch State**: The typed key/value bag handlers share ([`State`])
//!
//! ### Engine Layer
//!
//! Matching and dispatch:
//! - **Rules**: Predicates gating matchers ([`Rule`], [`EventFilter`])
//! - **Registry**: Priority-ordered matcher store ([`Registry`], [`Matcher`])
//! - **Dispatch**: The per-event loop ([`Dispatcher`], [`Response`])
//! - **Intake Ring**: Lossy transport decoupling ([`EventRing`])
//! - **Future Events**: Awaiting events from handlers ([`FutureEvent`])
//!
//! ### Integration Layer
//!
//! External system interfaces:
//! - **Api Boundary**: The outbound-call capability ([`ApiCaller`])
//!
//! ## Event flow
//!
//! ```text
//! ┌───────────┐     ┌───────────┐     ┌────────────┐     ┌─────────┐
//! │ Transport │────▶│ EventRing │────▶│ Dispatcher │────▶│ Matcher │
//! │ callback  │     │  (lossy)  │     │ (registry) │────▶│ Matcher │
//! └───────────┘     └───────────┘     └────────────┘────▶│ Matcher │
//!                                                        └─────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ingot_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Registry::new();
//!     let engine = Engine::new(registry.clone(), "echo");
//!
//!     engine
//!         .on_message()
//!         .rule(full_match("ping"))
//!         .handle([handler(|session: Arc<Session>| async move {
//!             let _ = session.send("pong").await;
//!             Response::Finish
//!         })]);
//!
//!     let dispatcher = Dispatcher::new(registry);
//!     // hand events to `dispatcher.dispatch(caller, event)` per inbound payload
//! }
//! ```

// Architectural layers
pub mod engine;
pub mod foundation;
pub mod integration;

// Re-export foundation types
pub use foundation::{
    ApiError, ApiResult, DecodeError, DecodeResult, Event, Message, PostType, Segment, SessionKey,
    State, StateError,
};

// Re-export engine types
pub use engine::{
    BoxFuture, Dispatcher, Engine, EventFeed, EventFilter, EventRing, FutureEvent, GroupHooks,
    GroupId, Handler, Hook, Inbound, Matcher, MatcherBuilder, MatcherHandle, MatcherId, Registry,
    Response, Resume, Rule, Session, command, from_user, full_match, got, handler, hook, keyword,
    prefix, rule, same_session,
};

// Re-export integration types
pub use integration::{ApiCaller, NullCaller};

/// Prelude for common imports.
pub mod prelude {
    pub use super::engine::{
        Dispatcher, Engine, EventFilter, EventRing, FutureEvent, MatcherHandle, Registry, Response,
        Session, full_match, got, handler, hook, keyword, prefix, rule,
    };
    pub use super::foundation::{Event, Message, PostType, Segment, SessionKey, State};
    pub use super::integration::{ApiCaller, NullCaller};
}
