//! Engine layer - Matching and dispatch.
//!
//! This module contains the event-processing pipeline:
//! - Rule predicates and the event-type filter
//! - Matcher templates and the priority-ordered registry
//! - Handler sessions and the continue/finish/suspend response protocol
//! - The per-event dispatch loop with group hooks and panic isolation
//! - The lossy intake ring decoupling transports from handlers
//! - Future-event primitives for awaiting events from handler code
//! - Named engine scopes and the registration builder

pub mod builder;
pub mod dispatch;
pub mod future;
pub mod matcher;
pub mod registry;
pub mod ring;
pub mod rule;
pub mod session;

pub use builder::{Engine, MatcherBuilder, MatcherHandle};
pub use dispatch::Dispatcher;
pub use future::{EventFeed, FutureEvent};
pub use matcher::{GroupId, Matcher, MatcherId};
pub use registry::{GroupHooks, Registry};
pub use ring::{EventRing, Inbound};
pub use rule::{
    EventFilter, Rule, command, from_user, full_match, keyword, prefix, rule, same_session,
};
pub use session::{BoxFuture, Handler, Hook, Response, Resume, Session, got, handler, hook};
