//! The per-event dispatch loop.
//!
//! For one inbound event the loop merges the temporary store and the main
//! list into a single priority-ordered pass, then for each matcher runs:
//! group pre-hooks → rule chain → group mid-hooks → handler chain → group
//! post-hooks, honoring the block flag between matchers.
//!
//! Every matcher executes against a private copy of its mutable parts (see
//! [`Matcher`]); a panic inside a rule or handler is caught at the matcher
//! boundary, logged, and dispatch proceeds as if that matcher had not
//! matched. The ring-buffer consumer and other matchers are never affected.
//!
//! Each event is expected to be dispatched on its own task; across events no
//! ordering is guaranteed, within one event the order is deterministic.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{Instrument, Level, debug, error, span, trace};

use crate::engine::matcher::{Matcher, SharedMatcher};
use crate::engine::registry::Registry;
use crate::engine::rule::same_session;
use crate::engine::session::{Response, Resume, Session};
use crate::foundation::event::Event;
use crate::integration::caller::ApiCaller;

/// The central event dispatcher.
///
/// Holds the injected [`Registry`] and walks it per event. `Dispatcher` is
/// cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
}

impl Dispatcher {
    /// Creates a dispatcher over a registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Dispatches one event through the registry in priority order.
    ///
    /// Returns `true` if any matcher ran its handler chain.
    pub async fn dispatch(&self, caller: Arc<dyn ApiCaller>, event: Event) -> bool {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            post_type = event.post_type.as_str(),
            detail_type = %event.detail_type,
        );
        self.dispatch_inner(caller, Arc::new(event))
            .instrument(span)
            .await
    }

    async fn dispatch_inner(&self, caller: Arc<dyn ApiCaller>, event: Arc<Event>) -> bool {
        // Temporary matchers are the newest registrations, so at equal
        // priority they precede main-list matchers; the stable sort keeps
        // each store's internal order.
        let mut run_list = self.registry.snapshot_temps();
        run_list.extend(self.registry.snapshot());
        run_list.sort_by_key(|m| m.priority);

        let mut any_matched = false;
        for matcher in &run_list {
            let run = run_matcher(&self.registry, matcher, &event, &caller);
            match AssertUnwindSafe(run).catch_unwind().await {
                Ok(true) => {
                    any_matched = true;
                    if matcher.block {
                        debug!(matcher = matcher.id.0, "Blocking matcher matched, stopping dispatch");
                        break;
                    }
                }
                Ok(false) => {}
                Err(panic) => {
                    let reason = panic_message(&panic);
                    error!(matcher = matcher.id.0, %reason, "Matcher panicked, continuing dispatch");
                }
            }
        }
        any_matched
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish()
    }
}

/// Runs one matcher against one event; `true` means the handler chain ran.
async fn run_matcher(
    registry: &Arc<Registry>,
    matcher: &SharedMatcher,
    event: &Arc<Event>,
    caller: &Arc<dyn ApiCaller>,
) -> bool {
    let hooks = registry.group_hooks(matcher.group);

    // Private copy: the template state never sees this dispatch's writes.
    let mut state = matcher.init_state.clone();
    if let Some(Resume::Capture(key)) = &matcher.capture {
        state.set(key.clone(), event.plain_text());
    }
    let session = Arc::new(Session::new(event.clone(), caller.clone(), state));

    for hook in &hooks.pre {
        if !hook(session.clone()).await {
            trace!(matcher = matcher.id.0, "Pre-hook rejected, skipping matcher");
            return false;
        }
    }

    {
        let mut state = session.state();
        for rule in &matcher.rules {
            if !rule(event, &mut state) {
                return false;
            }
        }
    }

    for hook in &hooks.mid {
        if !hook(session.clone()).await {
            trace!(matcher = matcher.id.0, "Mid-hook rejected, skipping matcher");
            return false;
        }
    }

    // A temporary matcher must fire at most once: claim it out of the store
    // before running handlers, so a concurrent dispatch loses the race here.
    if matcher.temp && registry.claim_temp(matcher.id).is_none() {
        return false;
    }

    debug!(
        matcher = matcher.id.0,
        handlers = matcher.handlers.len(),
        "Rules passed, executing handler chain"
    );

    for (index, step) in matcher.handlers.iter().enumerate() {
        match step(session.clone()).await {
            Response::Continue => {}
            Response::Finish => break,
            Response::Suspend(resume) => {
                // The remaining chain (current handler included) becomes an
                // explicit continuation: a temporary matcher gated on the
                // same conversation, carrying the session's state.
                let continuation = Matcher::continuation(
                    matcher,
                    same_session(event.session_key()),
                    matcher.handlers[index..].to_vec(),
                    session.clone_state(),
                    resume,
                );
                trace!(
                    matcher = matcher.id.0,
                    continuation = continuation.id.0,
                    "Handler suspended, parking continuation"
                );
                registry.insert_temp(continuation);
                break;
            }
        }
    }

    for hook in &hooks.post {
        if !hook(session.clone()).await {
            break;
        }
    }

    true
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
