//! Handler execution context and the response protocol.
//!
//! A [`Session`] is the private execution context of one matcher within one
//! dispatch: the event (shared, read-only), the dispatch-private [`State`]
//! and the transport capability that can answer the event. Handlers receive
//! it as `Arc<Session>` and report back to the dispatch loop with a
//! [`Response`].
//!
//! # Response protocol
//!
//! - [`Response::Continue`] — proceed to the next handler in the chain.
//! - [`Response::Finish`] — terminate the chain for this event; a temporary
//!   matcher is deleted now.
//! - [`Response::Suspend`] — park the remaining chain (current handler
//!   included) as a new temporary matcher gated by a same-session rule; the
//!   session's state travels with it. This is how "ask for the missing field
//!   and resume here" works without blocking a worker.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde_json::{Value, json};
use tracing::warn;

use crate::foundation::error::ApiResult;
use crate::foundation::event::{Event, PostType};
use crate::foundation::state::State;
use crate::integration::caller::ApiCaller;

/// Boxed future used by handler and hook signatures.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One step of a matcher's handler chain.
pub type Handler = Arc<dyn Fn(Arc<Session>) -> BoxFuture<'static, Response> + Send + Sync>;

/// A group cross-cutting hook; `false` skips/stops per its position.
pub type Hook = Arc<dyn Fn(Arc<Session>) -> BoxFuture<'static, bool> + Send + Sync>;

/// Wraps an async closure into a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Arc<Session>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |session| Box::pin(f(session)))
}

/// Wraps an async closure into a [`Hook`].
pub fn hook<F, Fut>(f: F) -> Hook
where
    F: Fn(Arc<Session>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    Arc::new(move |session| Box::pin(f(session)))
}

// =============================================================================
// Response protocol
// =============================================================================

/// What to do with the resuming event when a suspended chain wakes up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resume {
    /// Re-run the suspended chain as-is.
    Rerun,
    /// Write the resuming event's plain text into the given state key, then
    /// re-run. Used by [`got`] to fill the awaited field.
    Capture(String),
}

/// Control signal a handler step returns to the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Continue to the next handler in the chain.
    Continue,
    /// Terminate this matcher's chain for this event.
    Finish,
    /// Suspend the remaining chain as a temporary same-session matcher.
    Suspend(Resume),
}

// =============================================================================
// Session
// =============================================================================

/// Private execution context of one matcher dispatch.
pub struct Session {
    event: Arc<Event>,
    caller: Arc<dyn ApiCaller>,
    state: Mutex<State>,
}

impl Session {
    /// Creates a session over an event with the given initial state.
    pub fn new(event: Arc<Event>, caller: Arc<dyn ApiCaller>, state: State) -> Self {
        Self {
            event,
            caller,
            state: Mutex::new(state),
        }
    }

    /// The event being dispatched.
    pub fn event(&self) -> &Arc<Event> {
        &self.event
    }

    /// The transport capability that delivered the event.
    pub fn caller(&self) -> &Arc<dyn ApiCaller> {
        &self.caller
    }

    /// Locks and returns the dispatch state.
    ///
    /// The lock is held only within one handler step at a time; handlers run
    /// sequentially, so contention is limited to future-event forwarders.
    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock()
    }

    /// Convenience: the value under `key` as an owned string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.state.lock().get_str(key).map(str::to_owned)
    }

    /// Snapshot of the state, used when the chain suspends.
    pub fn clone_state(&self) -> State {
        self.state.lock().clone()
    }

    /// Sends a message back into the event's conversation scope.
    ///
    /// Builds a `send_msg` action addressed by the event's detail type and
    /// identifiers and issues it through the [`ApiCaller`].
    pub async fn send(&self, message: impl Into<String>) -> ApiResult<Value> {
        let message = message.into();
        let params = if self.event.group_id != 0 {
            json!({
                "message_type": "group",
                "group_id": self.event.group_id,
                "message": message,
            })
        } else {
            json!({
                "message_type": "private",
                "user_id": self.event.user_id,
                "message": message,
            })
        };
        self.caller.call("send_msg", params).await
    }

    /// Whether the session's event is a message event.
    pub fn is_message(&self) -> bool {
        self.event.post_type == PostType::Message
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("event", &self.event)
            .field("state_keys", &self.state.lock().len())
            .finish()
    }
}

// =============================================================================
// got — ask for a missing field and resume
// =============================================================================

/// Handler step that ensures `key` is present in the state.
///
/// If the key is already set (by an earlier rule, handler, or a previous
/// resume) the chain continues. Otherwise the prompt is sent into the
/// conversation and the chain suspends; the next same-session event's plain
/// text is captured into `key` before the chain re-runs, at which point this
/// step finds the key and passes through.
pub fn got(key: impl Into<String>, prompt: impl Into<String>) -> Handler {
    let key = key.into();
    let prompt = prompt.into();
    handler(move |session: Arc<Session>| {
        let key = key.clone();
        let prompt = prompt.clone();
        async move {
            if session.state().contains(&key) {
                return Response::Continue;
            }
            if let Err(err) = session.send(prompt).await {
                warn!(key = %key, error = %err, "Failed to send prompt for awaited field");
            }
            Response::Suspend(Resume::Capture(key))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::message::Message;
    use async_trait::async_trait;
    use parking_lot::Mutex as PlMutex;
    use tokio_test::assert_ok;

    fn private_event(user_id: i64, text: &str) -> Arc<Event> {
        Arc::new(Event {
            time: 0,
            self_id: 1,
            post_type: PostType::Message,
            detail_type: "private".into(),
            sub_type: "friend".into(),
            message_id: 1,
            user_id,
            group_id: 0,
            raw_message: text.into(),
            message: Message::from_text(text),
        })
    }

    struct RecordingCaller {
        calls: PlMutex<Vec<(String, Value)>>,
    }

    impl RecordingCaller {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: PlMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ApiCaller for RecordingCaller {
        async fn call(&self, action: &str, params: Value) -> ApiResult<Value> {
            self.calls.lock().push((action.to_string(), params));
            Ok(json!({"status": "ok"}))
        }
    }

    #[tokio::test]
    async fn send_addresses_private_scope() {
        let caller = RecordingCaller::new();
        let session = Session::new(private_event(42, "hi"), caller.clone(), State::new());
        tokio_test::assert_ok!(session.send("pong").await);

        let calls = caller.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "send_msg");
        assert_eq!(calls[0].1["message_type"], "private");
        assert_eq!(calls[0].1["user_id"], 42);
        assert_eq!(calls[0].1["message"], "pong");
    }

    #[tokio::test]
    async fn got_continues_when_key_present() {
        let caller = RecordingCaller::new();
        let mut state = State::new();
        state.set("echo", "already here");
        let session = Arc::new(Session::new(private_event(1, "x"), caller.clone(), state));

        let step = got("echo", "say something");
        assert_eq!(step(session).await, Response::Continue);
        assert!(caller.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn got_prompts_and_suspends_when_key_missing() {
        let caller = RecordingCaller::new();
        let session = Arc::new(Session::new(
            private_event(1, "x"),
            caller.clone(),
            State::new(),
        ));

        let step = got("echo", "say something");
        let response = step(session).await;
        assert_eq!(response, Response::Suspend(Resume::Capture("echo".into())));
        assert_eq!(caller.calls.lock().len(), 1);
    }
}
