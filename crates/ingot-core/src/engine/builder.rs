//! Named matcher scopes and the registration builder.
//!
//! An [`Engine`] is a named scope over an injected [`Registry`]: matchers
//! registered through it carry its group id, its pre/mid/post hooks apply to
//! all of them, and [`Engine::delete`] tears the whole scope down at once.
//! Plugins each construct their own `Engine` and never touch the registry
//! containers directly.
//!
//! Registration reads as a builder chain:
//!
//! ```ignore
//! let handle = engine
//!     .on(EventFilter::post(PostType::Message))
//!     .rule(full_match("ping"))
//!     .priority(10)
//!     .block(true)
//!     .handle([handler(|s| async move {
//!         let _ = s.send("pong").await;
//!         Response::Finish
//!     })]);
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::engine::future::FutureEvent;
use crate::engine::matcher::{GroupId, Matcher, MatcherId};
use crate::engine::registry::Registry;
use crate::engine::rule::{EventFilter, Rule};
use crate::engine::session::{Handler, Hook};
use crate::foundation::state::State;

/// A named registration scope owning matchers and hooks.
pub struct Engine {
    name: String,
    group: GroupId,
    registry: Arc<Registry>,
}

impl Engine {
    /// Creates a scope named `name` over `registry`.
    pub fn new(registry: Arc<Registry>, name: impl Into<String>) -> Self {
        let group = GroupId::next();
        registry.insert_group(group);
        let name = name.into();
        debug!(engine = %name, group = group.0, "Engine created");
        Self {
            name,
            group,
            registry,
        }
    }

    /// The scope's name, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scope's group id.
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Adds a hook run before rule evaluation of every owned matcher;
    /// returning `false` skips the matcher for that event.
    pub fn pre_hook(&self, hook: Hook) {
        self.registry.add_pre_hook(self.group, hook);
    }

    /// Adds a hook run after rules pass, before the handler chain;
    /// returning `false` skips the matcher for that event.
    pub fn mid_hook(&self, hook: Hook) {
        self.registry.add_mid_hook(self.group, hook);
    }

    /// Adds a hook run after the handler chain; returning `false` stops the
    /// remaining post-hooks for that event.
    pub fn post_hook(&self, hook: Hook) {
        self.registry.add_post_hook(self.group, hook);
    }

    /// Starts a matcher registration for events passing `filter`.
    pub fn on(&self, filter: EventFilter) -> MatcherBuilder {
        MatcherBuilder {
            registry: self.registry.clone(),
            group: Some(self.group),
            rules: vec![filter.into_rule()],
            priority: 0,
            block: false,
            temp: false,
            init_state: State::new(),
        }
    }

    /// Shorthand for [`on`](Self::on) with a message-event filter.
    pub fn on_message(&self) -> MatcherBuilder {
        self.on(EventFilter::post(crate::foundation::event::PostType::Message))
    }

    /// Describes awaited events within this scope's registry.
    pub fn future_event(&self, filter: EventFilter) -> FutureEvent {
        FutureEvent::new(self.registry.clone(), filter)
    }

    /// Tears down the scope: its hooks and every matcher it owns.
    pub fn delete(&self) {
        debug!(engine = %self.name, group = self.group.0, "Engine deleted");
        self.registry.remove_group(self.group);
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.name)
            .field("group", &self.group)
            .finish()
    }
}

/// Accumulates one matcher registration.
pub struct MatcherBuilder {
    registry: Arc<Registry>,
    group: Option<GroupId>,
    rules: Vec<Rule>,
    priority: i32,
    block: bool,
    temp: bool,
    init_state: State,
}

impl MatcherBuilder {
    /// Starts a scope-less registration directly on a registry.
    pub fn new(registry: Arc<Registry>, filter: EventFilter) -> Self {
        Self {
            registry,
            group: None,
            rules: vec![filter.into_rule()],
            priority: 0,
            block: false,
            temp: false,
            init_state: State::new(),
        }
    }

    /// Appends a rule to the chain.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets the priority; lower runs earlier.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the block flag.
    pub fn block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    /// Marks the matcher temporary: deleted after its first run.
    pub fn temp(mut self, temp: bool) -> Self {
        self.temp = temp;
        self
    }

    /// Seeds the template state cloned into every dispatch.
    pub fn state(mut self, state: State) -> Self {
        self.init_state = state;
        self
    }

    /// Registers the matcher with the given handler chain.
    pub fn handle(self, handlers: impl IntoIterator<Item = Handler>) -> MatcherHandle {
        let mut matcher = Matcher::new(self.rules, handlers.into_iter().collect())
            .with_priority(self.priority)
            .with_block(self.block)
            .with_temp(self.temp)
            .with_state(self.init_state);
        if let Some(group) = self.group {
            matcher = matcher.with_group(group);
        }
        let registry = self.registry;
        let id = if self.temp {
            registry.insert_temp(matcher)
        } else {
            registry.insert(matcher)
        };
        debug!(matcher = id.0, priority = self.priority, "Matcher registered");
        MatcherHandle { registry, id }
    }
}

/// Post-registration control over one matcher.
#[derive(Clone)]
pub struct MatcherHandle {
    registry: Arc<Registry>,
    id: MatcherId,
}

impl MatcherHandle {
    /// The matcher's registry identity.
    pub fn id(&self) -> MatcherId {
        self.id
    }

    /// Re-ranks the matcher at a new priority.
    ///
    /// The matcher re-enters the list as the newest registration among its
    /// new priority peers. No-op if already deleted.
    pub fn set_priority(&self, priority: i32) {
        self.registry.update(self.id, |m| m.priority = priority);
    }

    /// Changes the block flag in place. No-op if already deleted.
    pub fn set_block(&self, block: bool) {
        self.registry.update(self.id, |m| m.block = block);
    }

    /// Unregisters the matcher. Idempotent.
    pub fn delete(&self) {
        self.registry.remove(self.id);
    }

    /// Describes awaited events on the same registry.
    pub fn future_event(&self, filter: EventFilter) -> FutureEvent {
        FutureEvent::new(self.registry.clone(), filter)
    }
}

impl std::fmt::Debug for MatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatcherHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dispatch::Dispatcher;
    use crate::engine::rule::full_match;
    use crate::engine::session::{Response, handler, hook};
    use crate::foundation::event::{Event, PostType};
    use crate::foundation::message::Message;
    use crate::integration::caller::{ApiCaller, NullCaller};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn message_event(text: &str) -> Event {
        Event {
            time: 0,
            self_id: 1,
            post_type: PostType::Message,
            detail_type: "private".into(),
            sub_type: "friend".into(),
            message_id: 1,
            user_id: 10,
            group_id: 0,
            raw_message: text.into(),
            message: Message::from_text(text),
        }
    }

    fn caller() -> Arc<dyn ApiCaller> {
        Arc::new(NullCaller)
    }

    #[tokio::test]
    async fn builder_registers_and_handle_deletes() {
        let registry = Registry::new();
        let engine = Engine::new(registry.clone(), "test");
        let hits = Arc::new(AtomicUsize::new(0));

        let hits1 = hits.clone();
        let handle = engine
            .on_message()
            .rule(full_match("ping"))
            .handle([handler(move |_| {
                let hits = hits1.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Response::Finish
                }
            })]);

        let dispatcher = Dispatcher::new(registry.clone());
        dispatcher.dispatch(caller(), message_event("ping")).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        handle.delete();
        handle.delete();
        dispatcher.dispatch(caller(), message_event("ping")).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn set_priority_reranks_as_newest_peer() {
        let registry = Registry::new();
        let engine = Engine::new(registry.clone(), "test");
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for tag in ["a", "b"] {
            let order = order.clone();
            handles.push(engine.on_message().priority(1).handle([handler(
                move |_| {
                    let order = order.clone();
                    async move {
                        order.lock().push(tag);
                        Response::Finish
                    }
                },
            )]));
        }

        // "a" re-ranked to 1 again becomes the newest among equals.
        handles[0].set_priority(1);
        let dispatcher = Dispatcher::new(registry.clone());
        dispatcher.dispatch(caller(), message_event("x")).await;
        assert_eq!(*order.lock(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn engine_hooks_gate_owned_matchers_only() {
        let registry = Registry::new();
        let gated = Engine::new(registry.clone(), "gated");
        let open = Engine::new(registry.clone(), "open");
        let hits = Arc::new(AtomicUsize::new(0));

        gated.pre_hook(hook(|_| async move { false }));
        for engine in [&gated, &open] {
            let hits = hits.clone();
            engine.on_message().handle([handler(move |_| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Response::Finish
                }
            })]);
        }

        let dispatcher = Dispatcher::new(registry.clone());
        dispatcher.dispatch(caller(), message_event("x")).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn engine_delete_silences_the_scope() {
        let registry = Registry::new();
        let engine = Engine::new(registry.clone(), "doomed");
        let hits = Arc::new(AtomicUsize::new(0));

        let hits1 = hits.clone();
        engine.on_message().handle([handler(move |_| {
            let hits = hits1.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Response::Finish
            }
        })]);
        let hits2 = hits.clone();
        engine.on_message().temp(true).handle([handler(move |_| {
            let hits = hits2.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Response::Finish
            }
        })]);

        engine.delete();
        let dispatcher = Dispatcher::new(registry.clone());
        dispatcher.dispatch(caller(), message_event("x")).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
        assert_eq!(registry.temp_len(), 0);
    }
}
