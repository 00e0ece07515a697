//! Awaiting future events from handler code.
//!
//! A [`FutureEvent`] is a reusable description of "events I want to hear
//! about": an event-type filter plus extra rules, a priority and a block
//! flag. From it a task can await exactly one matching event ([`next`]), an
//! open-ended stream ([`repeat`]) or a fixed count ([`take`]) — all without
//! holding a dispatch worker; delivery rides the same matcher machinery as
//! ordinary handlers.
//!
//! [`next`]: FutureEvent::next
//! [`repeat`]: FutureEvent::repeat
//! [`take`]: FutureEvent::take

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::engine::matcher::{Matcher, MatcherId};
use crate::engine::registry::Registry;
use crate::engine::rule::{EventFilter, Rule};
use crate::engine::session::{Response, Session, handler};
use crate::foundation::event::Event;

/// A reusable description of awaited events.
#[derive(Clone)]
pub struct FutureEvent {
    registry: Arc<Registry>,
    filter: EventFilter,
    rules: Vec<Rule>,
    priority: i32,
    block: bool,
}

impl FutureEvent {
    /// Describes awaited events over `registry` matching `filter`.
    pub fn new(registry: Arc<Registry>, filter: EventFilter) -> Self {
        Self {
            registry,
            filter,
            rules: Vec::new(),
            priority: 0,
            block: false,
        }
    }

    /// Adds a rule the awaited events must also pass.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Sets the priority of the listening matcher.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// When set, an awaited event stops lower-priority matchers.
    pub fn with_block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    fn rule_chain(&self) -> Vec<Rule> {
        let mut rules = vec![self.filter.clone().into_rule()];
        rules.extend(self.rules.iter().cloned());
        rules
    }

    /// Awaits exactly one matching event.
    ///
    /// Registers a temporary matcher; the first matching event is delivered
    /// and the matcher is gone, so no second event can ever arrive.
    pub async fn next(&self) -> Arc<Event> {
        let (tx, rx) = oneshot::channel::<Arc<Event>>();
        let slot = Arc::new(Mutex::new(Some(tx)));

        let deliver = handler(move |session: Arc<Session>| {
            let slot = slot.clone();
            async move {
                if let Some(tx) = slot.lock().take() {
                    // The receiver may have given up waiting; either way the
                    // temporary matcher is consumed.
                    let _ = tx.send(session.event().clone());
                }
                Response::Finish
            }
        });

        let matcher = Matcher::new(self.rule_chain(), vec![deliver])
            .with_priority(self.priority)
            .with_block(self.block)
            .with_temp(true);
        let id = self.registry.insert_temp(matcher);
        let _guard = ListenGuard {
            registry: self.registry.clone(),
            id,
        };

        // A temporary matcher fires at most once, so the sender side cannot
        // be dropped without sending unless the registry is torn down; treat
        // that as "wait forever" rather than surfacing an error to handlers.
        match rx.await {
            Ok(event) => event,
            Err(_) => std::future::pending().await,
        }
    }

    /// Opens an open-ended feed of matching events.
    ///
    /// Registers a persistent matcher forwarding every match into the
    /// returned [`EventFeed`]. The matcher lives until the feed is cancelled
    /// or dropped.
    pub fn repeat(&self) -> EventFeed {
        let (tx, rx) = mpsc::unbounded_channel::<Arc<Event>>();
        let token = CancellationToken::new();

        let forward_token = token.clone();
        let forward = handler(move |session: Arc<Session>| {
            let tx = tx.clone();
            let token = forward_token.clone();
            async move {
                // Checked on the dispatch side too so nothing is queued
                // after cancellation wins the race in `recv`.
                if !token.is_cancelled() {
                    let _ = tx.send(session.event().clone());
                }
                Response::Finish
            }
        });

        let matcher = Matcher::new(self.rule_chain(), vec![forward])
            .with_priority(self.priority)
            .with_block(self.block);
        let id = self.registry.insert(matcher);
        trace!(matcher = id.0, "Opened repeating event feed");

        EventFeed {
            rx,
            token,
            registry: self.registry.clone(),
            id,
        }
    }

    /// Awaits exactly `n` matching events, in arrival order.
    pub async fn take(&self, n: usize) -> Vec<Arc<Event>> {
        let mut feed = self.repeat();
        let mut events = Vec::with_capacity(n);
        while events.len() < n {
            match feed.recv().await {
                Some(event) => events.push(event),
                None => break,
            }
        }
        feed.cancel();
        events
    }
}

impl std::fmt::Debug for FutureEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FutureEvent")
            .field("filter", &self.filter)
            .field("extra_rules", &self.rules.len())
            .field("priority", &self.priority)
            .field("block", &self.block)
            .finish()
    }
}

/// Removes a listening matcher when the waiter goes away.
struct ListenGuard {
    registry: Arc<Registry>,
    id: MatcherId,
}

impl Drop for ListenGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

/// Receiving side of [`FutureEvent::repeat`].
///
/// After [`cancel`](EventFeed::cancel) returns, [`recv`](EventFeed::recv)
/// yields `None` — including for events already queued at cancellation time.
pub struct EventFeed {
    rx: mpsc::UnboundedReceiver<Arc<Event>>,
    token: CancellationToken,
    registry: Arc<Registry>,
    id: MatcherId,
}

impl EventFeed {
    /// Awaits the next forwarded event; `None` once cancelled.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        tokio::select! {
            // Cancellation beats a ready event, so a consumer that cancelled
            // never observes a straggler.
            biased;
            _ = self.token.cancelled() => None,
            event = self.rx.recv() => event,
        }
    }

    /// Stops the feed and unregisters its matcher.
    ///
    /// Idempotent; once this returns no further event is delivered.
    pub fn cancel(&mut self) {
        self.token.cancel();
        self.registry.remove(self.id);
    }
}

impl Drop for EventFeed {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for EventFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFeed")
            .field("matcher", &self.id)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::dispatch::Dispatcher;
    use crate::engine::rule::from_user;
    use crate::foundation::event::PostType;
    use crate::foundation::message::Message;
    use crate::integration::caller::{ApiCaller, NullCaller};

    fn message_event(user_id: i64, text: &str) -> Event {
        Event {
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
        }
    }

    fn caller() -> Arc<dyn ApiCaller> {
        Arc::new(NullCaller)
    }

    #[tokio::test]
    async fn next_yields_first_match_then_unregisters() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(registry.clone());
        let future = FutureEvent::new(registry.clone(), EventFilter::post(PostType::Message))
            .with_rule(from_user([7]));

        let wait = tokio::spawn(async move { future.next().await });
        // Let the listener register before dispatching.
        tokio::task::yield_now().await;
        while registry.temp_len() == 0 {
            tokio::task::yield_now().await;
        }

        dispatcher.dispatch(caller(), message_event(99, "wrong user")).await;
        assert_eq!(registry.temp_len(), 1);

        dispatcher.dispatch(caller(), message_event(7, "for me")).await;
        let event = wait.await.unwrap();
        assert_eq!(event.user_id, 7);
        assert_eq!(registry.temp_len(), 0);
    }

    #[tokio::test]
    async fn repeat_forwards_every_match_until_cancel() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(registry.clone());
        let future = FutureEvent::new(registry.clone(), EventFilter::post(PostType::Message));

        let mut feed = future.repeat();
        dispatcher.dispatch(caller(), message_event(1, "a")).await;
        dispatcher.dispatch(caller(), message_event(1, "b")).await;

        assert_eq!(feed.recv().await.unwrap().plain_text(), "a");
        assert_eq!(feed.recv().await.unwrap().plain_text(), "b");

        feed.cancel();
        assert!(registry.is_empty());
        assert!(feed.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancel_suppresses_already_queued_events() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(registry.clone());
        let future = FutureEvent::new(registry.clone(), EventFilter::post(PostType::Message));

        let mut feed = future.repeat();
        dispatcher.dispatch(caller(), message_event(1, "queued")).await;

        // The event sits in the channel, but cancellation wins.
        feed.cancel();
        assert!(feed.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropping_the_feed_unregisters_the_matcher() {
        let registry = Registry::new();
        let future = FutureEvent::new(registry.clone(), EventFilter::any());
        {
            let _feed = future.repeat();
            assert_eq!(registry.len(), 1);
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn take_collects_exactly_n_then_stops() {
        let registry = Registry::new();
        let dispatcher = Dispatcher::new(registry.clone());
        let future = FutureEvent::new(registry.clone(), EventFilter::post(PostType::Message));

        let reg = registry.clone();
        let wait = tokio::spawn(async move { future.take(2).await });
        while reg.len() == 0 {
            tokio::task::yield_now().await;
        }

        for text in ["one", "two", "three"] {
            dispatcher.dispatch(caller(), message_event(5, text)).await;
        }

        let events = wait.await.unwrap();
        let texts: Vec<String> = events.iter().map(|e| e.plain_text()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert!(registry.is_empty());
    }
}
