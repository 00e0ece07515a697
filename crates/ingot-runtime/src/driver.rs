//! The event-flow driver.
//!
//! A [`Driver`] wires the engine's pieces together: it owns the [`Registry`],
//! the intake [`EventRing`] and a [`Dispatcher`] over that registry. A
//! transport gets the driver's [`submit`](Driver::submit) callback (or the
//! owned closure from [`on_event`](Driver::on_event)) and calls it per raw
//! payload; the driver's consumer loop decodes each payload and dispatches
//! the decoded event on its own task.
//!
//! Payloads that fail to decode are logged and dropped; a bad payload never
//! reaches handlers and never stops the loop.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ingot_core::engine::{Dispatcher, Engine, EventRing, Registry};
use ingot_core::foundation::Event;
use ingot_core::integration::ApiCaller;

use crate::config::EngineConfig;
use crate::error::{RuntimeError, RuntimeResult};

/// Owns the registry, the intake ring and the dispatch loop.
pub struct Driver {
    registry: Arc<Registry>,
    ring: Arc<EventRing>,
    dispatcher: Dispatcher,
    latency: Duration,
    api_timeout: Duration,
    shutdown: CancellationToken,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl Driver {
    /// Creates a driver from engine settings.
    pub fn new(config: &EngineConfig) -> Self {
        let registry = Registry::new();
        Self {
            ring: EventRing::with_capacity(config.ring_capacity),
            dispatcher: Dispatcher::new(registry.clone()),
            registry,
            latency: config.latency(),
            api_timeout: config.api_timeout(),
            shutdown: CancellationToken::new(),
            consumer: Mutex::new(None),
        }
    }

    /// The configured deadline for outbound protocol calls.
    ///
    /// The dispatch loop awaits [`ApiCaller`] calls without a deadline of
    /// its own; a transport reads this when constructing its caller and
    /// reports expiry as `ApiError::Timeout`.
    pub fn api_timeout(&self) -> Duration {
        self.api_timeout
    }

    /// The matcher registry, for direct registration.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Creates a named registration scope over the driver's registry.
    pub fn engine(&self, name: impl Into<String>) -> Engine {
        Engine::new(self.registry.clone(), name)
    }

    /// Accepts one raw payload from a transport. Non-blocking.
    pub fn submit(&self, payload: impl Into<String>, caller: Arc<dyn ApiCaller>) {
        self.ring.submit(payload, caller);
    }

    /// An owned submission callback for handing to a transport.
    pub fn on_event(&self) -> impl Fn(String, Arc<dyn ApiCaller>) + Send + Sync + 'static {
        let ring = self.ring.clone();
        move |payload, caller| ring.submit(payload, caller)
    }

    /// Starts the consumer loop.
    pub fn start(&self) -> RuntimeResult<()> {
        let mut consumer = self.consumer.lock();
        if consumer.is_some() {
            return Err(RuntimeError::AlreadyStarted);
        }

        let dispatcher = self.dispatcher.clone();
        let handle = self
            .ring
            .spawn_consumer(self.latency, self.shutdown.clone(), move |item| {
                let event = match Event::from_json(&item.payload) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!(error = %err, "Dropping undecodable payload");
                        return;
                    }
                };
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    dispatcher.dispatch(item.caller, event).await;
                });
            });
        *consumer = Some(handle);
        info!(latency_ms = self.latency.as_millis() as u64, "Driver started");
        Ok(())
    }

    /// Stops the consumer loop and waits for it to exit.
    ///
    /// Dispatches already spawned run to completion on their own tasks;
    /// payloads still sitting in the ring stay unprocessed.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.consumer.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
            debug!("Driver consumer stopped");
        }
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("registry", &self.registry)
            .field("ring", &self.ring)
            .field("latency", &self.latency)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ingot_core::engine::{Response, full_match, handler};
    use ingot_core::foundation::ApiResult;
    use ingot_core::integration::NullCaller;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> EngineConfig {
        EngineConfig {
            ring_capacity: 16,
            latency_ms: 1,
            api_timeout_ms: 1000,
        }
    }

    fn message_payload(text: &str) -> String {
        json!({
            "time": 1,
            "self_id": 1,
            "post_type": "message",
            "message_type": "private",
            "sub_type": "friend",
            "message_id": 1,
            "user_id": 10,
            "message": [{"type": "text", "data": {"text": text}}],
            "raw_message": text,
        })
        .to_string()
    }

    struct EchoCaller {
        sent: parking_lot::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ApiCaller for EchoCaller {
        async fn call(&self, _action: &str, params: Value) -> ApiResult<Value> {
            if let Some(message) = params["message"].as_str() {
                self.sent.lock().push(message.to_string());
            }
            Ok(json!({"status": "ok"}))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn submitted_payloads_reach_handlers() {
        let driver = Driver::new(&config());
        let hits = Arc::new(AtomicUsize::new(0));

        let hits1 = hits.clone();
        driver
            .engine("test")
            .on_message()
            .rule(full_match("ping"))
            .handle([handler(move |_| {
                let hits = hits1.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Response::Finish
                }
            })]);

        driver.start().unwrap();
        driver.submit(message_payload("ping"), Arc::new(NullCaller));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        driver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn undecodable_payloads_are_dropped_not_fatal() {
        let driver = Driver::new(&config());
        let hits = Arc::new(AtomicUsize::new(0));

        let hits1 = hits.clone();
        driver.engine("test").on_message().handle([handler(move |_| {
            let hits = hits1.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Response::Finish
            }
        })]);

        driver.start().unwrap();
        driver.submit("{not json", Arc::new(NullCaller));
        driver.submit(json!({"post_type": "alien"}).to_string(), Arc::new(NullCaller));
        driver.submit(message_payload("still alive"), Arc::new(NullCaller));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        driver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn responses_flow_back_through_the_caller() {
        let driver = Driver::new(&config());
        let caller = Arc::new(EchoCaller {
            sent: parking_lot::Mutex::new(Vec::new()),
        });

        driver
            .engine("echo")
            .on_message()
            .rule(full_match("ping"))
            .handle([handler(|session: Arc<ingot_core::Session>| async move {
                let _ = session.send("pong").await;
                Response::Finish
            })]);

        driver.start().unwrap();
        driver.submit(message_payload("ping"), caller.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*caller.sent.lock(), vec!["pong".to_string()]);
        driver.shutdown().await;
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let driver = Driver::new(&config());
        assert_eq!(driver.api_timeout(), Duration::from_millis(1000));
        driver.start().unwrap();
        assert!(matches!(driver.start(), Err(RuntimeError::AlreadyStarted)));
        driver.shutdown().await;
    }
}
