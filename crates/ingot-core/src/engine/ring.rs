//! Lock-minimizing event intake buffer.
//!
//! The [`EventRing`] decouples the transport's delivery path from handler
//! execution: [`EventRing::submit`] runs on the transport's task, touches one
//! slot under a short lock and returns immediately, regardless of how fast
//! the consumer drains. A fixed slot count bounds memory; when the producer
//! laps the consumer, the oldest unconsumed slot is overwritten — the system
//! deliberately favors recency over completeness under overload.
//!
//! A single consumption loop wakes on a fixed interval (the *latency* knob),
//! inspects the next slot round-robin, skips it if empty and otherwise hands
//! the pending pair to the processing function; each item is processed on its
//! own task so a slow handler never stalls the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::integration::caller::ApiCaller;

/// One pending inbound payload and the capability able to answer it.
#[derive(Clone)]
pub struct Inbound {
    /// Raw payload as delivered by the transport.
    pub payload: String,
    /// Capability for answering this payload's events.
    pub caller: Arc<dyn ApiCaller>,
}

/// Fixed-size, overwrite-on-overflow intake ring.
pub struct EventRing {
    slots: Vec<Mutex<Option<Inbound>>>,
    write: AtomicUsize,
}

impl EventRing {
    /// Creates a ring with `capacity` slots.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Arc::new(Self {
            slots: (0..capacity).map(|_| Mutex::new(None)).collect(),
            write: AtomicUsize::new(0),
        })
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Publishes one inbound pair into the next slot.
    ///
    /// Never blocks the caller beyond a constant-time slot swap; if the slot
    /// still holds an unconsumed pair, the older pair is dropped.
    pub fn submit(&self, payload: impl Into<String>, caller: Arc<dyn ApiCaller>) {
        let index = self.write.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        let pending = self.slots[index].lock().replace(Inbound {
            payload: payload.into(),
            caller,
        });
        if pending.is_some() {
            trace!(slot = index, "Ring slot overwritten before consumption");
        }
    }

    /// Takes the pair pending in `index`, if any.
    pub fn take_slot(&self, index: usize) -> Option<Inbound> {
        self.slots[index].lock().take()
    }

    /// Spawns the consumption loop.
    ///
    /// Every `latency` tick the loop advances its read cursor by one slot
    /// and, when the slot is non-empty, hands the pair to `process`. The
    /// processing function is expected to spawn its own task per item (the
    /// driver does); the loop itself never awaits handler work. The loop
    /// exits when `shutdown` is cancelled.
    pub fn spawn_consumer<F>(
        self: &Arc<Self>,
        latency: Duration,
        shutdown: CancellationToken,
        process: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn(Inbound) + Send + 'static,
    {
        let ring = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(latency);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut read = 0usize;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Event ring consumer shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let item = ring.take_slot(read);
                        read = (read + 1) % ring.capacity();
                        if let Some(item) = item {
                            process(item);
                        }
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for EventRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRing")
            .field("capacity", &self.slots.len())
            .field("submitted", &self.write.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::caller::NullCaller;
    use parking_lot::Mutex as PlMutex;

    fn caller() -> Arc<dyn ApiCaller> {
        Arc::new(NullCaller)
    }

    #[test]
    fn empty_slots_are_skipped_without_error() {
        let ring = EventRing::with_capacity(4);
        assert!(ring.take_slot(0).is_none());
        ring.submit("a", caller());
        assert_eq!(ring.take_slot(0).unwrap().payload, "a");
        assert!(ring.take_slot(0).is_none());
    }

    #[test]
    fn overload_keeps_the_latest_half() {
        // 256 tagged submissions into 128 slots: the writer laps the ring
        // exactly once, so each slot must hold the later tagged event and
        // draining yields 128..256 with no duplicates and no strays.
        let ring = EventRing::with_capacity(128);
        for i in 0..256 {
            ring.submit(format!("{i}"), caller());
        }

        let mut delivered = Vec::new();
        for slot in 0..128 {
            let item = ring.take_slot(slot).expect("slot must be full");
            delivered.push(item.payload.parse::<usize>().unwrap());
        }

        let expected: Vec<usize> = (128..256).collect();
        assert_eq!(delivered, expected);

        // Nothing is delivered twice.
        for slot in 0..128 {
            assert!(ring.take_slot(slot).is_none());
        }
    }

    #[test]
    fn no_loss_below_capacity() {
        let ring = EventRing::with_capacity(128);
        for i in 0..100 {
            ring.submit(format!("{i}"), caller());
        }
        let mut delivered = Vec::new();
        for slot in 0..128 {
            if let Some(item) = ring.take_slot(slot) {
                delivered.push(item.payload.parse::<usize>().unwrap());
            }
        }
        assert_eq!(delivered, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn consumer_drains_at_latency_cadence() {
        let ring = EventRing::with_capacity(8);
        let seen = Arc::new(PlMutex::new(Vec::new()));
        let shutdown = CancellationToken::new();

        let seen1 = seen.clone();
        let handle = ring.spawn_consumer(Duration::from_millis(10), shutdown.clone(), move |item| {
            seen1.lock().push(item.payload);
        });

        ring.submit("one", caller());
        ring.submit("two", caller());

        // Eight ticks cover every slot once.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*seen.lock(), vec!["one".to_string(), "two".to_string()]);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn consumer_stops_on_shutdown() {
        let ring = EventRing::with_capacity(4);
        let shutdown = CancellationToken::new();
        let handle = ring.spawn_consumer(Duration::from_millis(5), shutdown.clone(), |_| {});

        shutdown.cancel();
        handle.await.unwrap();

        // Submissions after shutdown stay in their slots.
        ring.submit("late", caller());
        assert!(ring.take_slot(0).is_some());
    }
}
