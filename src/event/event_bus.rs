// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus with ordered fan-out delivery.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::error::Result;

use super::event_log::DEFAULT_LOG_CAPACITY;
use super::{EventLog, GatewayEvent};

/// Default capacity of the internal delivery queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Boxed future returned by a subscriber handler.
type SubscriberFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// A registered subscriber handler.
type Subscriber = Arc<dyn Fn(GatewayEvent) -> SubscriberFuture + Send + Sync>;

/// Event bus connecting producers to subscribers with ordered fan-out.
///
/// Producers hand events to [`emit`](Self::emit), which appends them to the
/// bounded [`EventLog`] and places them on a single ordered delivery queue.
/// One dedicated pump task drains the queue and invokes every registered
/// subscriber **in sequence** for each event, awaiting each handler before
/// the next, and finishing the whole fan-out for event *N* before starting
/// event *N+1*. This gives every subscriber the same total delivery order at
/// the cost of one slow subscriber delaying all of them; handlers are
/// expected to stay fast and offload long work themselves.
///
/// A handler that returns `Err` (or panics) is logged and skipped; it never
/// prevents delivery of the same or later events to other subscribers.
///
/// The delivery queue is bounded: when subscribers fall behind and the queue
/// fills up, `emit` waits for space instead of dropping events.
///
/// `EventBus` is cheaply cloneable; clones share the same queue, log, and
/// subscriber list. The pump task exits once every handle has been dropped.
///
/// # Examples
///
/// ```
/// use homelink::event::{EventBus, GatewayEvent};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = EventBus::new();
///
/// bus.subscribe(|event: GatewayEvent| async move {
///     println!("observed {}", event.topic());
///     Ok(())
/// });
///
/// bus.emit(GatewayEvent::mqtt_in("home/x/status", json!({"power": "on"})))
///     .await;
/// assert_eq!(bus.tail(10).len(), 1);
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    subscribers: RwLock<Vec<Subscriber>>,
    log: EventLog,
    queue_tx: mpsc::Sender<GatewayEvent>,
}

impl EventBus {
    /// Creates a bus with default log and queue capacities.
    ///
    /// Must be called from within a tokio runtime: the pump task is spawned
    /// here.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacities(DEFAULT_LOG_CAPACITY, DEFAULT_QUEUE_CAPACITY)
    }

    /// Creates a bus with the given log and delivery-queue capacities.
    #[must_use]
    pub fn with_capacities(log_capacity: usize, queue_capacity: usize) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(queue_capacity.max(1));

        let inner = Arc::new(BusInner {
            subscribers: RwLock::new(Vec::new()),
            log: EventLog::with_capacity(log_capacity),
            queue_tx,
        });

        // The pump holds only a weak handle so the bus can be torn down by
        // dropping it; recv() then yields None and the task exits.
        let pump_inner = Arc::downgrade(&inner);
        tokio::spawn(pump(queue_rx, pump_inner));

        Self { inner }
    }

    /// Registers a handler invoked for every future emitted event.
    ///
    /// Handlers are invoked in registration order relative to other handlers.
    /// Registering the same handler twice yields two invocations per event.
    /// There is no unsubscribe; the list is append-only for the lifetime of
    /// the bus.
    ///
    /// Synchronous handlers register by returning a ready future:
    ///
    /// ```
    /// use homelink::event::{EventBus, GatewayEvent};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let bus = EventBus::new();
    /// bus.subscribe(|event: GatewayEvent| {
    ///     tracing::debug!(topic = %event.topic(), "seen");
    ///     std::future::ready(Ok(()))
    /// });
    /// # }
    /// ```
    pub fn subscribe<F, Fut>(&self, handler: F)
    where
        F: Fn(GatewayEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let subscriber: Subscriber =
            Arc::new(move |event| Box::pin(handler(event)) as SubscriberFuture);
        self.inner.subscribers.write().push(subscriber);
    }

    /// Emits an event onto the bus.
    ///
    /// The event is appended to the log (evicting the oldest entry at
    /// capacity) and enqueued for delivery. Completes once enqueued; does
    /// not wait for subscribers. When the delivery queue is full this waits
    /// for the pump to free space rather than dropping the event.
    pub async fn emit(&self, event: GatewayEvent) {
        self.inner.log.append(event.clone());
        if self.inner.queue_tx.send(event).await.is_err() {
            // Only reachable while the bus is being torn down.
            tracing::error!("event queue closed, dropping event");
        }
    }

    /// Returns the last `min(limit, len)` logged events, most-recent-last.
    ///
    /// Pure read over a point-in-time snapshot; safe to call concurrently
    /// with emission.
    #[must_use]
    pub fn tail(&self, limit: usize) -> Vec<GatewayEvent> {
        self.inner.log.tail(limit)
    }

    /// Returns the number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Returns the event log capacity.
    #[must_use]
    pub fn log_capacity(&self) -> usize {
        self.inner.log.capacity()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("logged", &self.inner.log.len())
            .finish()
    }
}

/// Drains the delivery queue, fanning each event out to all subscribers.
///
/// Subscribers are invoked sequentially per event; the fan-out for one event
/// finishes before the next event is taken. A failing or panicking handler
/// is logged and skipped so it cannot stall the pump.
async fn pump(mut queue_rx: mpsc::Receiver<GatewayEvent>, inner: Weak<BusInner>) {
    while let Some(event) = queue_rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        // Snapshot under the lock, deliver outside it; the list is
        // append-only so no registration is lost, it just takes effect
        // from the next event.
        let subscribers: Vec<Subscriber> = inner.subscribers.read().clone();
        drop(inner);

        for (index, subscriber) in subscribers.iter().enumerate() {
            match AssertUnwindSafe(subscriber(event.clone())).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::warn!(
                        subscriber = index,
                        error = %error,
                        "event subscriber failed, continuing fan-out"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        subscriber = index,
                        "event subscriber panicked, continuing fan-out"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;

    fn event(n: usize) -> GatewayEvent {
        GatewayEvent::mqtt_in("home/dev/status", json!({ "seq": n }))
    }

    fn seq_of(event: &GatewayEvent) -> u64 {
        event.payload()["seq"].as_u64().unwrap()
    }

    /// Polls until `cond` holds or a 2 s deadline passes.
    async fn wait_for(cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within deadline");
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event_in_order() {
        let bus = EventBus::new();
        let first: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let second: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&first);
        bus.subscribe(move |event| {
            sink.lock().unwrap().push(seq_of(&event));
            std::future::ready(Ok(()))
        });
        let sink = Arc::clone(&second);
        bus.subscribe(move |event| {
            let sink = Arc::clone(&sink);
            async move {
                // An async subscriber must observe the same order as a
                // synchronous one.
                tokio::task::yield_now().await;
                sink.lock().unwrap().push(seq_of(&event));
                Ok(())
            }
        });

        for n in 0..5 {
            bus.emit(event(n)).await;
        }

        let (a, b) = (Arc::clone(&first), Arc::clone(&second));
        wait_for(move || a.lock().unwrap().len() == 5 && b.lock().unwrap().len() == 5).await;

        assert_eq!(*first.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(*second.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn duplicate_subscription_is_invoked_twice() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0u32));

        let sink = Arc::clone(&count);
        let handler = move |_event: GatewayEvent| {
            *sink.lock().unwrap() += 1;
            std::future::ready(Ok(()))
        };
        bus.subscribe(handler.clone());
        bus.subscribe(handler);
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(event(0)).await;

        let sink = Arc::clone(&count);
        wait_for(move || *sink.lock().unwrap() == 2).await;
    }

    #[tokio::test]
    async fn failing_subscriber_does_not_block_delivery() {
        let bus = EventBus::new();
        let delivered: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(|event| {
            if seq_of(&event) == 1 {
                std::future::ready(Err(Error::Subscriber("boom".to_string())))
            } else {
                std::future::ready(Ok(()))
            }
        });
        let sink = Arc::clone(&delivered);
        bus.subscribe(move |event| {
            sink.lock().unwrap().push(seq_of(&event));
            std::future::ready(Ok(()))
        });

        for n in 0..3 {
            bus.emit(event(n)).await;
        }

        let sink = Arc::clone(&delivered);
        wait_for(move || sink.lock().unwrap().len() == 3).await;
        assert_eq!(*delivered.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn panicking_subscriber_does_not_stall_the_pump() {
        let bus = EventBus::new();
        let delivered: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(|event| {
            assert_ne!(seq_of(&event), 0, "panic on the first event");
            std::future::ready(Ok(()))
        });
        let sink = Arc::clone(&delivered);
        bus.subscribe(move |event| {
            sink.lock().unwrap().push(seq_of(&event));
            std::future::ready(Ok(()))
        });

        bus.emit(event(0)).await;
        bus.emit(event(1)).await;

        let sink = Arc::clone(&delivered);
        wait_for(move || sink.lock().unwrap().len() == 2).await;
        assert_eq!(*delivered.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn tail_works_without_subscribers() {
        let bus = EventBus::new();
        for n in 0..4 {
            bus.emit(event(n)).await;
        }

        let tail = bus.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(seq_of(&tail[0]), 2);
        assert_eq!(seq_of(&tail[1]), 3);
    }

    #[tokio::test]
    async fn log_eviction_beyond_capacity() {
        let bus = EventBus::with_capacities(3, 16);
        for n in 0..10 {
            bus.emit(event(n)).await;
        }

        let tail = bus.tail(10);
        assert_eq!(tail.len(), 3);
        assert_eq!(seq_of(&tail[0]), 7);
        assert_eq!(seq_of(&tail[2]), 9);
    }

    #[tokio::test]
    async fn clones_share_queue_and_log() {
        let bus = EventBus::new();
        let clone = bus.clone();

        let count = Arc::new(Mutex::new(0u32));
        let sink = Arc::clone(&count);
        clone.subscribe(move |_event| {
            *sink.lock().unwrap() += 1;
            std::future::ready(Ok(()))
        });
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(event(0)).await;
        assert_eq!(clone.tail(10).len(), 1);

        let sink = Arc::clone(&count);
        wait_for(move || *sink.lock().unwrap() == 1).await;
    }
}
