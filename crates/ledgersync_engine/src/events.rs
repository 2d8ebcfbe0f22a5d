//! Typed publish/subscribe channel for engine lifecycle events.

use ledgersync_model::SyncEvent;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

/// A synchronous event bus with isolated subscribers.
///
/// `publish` invokes every live subscriber in subscription order. A
/// panicking subscriber is caught and logged; the remaining subscribers
/// still receive the event and the publisher is unaffected.
///
/// The listener list is not locked while callbacks run, so a subscriber
/// may subscribe or drop subscriptions reentrantly.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener; events are delivered until the returned
    /// [`Subscription`] is closed or dropped.
    pub fn subscribe(&self, listener: impl Fn(&SyncEvent) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Delivers `event` to every live subscriber.
    pub fn publish(&self, event: &SyncEvent) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!(event = event.kind(), "event subscriber panicked");
            }
        }
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

/// Handle to a registered listener.
///
/// Dropping the handle (or calling [`Subscription::close`]) stops
/// delivery.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Explicitly closes the subscription.
    pub fn close(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter_listener(counter: Arc<AtomicUsize>) -> impl Fn(&SyncEvent) + Send + Sync {
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn publish_reaches_all_subscribers() {
        let bus = EventBus::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));

        let _sub_a = bus.subscribe(counter_listener(Arc::clone(&a)));
        let _sub_b = bus.subscribe(counter_listener(Arc::clone(&b)));

        bus.publish(&SyncEvent::DrainStarted);

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closed_subscription_stops_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let sub = bus.subscribe(counter_listener(Arc::clone(&count)));
        bus.publish(&SyncEvent::DrainStarted);
        sub.close();
        bus.publish(&SyncEvent::DrainStarted);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        {
            let _sub = bus.subscribe(counter_listener(Arc::clone(&count)));
            bus.publish(&SyncEvent::DrainStarted);
        }
        bus.publish(&SyncEvent::DrainStarted);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_subscriber_is_isolated() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let _bad = bus.subscribe(|_| panic!("subscriber bug"));
        let _good = bus.subscribe(counter_listener(Arc::clone(&count)));

        bus.publish(&SyncEvent::DrainStarted);
        bus.publish(&SyncEvent::DrainCompleted { failed: 0 });

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn subscriber_may_subscribe_reentrantly() {
        let bus = EventBus::new();
        let bus_clone = bus.clone();
        let nested: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));
        let nested_clone = Arc::clone(&nested);

        let _sub = bus.subscribe(move |_| {
            let sub = bus_clone.subscribe(|_| {});
            nested_clone.lock().push(sub);
        });

        bus.publish(&SyncEvent::DrainStarted);
        assert_eq!(bus.subscriber_count(), 2);
    }
}
