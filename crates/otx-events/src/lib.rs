//! Process-local typed publish/subscribe event bus.
//!
//! Each event family gets its own [`EventBus<E>`]: a registry of subscribers
//! ordered by an integer priority (low = earlier), dispatched synchronously
//! on the publishing thread. A panicking subscriber is caught and logged —
//! it never prevents the remaining subscribers from running.

mod events;

pub use events::*;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

/// Ordered subscriber list for one event type `E`.
///
/// Subscribers are sorted ascending by priority at registration time using a
/// stable sort, so subscribers sharing a priority keep registration order.
pub struct EventBus<E> {
    subscribers: Mutex<Vec<Subscriber<E>>>,
}

struct Subscriber<E> {
    priority: i32,
    name: &'static str,
    handler: Arc<dyn Fn(&E) + Send + Sync>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. `name` is used only for log output when the
    /// handler panics.
    pub fn subscribe<F>(&self, priority: i32, name: &'static str, handler: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut subs = self.subscribers.lock().expect("event bus lock poisoned");
        subs.push(Subscriber {
            priority,
            name,
            handler: Arc::new(handler),
        });
        subs.sort_by_key(|s| s.priority);
    }

    /// Number of registered subscribers, for tests/diagnostics.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("event bus lock poisoned").len()
    }

    /// Dispatch `event` to every subscriber in priority order. A subscriber
    /// that panics is caught and logged; dispatch continues with the next
    /// subscriber.
    pub fn publish(&self, event: &E) {
        let (handlers, names): (Vec<Arc<dyn Fn(&E) + Send + Sync>>, Vec<&'static str>) = {
            let guard = self.subscribers.lock().expect("event bus lock poisoned");
            guard
                .iter()
                .map(|s| (s.handler.clone(), s.name))
                .unzip()
        };

        for (handler, name) in handlers.iter().zip(names.iter()) {
            let result = catch_unwind(AssertUnwindSafe(|| handler(event)));
            if let Err(panic) = result {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "<non-string panic payload>".to_string());
                tracing::error!(subscriber = name, error = %msg, "event bus subscriber panicked; swallowed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn subscribers_fire_in_priority_order() {
        let bus: EventBus<i32> = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        bus.subscribe(10, "second", move |_| o1.lock().unwrap().push("second"));
        let o2 = order.clone();
        bus.subscribe(0, "first", move |_| o2.lock().unwrap().push("first"));
        let o3 = order.clone();
        bus.subscribe(20, "third", move |_| o3.lock().unwrap().push("third"));

        bus.publish(&1);

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn same_priority_keeps_registration_order() {
        let bus: EventBus<i32> = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = order.clone();
        bus.subscribe(5, "a", move |_| o1.lock().unwrap().push("a"));
        let o2 = order.clone();
        bus.subscribe(5, "b", move |_| o2.lock().unwrap().push("b"));

        bus.publish(&1);

        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn panicking_subscriber_does_not_block_the_rest() {
        let bus: EventBus<i32> = EventBus::new();
        let ran_after = Arc::new(AtomicI32::new(0));

        bus.subscribe(0, "boom", |_| panic!("boom"));
        let ra = ran_after.clone();
        bus.subscribe(1, "survivor", move |_| {
            ra.store(1, Ordering::SeqCst);
        });

        bus.publish(&1);

        assert_eq!(ran_after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscriber_count_reflects_registrations() {
        let bus: EventBus<i32> = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.subscribe(0, "a", |_| {});
        bus.subscribe(0, "b", |_| {});
        assert_eq!(bus.subscriber_count(), 2);
    }
}
