//! Snapshot subscribers.
//!
//! Callbacks receive an owned snapshot after every state change. A callback
//! that panics is logged and skipped; the others still get the snapshot.
//! The subscriber list is copied before delivery, so a callback may
//! subscribe or unsubscribe without deadlocking the bus.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::warn;

use crate::game::state::RaceSnapshot;

type Callback = Box<dyn FnMut(&RaceSnapshot) + Send>;
type SharedCallback = Arc<Mutex<Callback>>;

#[derive(Default)]
struct BusInner {
    next_id: u64,
    entries: Vec<(u64, SharedCallback)>,
    closed: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Fan-out of state snapshots to registered callbacks.
#[derive(Clone, Default)]
pub struct SubscriberBus {
    inner: Arc<Mutex<BusInner>>,
}

impl std::fmt::Debug for SubscriberBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("SubscriberBus")
            .field("subscribers", &inner.entries.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

impl SubscriberBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. On a closed bus the returned handle is inert
    /// and the callback is dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&RaceSnapshot) + Send + 'static,
    {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return Subscription::inert();
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.entries.push((id, Arc::new(Mutex::new(Box::new(callback)))));

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver a snapshot to every subscriber registered at call time.
    ///
    /// Returns how many callbacks completed without panicking.
    pub fn publish(&self, snapshot: &RaceSnapshot) -> usize {
        let entries: Vec<(u64, SharedCallback)> = lock(&self.inner).entries.clone();

        let mut delivered = 0;
        for (id, callback) in entries {
            let mut callback = lock(&callback);
            match catch_unwind(AssertUnwindSafe(|| (*callback)(snapshot))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(subscriber = id, room = %snapshot.room_id, "subscriber panicked"),
            }
        }
        delivered
    }

    /// Number of live subscribers.
    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    /// No subscribers?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every subscriber and refuse new ones.
    pub fn close(&self) {
        let mut inner = lock(&self.inner);
        inner.entries.clear();
        inner.closed = true;
    }

    /// Closed for new subscribers?
    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }
}

/// Handle returned by [`SubscriberBus::subscribe`].
///
/// Dropping the handle keeps the callback registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<Mutex<BusInner>>,
}

impl Subscription {
    fn inert() -> Self {
        Self { id: 0, bus: Weak::new() }
    }

    /// Subscriber id (0 for inert handles).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Is the callback still registered?
    pub fn is_active(&self) -> bool {
        self.bus
            .upgrade()
            .map(|inner| lock(&inner).entries.iter().any(|(id, _)| *id == self.id))
            .unwrap_or(false)
    }

    /// Remove the callback. Returns whether it was registered.
    pub fn unsubscribe(&self) -> bool {
        let Some(inner) = self.bus.upgrade() else {
            return false;
        };
        let mut inner = lock(&inner);
        let before = inner.entries.len();
        inner.entries.retain(|(id, _)| *id != self.id);
        inner.entries.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::RaceConfig;
    use crate::game::state::RaceState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn snapshot() -> RaceSnapshot {
        RaceState::new("room", 1, &RaceConfig::default())
    }

    fn counter(bus: &SubscriberBus) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = bus.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn test_publish_reaches_all() {
        let bus = SubscriberBus::new();
        let (a, _sa) = counter(&bus);
        let (b, _sb) = counter(&bus);

        assert_eq!(bus.publish(&snapshot()), 2);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = SubscriberBus::new();
        let (count, sub) = counter(&bus);

        bus.publish(&snapshot());
        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        bus.publish(&snapshot());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!sub.is_active());
    }

    #[test]
    fn test_drop_keeps_subscription() {
        let bus = SubscriberBus::new();
        let (count, sub) = counter(&bus);
        drop(sub);

        bus.publish(&snapshot());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_subscriber_isolated() {
        let bus = SubscriberBus::new();
        let _bad = bus.subscribe(|_| panic!("boom"));
        let (count, _sub) = counter(&bus);

        assert_eq!(bus.publish(&snapshot()), 1);
        assert_eq!(bus.publish(&snapshot()), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_from_inside_callback() {
        let bus = SubscriberBus::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicUsize::new(0));

        let (s, h) = (slot.clone(), hits.clone());
        let sub = bus.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = s.lock().unwrap().take() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        bus.publish(&snapshot());
        bus.publish(&snapshot());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_closed_bus_returns_inert_handle() {
        let bus = SubscriberBus::new();
        let (count, _sub) = counter(&bus);
        bus.close();

        let (late, late_sub) = counter(&bus);
        assert_eq!(late_sub.id(), 0);
        assert!(!late_sub.is_active());
        assert!(!late_sub.unsubscribe());

        assert_eq!(bus.publish(&snapshot()), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(late.load(Ordering::SeqCst), 0);
    }
}
