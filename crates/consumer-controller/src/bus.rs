//! Typed publish/subscribe buses.
//!
//! Each bus carries one closed event enum. Emission never propagates a
//! listener failure to the emitter: a panicking listener is caught, logged,
//! counted and reported to the bus's error listeners, and delivery continues
//! with the remaining listeners.

use crate::observability::record_listener_error;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::error;

/// An event carried by an [`EventBus`].
pub trait BusEvent: fmt::Debug + Clone + Send + Sync + 'static {
    /// Stable event name used in logs and [`ListenerError`].
    fn name(&self) -> &'static str;
}

/// Report of a listener that failed while handling an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerError {
    /// Bus the listener was attached to
    pub bus: &'static str,
    /// Event being delivered
    pub event: &'static str,
    /// Panic message
    pub message: String,
}

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;
type ErrorListener = Arc<dyn Fn(&ListenerError) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
    error_listeners: Vec<(u64, ErrorListener)>,
    channels: Vec<mpsc::UnboundedSender<E>>,
}

impl<E> Registry<E> {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }
}

/// Typed event bus. Clones share the same listener set.
pub struct EventBus<E: BusEvent> {
    name: &'static str,
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: BusEvent> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E: BusEvent> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("name", &self.name)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<E: BusEvent> EventBus<E> {
    /// Create an empty bus; `name` labels logs and metrics.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
                error_listeners: Vec::new(),
                channels: Vec::new(),
            })),
        }
    }

    /// Bus name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, Registry<E>> {
        // Listeners never run under the lock, so a poisoned registry is still consistent.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a listener. It stays attached until the guard is dropped,
    /// or for the bus lifetime after [`ListenerGuard::detach`].
    pub fn subscribe<F>(&self, listener: F) -> ListenerGuard
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.lock();
            let id = registry.allocate_id();
            registry.listeners.push((id, Arc::new(listener)));
            id
        };

        let registry = Arc::downgrade(&self.registry);
        ListenerGuard::new(move || {
            if let Some(registry) = registry.upgrade() {
                let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
                registry.listeners.retain(|(existing, _)| *existing != id);
            }
        })
    }

    /// Receive every subsequent event on an unbounded channel.
    ///
    /// The receiver is detached automatically once dropped.
    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().channels.push(tx);
        rx
    }

    /// Attach a listener for [`ListenerError`] reports.
    pub fn on_listener_error<F>(&self, listener: F) -> ListenerGuard
    where
        F: Fn(&ListenerError) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.lock();
            let id = registry.allocate_id();
            registry.error_listeners.push((id, Arc::new(listener)));
            id
        };

        let registry = Arc::downgrade(&self.registry);
        ListenerGuard::new(move || {
            if let Some(registry) = registry.upgrade() {
                let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
                registry.error_listeners.retain(|(existing, _)| *existing != id);
            }
        })
    }

    /// Number of attached listeners and live channel subscribers.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        let registry = self.lock();
        registry.listeners.len()
            + registry
                .channels
                .iter()
                .filter(|tx| !tx.is_closed())
                .count()
    }

    /// Deliver `event` to every listener and channel subscriber.
    ///
    /// Never panics and never returns an error.
    pub fn safe_emit(&self, event: &E) {
        let listeners: Vec<Listener<E>> = {
            let mut registry = self.lock();
            registry
                .channels
                .retain(|tx| tx.send(event.clone()).is_ok());
            registry
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };

        for listener in listeners {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                self.report_listener_error(event, payload.as_ref());
            }
        }
    }

    fn report_listener_error(&self, event: &E, payload: &(dyn Any + Send)) {
        let failure = ListenerError {
            bus: self.name,
            event: event.name(),
            message: panic_message(payload),
        };

        error!(
            target: "consumer.events",
            bus = failure.bus,
            event = failure.event,
            error = %failure.message,
            "Event listener panicked"
        );
        record_listener_error(self.name);

        let error_listeners: Vec<ErrorListener> = self
            .lock()
            .error_listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in error_listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&failure))).is_err() {
                error!(
                    target: "consumer.events",
                    bus = failure.bus,
                    "Listener error handler panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Keeps a listener attached; dropping it detaches the listener.
#[must_use = "dropping the guard detaches the listener immediately"]
pub struct ListenerGuard {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ListenerGuard {
    fn new(remove: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// Keep the listener attached for the lifetime of the bus.
    pub fn detach(mut self) {
        self.remove = None;
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("attached", &self.remove.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Ping {
        One,
        Two,
    }

    impl BusEvent for Ping {
        fn name(&self) -> &'static str {
            match self {
                Ping::One => "one",
                Ping::Two => "two",
            }
        }
    }

    #[test]
    fn test_guard_drop_detaches_listener() {
        let bus = EventBus::<Ping>::new("test");
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let guard = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        bus.safe_emit(&Ping::One);
        assert_eq!(bus.listener_count(), 1);

        drop(guard);
        bus.safe_emit(&Ping::Two);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_detached_guard_keeps_listener() {
        let bus = EventBus::<Ping>::new("test");
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .detach();

        bus.safe_emit(&Ping::One);
        bus.safe_emit(&Ping::One);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let bus = EventBus::<Ping>::new("observer");
        let delivered = Arc::new(AtomicUsize::new(0));
        let reports = Arc::new(Mutex::new(Vec::new()));

        let _bad = bus.subscribe(|_| panic!("listener exploded"));
        let counter = Arc::clone(&delivered);
        let _good = bus.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let sink = Arc::clone(&reports);
        let _errors = bus.on_listener_error(move |failure| {
            sink.lock().unwrap().push(failure.clone());
        });

        bus.safe_emit(&Ping::Two);

        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        let reports = reports.lock().unwrap();
        assert_eq!(
            *reports,
            vec![ListenerError {
                bus: "observer",
                event: "two",
                message: "listener exploded".to_string(),
            }]
        );
    }

    #[test]
    fn test_channel_subscriber_receives_in_order() {
        let bus = EventBus::<Ping>::new("test");
        let mut rx = bus.subscribe_channel();

        bus.safe_emit(&Ping::One);
        bus.safe_emit(&Ping::Two);

        assert_eq!(rx.try_recv().unwrap(), Ping::One);
        assert_eq!(rx.try_recv().unwrap(), Ping::Two);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_channel_is_pruned() {
        let bus = EventBus::<Ping>::new("test");
        let rx = bus.subscribe_channel();
        assert_eq!(bus.listener_count(), 1);

        drop(rx);
        assert_eq!(bus.listener_count(), 0);
        bus.safe_emit(&Ping::One);
    }

    #[test]
    fn test_listener_can_subscribe_during_emit() {
        let bus = EventBus::<Ping>::new("test");
        let inner_bus = bus.clone();
        let _guard = bus.subscribe(move |_| {
            inner_bus.subscribe(|_| {}).detach();
        });

        // Listeners run outside the lock, so re-entrant subscription must not deadlock.
        bus.safe_emit(&Ping::One);
        assert_eq!(bus.listener_count(), 2);
    }
}
