//! Event recorders for ordered assertions on a bus.

use consumer_controller::bus::{BusEvent, EventBus};
use tokio::sync::mpsc;

/// Collects every event emitted on a bus after attaching.
#[derive(Debug)]
pub struct EventRecorder<E: BusEvent> {
    receiver: mpsc::UnboundedReceiver<E>,
}

impl<E: BusEvent> EventRecorder<E> {
    /// Start recording `bus`.
    #[must_use]
    pub fn attach(bus: &EventBus<E>) -> Self {
        Self {
            receiver: bus.subscribe_channel(),
        }
    }

    /// Events recorded since the last drain, in emission order.
    pub fn drain(&mut self) -> Vec<E> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Names of the drained events, handy for ordering assertions.
    pub fn drain_names(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(BusEvent::name).collect()
    }

    /// Assert nothing was emitted since the last drain.
    pub fn assert_empty(&mut self) {
        let events = self.drain();
        assert!(events.is_empty(), "unexpected events: {events:?}");
    }
}
