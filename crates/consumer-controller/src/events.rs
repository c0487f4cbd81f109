//! Event sets published by a consumer.
//!
//! Three closed sets, one bus each:
//! - [`ConsumerEvent`]: the consumer's public events
//! - [`InternalEvent`]: lifecycle signals for the owning transport
//! - [`ObserverEvent`]: mirror of lifecycle-relevant transitions for monitors

use crate::bus::{BusEvent, EventBus};
use bytes::Bytes;
use worker_protocol::{ConsumerLayers, ConsumerScore, ConsumerTraceEventData};

/// Public consumer events.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerEvent {
    /// The owning transport was closed.
    TransportClose,
    /// The associated producer was closed.
    ProducerClose,
    /// The associated producer was paused.
    ProducerPause,
    /// The associated producer was resumed.
    ProducerResume,
    /// Transmission score changed.
    Score(ConsumerScore),
    /// Forwarded layers changed; `None` when nothing is forwarded.
    LayersChange(Option<ConsumerLayers>),
    /// An enabled trace event.
    Trace(ConsumerTraceEventData),
    /// Raw RTP packet, numbered per consumer from 0.
    Rtp { sequence: u64, packet: Bytes },
}

impl BusEvent for ConsumerEvent {
    fn name(&self) -> &'static str {
        match self {
            ConsumerEvent::TransportClose => "transportclose",
            ConsumerEvent::ProducerClose => "producerclose",
            ConsumerEvent::ProducerPause => "producerpause",
            ConsumerEvent::ProducerResume => "producerresume",
            ConsumerEvent::Score(_) => "score",
            ConsumerEvent::LayersChange(_) => "layerschange",
            ConsumerEvent::Trace(_) => "trace",
            ConsumerEvent::Rtp { .. } => "rtp",
        }
    }
}

/// Signals for the transport that owns the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalEvent {
    /// Closed by its owner via `close()`.
    Close,
    /// Closed because the producer went away; the owner should forget it.
    ProducerClose,
}

impl BusEvent for InternalEvent {
    fn name(&self) -> &'static str {
        match self {
            InternalEvent::Close => "@close",
            InternalEvent::ProducerClose => "@producerclose",
        }
    }
}

/// Observer events for cross-cutting monitors.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    /// The consumer reached the closed state (any path).
    Close,
    /// The consumer became effectively paused.
    Pause,
    /// The consumer stopped being effectively paused.
    Resume,
    /// Transmission score changed.
    Score(ConsumerScore),
    /// Forwarded layers changed.
    LayersChange(Option<ConsumerLayers>),
    /// An enabled trace event.
    Trace(ConsumerTraceEventData),
}

impl BusEvent for ObserverEvent {
    fn name(&self) -> &'static str {
        match self {
            ObserverEvent::Close => "close",
            ObserverEvent::Pause => "pause",
            ObserverEvent::Resume => "resume",
            ObserverEvent::Score(_) => "score",
            ObserverEvent::LayersChange(_) => "layerschange",
            ObserverEvent::Trace(_) => "trace",
        }
    }
}

/// The three buses of one consumer, shared by its handle and its actor.
#[derive(Debug, Clone)]
pub struct ConsumerBuses {
    pub events: EventBus<ConsumerEvent>,
    pub internal: EventBus<InternalEvent>,
    pub observer: EventBus<ObserverEvent>,
}

impl ConsumerBuses {
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: EventBus::new("events"),
            internal: EventBus::new("internal"),
            observer: EventBus::new("observer"),
        }
    }
}

impl Default for ConsumerBuses {
    fn default() -> Self {
        Self::new()
    }
}
