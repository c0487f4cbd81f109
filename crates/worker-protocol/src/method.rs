//! RPC methods and notification kinds exchanged with the media worker.

use std::fmt;

/// Request methods understood by the worker for consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Method {
    /// Full structural snapshot of a consumer
    ConsumerDump = 0x01,
    /// Current RTP stream counters
    ConsumerGetStats = 0x02,
    /// Stop forwarding media
    ConsumerPause = 0x03,
    /// Resume forwarding media
    ConsumerResume = 0x04,
    /// Select preferred spatial/temporal layers
    ConsumerSetPreferredLayers = 0x05,
    /// Set bandwidth allocation priority
    ConsumerSetPriority = 0x06,
    /// Ask the producer for a key frame
    ConsumerRequestKeyFrame = 0x07,
    /// Select which trace events the worker emits
    ConsumerEnableTraceEvent = 0x08,
    /// Close a consumer; routed to its owning transport
    TransportCloseConsumer = 0x09,
}

impl Method {
    /// All methods, in wire order.
    pub const ALL: [Method; 9] = [
        Method::ConsumerDump,
        Method::ConsumerGetStats,
        Method::ConsumerPause,
        Method::ConsumerResume,
        Method::ConsumerSetPreferredLayers,
        Method::ConsumerSetPriority,
        Method::ConsumerRequestKeyFrame,
        Method::ConsumerEnableTraceEvent,
        Method::TransportCloseConsumer,
    ];

    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::ConsumerDump => "consumer.dump",
            Method::ConsumerGetStats => "consumer.get_stats",
            Method::ConsumerPause => "consumer.pause",
            Method::ConsumerResume => "consumer.resume",
            Method::ConsumerSetPreferredLayers => "consumer.set_preferred_layers",
            Method::ConsumerSetPriority => "consumer.set_priority",
            Method::ConsumerRequestKeyFrame => "consumer.request_key_frame",
            Method::ConsumerEnableTraceEvent => "consumer.enable_trace_event",
            Method::TransportCloseConsumer => "transport.close_consumer",
        }
    }

    /// Wire code of the method.
    #[must_use]
    pub const fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification kinds pushed by the worker for a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Event {
    /// The associated producer was closed
    ProducerClose = 0,
    /// The associated producer was paused
    ProducerPause = 1,
    /// The associated producer was resumed
    ProducerResume = 2,
    /// Transmission score changed
    Score = 3,
    /// Currently forwarded layers changed
    LayersChange = 4,
    /// A trace event enabled via `enable_trace_event`
    Trace = 5,
    /// Raw RTP packet passthrough
    Rtp = 6,
}

impl Event {
    /// Map a wire code to a notification kind; `None` for unrecognized kinds.
    #[must_use]
    pub const fn from_wire(code: u8) -> Option<Self> {
        match code {
            0 => Some(Event::ProducerClose),
            1 => Some(Event::ProducerPause),
            2 => Some(Event::ProducerResume),
            3 => Some(Event::Score),
            4 => Some(Event::LayersChange),
            5 => Some(Event::Trace),
            6 => Some(Event::Rtp),
            _ => None,
        }
    }

    /// Wire code of the kind.
    #[must_use]
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Event::ProducerClose => "producer_close",
            Event::ProducerPause => "producer_pause",
            Event::ProducerResume => "producer_resume",
            Event::Score => "score",
            Event::LayersChange => "layers_change",
            Event::Trace => "trace",
            Event::Rtp => "rtp",
        }
    }
}
