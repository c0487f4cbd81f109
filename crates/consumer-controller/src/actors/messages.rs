//! Message types for the consumer actor.

use super::consumer::DEFAULT_PRIORITY;
use crate::channel::ChannelError;
use crate::errors::ConsumerError;
use bytes::Bytes;
use common::types::{AppData, ConsumerId, ProducerId, TransportId};
use serde::Serialize;
use tokio::sync::oneshot;
use worker_protocol::encode::{
    encode_enable_trace_event_request, encode_set_preferred_layers_request,
    encode_set_priority_request,
};
use worker_protocol::types::RtpParameters;
use worker_protocol::{
    CodecError, ConsumerDump, ConsumerLayers, ConsumerScore, ConsumerTraceEventType,
    ConsumerType, MediaKind, Method, RtpStreamStats,
};

/// Everything needed to construct a consumer.
///
/// Identity and negotiated data are fixed for the consumer's lifetime.
#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    pub id: ConsumerId,
    pub transport_id: TransportId,
    pub producer_id: ProducerId,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    pub consumer_type: ConsumerType,
    pub app_data: AppData,
    pub paused: bool,
    pub producer_paused: bool,
    /// Initial score; defaults to `{10, 10, []}`.
    pub score: Option<ConsumerScore>,
    pub preferred_layers: Option<ConsumerLayers>,
}

impl ConsumerOptions {
    /// Options for an unpaused consumer with default score and no layers.
    #[must_use]
    pub fn new(
        id: ConsumerId,
        transport_id: TransportId,
        producer_id: ProducerId,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
        consumer_type: ConsumerType,
    ) -> Self {
        Self {
            id,
            transport_id,
            producer_id,
            kind,
            rtp_parameters,
            consumer_type,
            app_data: AppData::default(),
            paused: false,
            producer_paused: false,
            score: None,
            preferred_layers: None,
        }
    }

    #[must_use]
    pub fn with_app_data(mut self, app_data: AppData) -> Self {
        self.app_data = app_data;
        self
    }

    #[must_use]
    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    #[must_use]
    pub fn with_producer_paused(mut self, producer_paused: bool) -> Self {
        self.producer_paused = producer_paused;
        self
    }

    #[must_use]
    pub fn with_score(mut self, score: ConsumerScore) -> Self {
        self.score = Some(score);
        self
    }

    #[must_use]
    pub fn with_preferred_layers(mut self, layers: ConsumerLayers) -> Self {
        self.preferred_layers = Some(layers);
        self
    }
}

/// Snapshot of a consumer's mutable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerState {
    pub closed: bool,
    pub paused: bool,
    pub producer_paused: bool,
    pub priority: u32,
    pub score: ConsumerScore,
    pub preferred_layers: Option<ConsumerLayers>,
    pub current_layers: Option<ConsumerLayers>,
}

impl ConsumerState {
    pub(crate) fn from_options(options: &ConsumerOptions) -> Self {
        Self {
            closed: false,
            paused: options.paused,
            producer_paused: options.producer_paused,
            priority: DEFAULT_PRIORITY,
            score: options.score.clone().unwrap_or_default(),
            preferred_layers: options.preferred_layers,
            current_layers: None,
        }
    }

    /// Paused locally or by the producer.
    #[must_use]
    pub fn is_effectively_paused(&self) -> bool {
        self.paused || self.producer_paused
    }
}

/// Remote-backed operations a handle can request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Dump,
    GetStats,
    Pause,
    Resume,
    SetPreferredLayers(ConsumerLayers),
    SetPriority(u32),
    RequestKeyFrame,
    EnableTraceEvent(Vec<ConsumerTraceEventType>),
}

impl Operation {
    /// Worker method the operation is sent as.
    #[must_use]
    pub const fn method(&self) -> Method {
        match self {
            Operation::Dump => Method::ConsumerDump,
            Operation::GetStats => Method::ConsumerGetStats,
            Operation::Pause => Method::ConsumerPause,
            Operation::Resume => Method::ConsumerResume,
            Operation::SetPreferredLayers(_) => Method::ConsumerSetPreferredLayers,
            Operation::SetPriority(_) => Method::ConsumerSetPriority,
            Operation::RequestKeyFrame => Method::ConsumerRequestKeyFrame,
            Operation::EnableTraceEvent(_) => Method::ConsumerEnableTraceEvent,
        }
    }

    /// Request body, if the method carries one.
    pub fn encode_payload(&self) -> Result<Option<Bytes>, CodecError> {
        match self {
            Operation::SetPreferredLayers(layers) => {
                encode_set_preferred_layers_request(layers).map(Some)
            }
            Operation::SetPriority(priority) => Ok(Some(encode_set_priority_request(*priority))),
            Operation::EnableTraceEvent(types) => encode_enable_trace_event_request(types).map(Some),
            Operation::Dump
            | Operation::GetStats
            | Operation::Pause
            | Operation::Resume
            | Operation::RequestKeyFrame => Ok(None),
        }
    }
}

/// Result of a completed [`Operation`].
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutput {
    Dump(Box<ConsumerDump>),
    Stats(Vec<RtpStreamStats>),
    PreferredLayers(Option<ConsumerLayers>),
    Priority(u32),
    Ack,
}

pub(crate) type OperationReply = oneshot::Sender<Result<OperationOutput, ConsumerError>>;

/// Messages sent to the consumer actor.
#[derive(Debug)]
pub enum ConsumerMessage {
    /// Close locally and tell the worker (best effort).
    Close { respond_to: oneshot::Sender<()> },

    /// The owning transport is gone; close without a remote call.
    TransportClosed { respond_to: oneshot::Sender<()> },

    /// Snapshot of mutable state.
    GetState {
        respond_to: oneshot::Sender<ConsumerState>,
    },

    /// Issue a remote operation.
    Request {
        op: Operation,
        respond_to: OperationReply,
    },
}

/// Outcome of a remote request, posted back to the actor by its request task.
#[derive(Debug)]
pub(crate) struct Completion {
    pub op: Operation,
    pub outcome: Result<Option<Bytes>, ChannelError>,
    pub respond_to: OperationReply,
}
