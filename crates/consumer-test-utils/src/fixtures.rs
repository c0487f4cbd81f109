//! Test fixtures for consumer tests.
//!
//! Pre-built consumer options and worker payloads. Payload builders return
//! typed values; encode them with `worker_protocol::encode` when scripting
//! a [`crate::MockChannel`].

use common::types::{ConsumerId, ProducerId, TransportId};
use consumer_controller::actors::{ConsumerActor, ConsumerHandle, ConsumerOptions};
use consumer_controller::config::Config;
use std::collections::BTreeMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use worker_protocol::dump::{
    BaseConsumerDump, LayeredConsumerDump, PipeConsumerDump, RtpStreamDump,
    RtpStreamParametersDump, SimpleConsumerDump,
};
use worker_protocol::stats::{BaseRtpStreamStats, RtpStreamRecvStats, RtpStreamSendStats};
use worker_protocol::trace::{ConsumerTraceInfo, TraceDirection};
use worker_protocol::types::{
    RtcpParameters, RtpCodecParameters, RtpEncodingParameters, RtpParameters,
};
use worker_protocol::{
    ConsumerDump, ConsumerLayers, ConsumerScore, ConsumerTraceEventData, ConsumerTraceEventType,
    ConsumerType, MediaKind, RtpStreamStats,
};

use crate::MockChannel;

/// Negotiated parameters for a VP8 video consumer with `encodings` streams.
#[must_use]
pub fn video_rtp_parameters(encodings: u32) -> RtpParameters {
    RtpParameters {
        mid: Some("0".to_string()),
        codecs: vec![RtpCodecParameters {
            mime_type: "video/VP8".to_string(),
            payload_type: 101,
            clock_rate: 90_000,
            channels: None,
        }],
        encodings: (0..encodings)
            .map(|i| RtpEncodingParameters {
                ssrc: Some(1000 + i),
                rid: None,
                max_bitrate: Some(500_000 * (i + 1)),
                scalability_mode: None,
            })
            .collect(),
        rtcp: RtcpParameters {
            cname: Some("test-cname".to_string()),
            reduced_size: true,
        },
    }
}

/// Options for a fresh consumer of the given type.
///
/// Audio for `Simple`, video otherwise.
#[must_use]
pub fn consumer_options(consumer_type: ConsumerType) -> ConsumerOptions {
    let (kind, encodings) = match consumer_type {
        ConsumerType::Simple => (MediaKind::Audio, 1),
        ConsumerType::Simulcast => (MediaKind::Video, 3),
        ConsumerType::Svc | ConsumerType::Pipe => (MediaKind::Video, 1),
    };
    ConsumerOptions::new(
        ConsumerId::new(),
        TransportId::new(),
        ProducerId::new(),
        kind,
        video_rtp_parameters(encodings),
        consumer_type,
    )
}

/// Options for an unpaused simulcast video consumer.
#[must_use]
pub fn simulcast_options() -> ConsumerOptions {
    consumer_options(ConsumerType::Simulcast)
}

/// Spawn a consumer on `channel` with default config and a fresh token.
pub fn spawn_consumer(
    channel: &MockChannel,
    options: ConsumerOptions,
) -> (ConsumerHandle, JoinHandle<()>) {
    ConsumerActor::spawn(
        options,
        channel.as_transport(),
        &Config::default(),
        CancellationToken::new(),
    )
}

/// One RTP stream record with a score and no RTX stream.
#[must_use]
pub fn rtp_stream(encoding_idx: u32, score: u8) -> RtpStreamDump {
    RtpStreamDump {
        params: RtpStreamParametersDump {
            encoding_idx,
            ssrc: 2000 + encoding_idx,
            payload_type: 101,
            mime_type: "video/VP8".to_string(),
            clock_rate: 90_000,
            rid: None,
            cname: "test-cname".to_string(),
            rtx_ssrc: None,
            rtx_payload_type: None,
            use_nack: true,
            use_pli: true,
            use_fir: false,
            use_in_band_fec: false,
            use_dtx: false,
            spatial_layers: 1,
            temporal_layers: 3,
        },
        score,
        rtx_stream: None,
    }
}

fn base_dump(options: &ConsumerOptions) -> BaseConsumerDump {
    BaseConsumerDump {
        id: options.id.to_string(),
        producer_id: options.producer_id.to_string(),
        kind: options.kind,
        rtp_parameters: options.rtp_parameters.clone(),
        consumable_rtp_encodings: Some(options.rtp_parameters.encodings.clone()),
        trace_event_types: vec![ConsumerTraceEventType::KeyFrame],
        supported_codec_payload_types: vec![101],
        paused: options.paused,
        producer_paused: options.producer_paused,
        priority: 1,
    }
}

/// A dump matching `options`' structural type.
#[must_use]
pub fn sample_dump(options: &ConsumerOptions) -> ConsumerDump {
    let base = base_dump(options);
    let layered = |base| LayeredConsumerDump {
        base,
        rtp_stream: rtp_stream(0, 10),
        preferred_spatial_layer: Some(2),
        target_spatial_layer: Some(1),
        current_spatial_layer: Some(1),
        preferred_temporal_layer: Some(2),
        target_temporal_layer: None,
        current_temporal_layer: None,
    };
    match options.consumer_type {
        ConsumerType::Simple => ConsumerDump::Simple(SimpleConsumerDump {
            base,
            rtp_stream: rtp_stream(0, 10),
        }),
        ConsumerType::Simulcast => ConsumerDump::Simulcast(layered(base)),
        ConsumerType::Svc => ConsumerDump::Svc(layered(base)),
        ConsumerType::Pipe => ConsumerDump::Pipe(PipeConsumerDump {
            base,
            rtp_streams: vec![rtp_stream(0, 10), rtp_stream(1, 7), rtp_stream(2, 3)],
        }),
    }
}

fn base_stats(kind: MediaKind, ssrc: u32) -> BaseRtpStreamStats {
    BaseRtpStreamStats {
        timestamp: 1_700_000_000_000,
        ssrc,
        rtx_ssrc: None,
        rid: None,
        kind,
        mime_type: "video/VP8".to_string(),
        packets_lost: 3,
        fraction_lost: 1,
        packets_discarded: 0,
        packets_retransmitted: 2,
        packets_repaired: 1,
        nack_count: 4,
        nack_packet_count: 6,
        pli_count: 1,
        fir_count: 0,
        score: 9,
        round_trip_time: Some(12.5),
        rtx_packets_discarded: None,
    }
}

/// One send-stats record followed by one receive-stats record.
#[must_use]
pub fn sample_stats() -> Vec<RtpStreamStats> {
    let mut bitrate_by_layer = BTreeMap::new();
    bitrate_by_layer.insert("0.0".to_string(), 150_000);
    bitrate_by_layer.insert("1.0".to_string(), 450_000);

    vec![
        RtpStreamStats::Send(RtpStreamSendStats {
            base: base_stats(MediaKind::Video, 2000),
            byte_count: 1_048_576,
            packet_count: 900,
            bitrate: 600_000,
        }),
        RtpStreamStats::Recv(RtpStreamRecvStats {
            base: base_stats(MediaKind::Video, 3000),
            jitter: 7,
            byte_count: 2_097_152,
            packet_count: 1800,
            bitrate: 600_000,
            bitrate_by_layer,
        }),
    ]
}

#[must_use]
pub fn sample_score(score: u8) -> ConsumerScore {
    ConsumerScore {
        score,
        producer_score: 10,
        producer_scores: vec![10, 8, 6],
    }
}

#[must_use]
pub fn layers(spatial_layer: u8, temporal_layer: Option<u8>) -> ConsumerLayers {
    ConsumerLayers {
        spatial_layer,
        temporal_layer,
    }
}

/// An outgoing PLI trace.
#[must_use]
pub fn pli_trace() -> ConsumerTraceEventData {
    ConsumerTraceEventData {
        event_type: ConsumerTraceEventType::Pli,
        timestamp: 1_700_000_000_123,
        direction: TraceDirection::Out,
        info: Some(ConsumerTraceInfo::Pli { ssrc: 2000 }),
    }
}
