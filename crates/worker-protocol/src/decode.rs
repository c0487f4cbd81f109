//! Discriminant-driven decoding of worker responses and notifications.
//!
//! Every decoder takes the optional body exactly as delivered by the channel.
//! A missing body where one is required is [`CodecError::MissingField`]; an
//! unrecognized discriminant is fatal to that payload only.

use crate::codec::{
    get_blob, get_bool, get_optional, get_string, get_u32, get_u64, get_u8, get_vec, CodecError,
    WireDecode,
};
use crate::dump::{
    BaseConsumerDump, ConsumerDump, LayeredConsumerDump, PipeConsumerDump, RtpStreamDump,
    SimpleConsumerDump,
};
use crate::stats::{RtpStreamRecvStats, RtpStreamSendStats, RtpStreamStats};
use crate::trace::{
    ConsumerTraceEventData, ConsumerTraceEventType, ConsumerTraceInfo, RtpPacketDump,
    TraceDirection,
};
use crate::types::{ConsumerLayers, ConsumerScore, ConsumerType};
use bytes::Bytes;

fn require(body: Option<Bytes>, field: &'static str) -> Result<Bytes, CodecError> {
    body.ok_or(CodecError::MissingField(field))
}

/// Decode a `consumer.dump` response.
///
/// # Errors
///
/// Returns [`CodecError::UnknownDiscriminant`] for an unknown consumer type
/// and [`CodecError::MissingField`] when a single-stream type carries no stream.
pub fn decode_dump_response(body: Option<Bytes>) -> Result<ConsumerDump, CodecError> {
    let mut buf = require(body, "dump")?;
    let consumer_type = ConsumerType::from_wire(get_u8(&mut buf)?)?;
    let base = BaseConsumerDump::decode(&mut buf)?;
    let mut streams = get_vec(&mut buf, RtpStreamDump::decode)?;

    match consumer_type {
        ConsumerType::Simple => {
            let rtp_stream = first_stream(&mut streams)?;
            Ok(ConsumerDump::Simple(SimpleConsumerDump { base, rtp_stream }))
        }
        ConsumerType::Simulcast => {
            let rtp_stream = first_stream(&mut streams)?;
            decode_layered(base, rtp_stream, &mut buf).map(ConsumerDump::Simulcast)
        }
        ConsumerType::Svc => {
            let rtp_stream = first_stream(&mut streams)?;
            decode_layered(base, rtp_stream, &mut buf).map(ConsumerDump::Svc)
        }
        ConsumerType::Pipe => Ok(ConsumerDump::Pipe(PipeConsumerDump {
            base,
            rtp_streams: streams,
        })),
    }
}

fn first_stream(streams: &mut Vec<RtpStreamDump>) -> Result<RtpStreamDump, CodecError> {
    if streams.is_empty() {
        return Err(CodecError::MissingField("rtp_stream"));
    }
    Ok(streams.swap_remove(0))
}

/// Layer fields shared by the simulcast and SVC bodies.
fn decode_layered(
    base: BaseConsumerDump,
    rtp_stream: RtpStreamDump,
    buf: &mut Bytes,
) -> Result<LayeredConsumerDump, CodecError> {
    Ok(LayeredConsumerDump {
        base,
        rtp_stream,
        preferred_spatial_layer: get_optional(buf, "preferred_spatial_layer", get_u8)?,
        target_spatial_layer: get_optional(buf, "target_spatial_layer", get_u8)?,
        current_spatial_layer: get_optional(buf, "current_spatial_layer", get_u8)?,
        preferred_temporal_layer: get_optional(buf, "preferred_temporal_layer", get_u8)?,
        target_temporal_layer: get_optional(buf, "target_temporal_layer", get_u8)?,
        current_temporal_layer: get_optional(buf, "current_temporal_layer", get_u8)?,
    })
}

/// Decode a `consumer.get_stats` response. An empty acknowledgement is an empty list.
///
/// # Errors
///
/// Returns [`CodecError::UnknownDiscriminant`] when an entry is neither
/// receive (0) nor send (1) statistics.
pub fn decode_stats_response(body: Option<Bytes>) -> Result<Vec<RtpStreamStats>, CodecError> {
    let Some(mut buf) = body else {
        return Ok(Vec::new());
    };
    get_vec(&mut buf, |b| match get_u8(b)? {
        0 => RtpStreamRecvStats::decode(b).map(RtpStreamStats::Recv),
        1 => RtpStreamSendStats::decode(b).map(RtpStreamStats::Send),
        value => Err(CodecError::UnknownDiscriminant {
            field: "stats_type",
            value,
        }),
    })
}

/// Decode a `score` notification.
///
/// # Errors
///
/// Returns an error if the body is missing or truncated.
pub fn decode_score_notification(body: Option<Bytes>) -> Result<ConsumerScore, CodecError> {
    let mut buf = require(body, "score")?;
    ConsumerScore::decode(&mut buf)
}

/// Decode a `layers_change` notification; `None` means no layer is being forwarded.
///
/// # Errors
///
/// Returns an error if the body is truncated.
pub fn decode_layers_change_notification(
    body: Option<Bytes>,
) -> Result<Option<ConsumerLayers>, CodecError> {
    decode_optional_layers(body)
}

/// Decode a `trace` notification.
///
/// # Errors
///
/// Returns [`CodecError::UnknownDiscriminant`] for an unknown trace type,
/// direction or info kind.
pub fn decode_trace_notification(
    body: Option<Bytes>,
) -> Result<ConsumerTraceEventData, CodecError> {
    let mut buf = require(body, "trace")?;
    let event_type = ConsumerTraceEventType::from_wire(get_u8(&mut buf)?)?;
    let timestamp = get_u64(&mut buf)?;
    let direction = TraceDirection::from_wire(get_u8(&mut buf)?)?;

    let info = match get_u8(&mut buf)? {
        0 => None,
        1 => Some(ConsumerTraceInfo::KeyFrame {
            rtp_packet: RtpPacketDump::decode(&mut buf)?,
            is_rtx: get_bool(&mut buf, "is_rtx")?,
        }),
        2 => Some(ConsumerTraceInfo::Fir {
            ssrc: get_u32(&mut buf)?,
        }),
        3 => Some(ConsumerTraceInfo::Pli {
            ssrc: get_u32(&mut buf)?,
        }),
        4 => Some(ConsumerTraceInfo::Rtp {
            rtp_packet: RtpPacketDump::decode(&mut buf)?,
            is_rtx: get_bool(&mut buf, "is_rtx")?,
        }),
        value => {
            return Err(CodecError::UnknownDiscriminant {
                field: "trace_info",
                value,
            })
        }
    };

    Ok(ConsumerTraceEventData {
        event_type,
        timestamp,
        direction,
        info,
    })
}

/// Decode an `rtp` passthrough notification into the raw packet bytes.
///
/// # Errors
///
/// Returns an error if the body is missing or the blob is truncated.
pub fn decode_rtp_notification(body: Option<Bytes>) -> Result<Bytes, CodecError> {
    let mut buf = require(body, "rtp")?;
    get_blob(&mut buf)
}

/// Decode a `consumer.set_preferred_layers` response.
///
/// Non-layered consumers answer with an empty acknowledgement, which decodes
/// to `None` just like an explicit absent value.
///
/// # Errors
///
/// Returns an error if the body is truncated.
pub fn decode_set_preferred_layers_response(
    body: Option<Bytes>,
) -> Result<Option<ConsumerLayers>, CodecError> {
    decode_optional_layers(body)
}

/// Decode a `consumer.set_priority` response carrying the effective priority.
///
/// # Errors
///
/// Returns an error if the body is missing or truncated.
pub fn decode_set_priority_response(body: Option<Bytes>) -> Result<u32, CodecError> {
    let mut buf = require(body, "priority")?;
    get_u32(&mut buf)
}

fn decode_optional_layers(body: Option<Bytes>) -> Result<Option<ConsumerLayers>, CodecError> {
    let Some(mut buf) = body else {
        return Ok(None);
    };
    get_optional(&mut buf, "layers", ConsumerLayers::decode)
}

/// Decode a `consumer.set_preferred_layers` request body.
///
/// # Errors
///
/// Returns an error if the body is missing or truncated.
pub fn decode_set_preferred_layers_request(
    body: Option<Bytes>,
) -> Result<ConsumerLayers, CodecError> {
    let mut buf = require(body, "layers")?;
    ConsumerLayers::decode(&mut buf)
}

/// Decode a `consumer.set_priority` request body.
///
/// # Errors
///
/// Returns an error if the body is missing or truncated.
pub fn decode_set_priority_request(body: Option<Bytes>) -> Result<u32, CodecError> {
    let mut buf = require(body, "priority")?;
    get_u32(&mut buf)
}

/// Decode a `consumer.enable_trace_event` request body.
///
/// # Errors
///
/// Returns an error if the body is missing or names an unknown trace type.
pub fn decode_enable_trace_event_request(
    body: Option<Bytes>,
) -> Result<Vec<ConsumerTraceEventType>, CodecError> {
    let mut buf = require(body, "types")?;
    get_vec(&mut buf, |b| {
        get_u8(b).and_then(ConsumerTraceEventType::from_wire)
    })
}

/// Decode a `transport.close_consumer` request body into the consumer id.
///
/// # Errors
///
/// Returns an error if the body is missing or the id is not UTF-8.
pub fn decode_close_consumer_request(body: Option<Bytes>) -> Result<String, CodecError> {
    let mut buf = require(body, "consumer_id")?;
    get_string(&mut buf, "consumer_id")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dump::RtpStreamParametersDump;
    use crate::encode::{
        encode_dump_response, encode_stats_response, encode_trace_notification,
    };
    use crate::stats::BaseRtpStreamStats;
    use crate::types::{MediaKind, RtpParameters};
    use bytes::{BufMut, BytesMut};

    fn base() -> BaseConsumerDump {
        BaseConsumerDump {
            id: "c1".to_string(),
            producer_id: "p1".to_string(),
            kind: MediaKind::Video,
            rtp_parameters: RtpParameters::default(),
            consumable_rtp_encodings: None,
            trace_event_types: vec![ConsumerTraceEventType::Pli],
            supported_codec_payload_types: vec![101],
            paused: false,
            producer_paused: true,
            priority: 1,
        }
    }

    fn stream(ssrc: u32) -> RtpStreamDump {
        RtpStreamDump {
            params: RtpStreamParametersDump {
                encoding_idx: 0,
                ssrc,
                payload_type: 101,
                mime_type: "video/VP8".to_string(),
                clock_rate: 90_000,
                rid: None,
                cname: "cname".to_string(),
                rtx_ssrc: None,
                rtx_payload_type: None,
                use_nack: true,
                use_pli: true,
                use_fir: false,
                use_in_band_fec: false,
                use_dtx: false,
                spatial_layers: 3,
                temporal_layers: 3,
            },
            score: 10,
            rtx_stream: None,
        }
    }

    fn layered() -> LayeredConsumerDump {
        LayeredConsumerDump {
            base: base(),
            rtp_stream: stream(1111),
            preferred_spatial_layer: Some(2),
            target_spatial_layer: Some(1),
            current_spatial_layer: None,
            preferred_temporal_layer: Some(2),
            target_temporal_layer: None,
            current_temporal_layer: None,
        }
    }

    #[test]
    fn test_unknown_consumer_type_is_decode_error() {
        let mut buf = BytesMut::new();
        buf.put_u8(9);
        let err = decode_dump_response(Some(buf.freeze())).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnknownDiscriminant {
                field: "consumer_type",
                value: 9
            }
        );
    }

    #[test]
    fn test_svc_uses_layered_body_with_own_tag() {
        let encoded = encode_dump_response(&ConsumerDump::Svc(layered())).unwrap();
        let dump = decode_dump_response(Some(encoded)).unwrap();

        assert_eq!(dump.consumer_type(), ConsumerType::Svc);
        let ConsumerDump::Svc(body) = &dump else {
            panic!("expected svc dump, got {dump:?}");
        };
        assert_eq!(body.preferred_spatial_layer, Some(2));
        assert_eq!(body.current_spatial_layer, None);

        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["type"], "svc");
        assert_eq!(json["producerPaused"], true);
    }

    #[test]
    fn test_simulcast_and_svc_share_field_layout() {
        let simulcast = encode_dump_response(&ConsumerDump::Simulcast(layered())).unwrap();
        let svc = encode_dump_response(&ConsumerDump::Svc(layered())).unwrap();

        // Only the leading type byte differs.
        assert_eq!(simulcast.len(), svc.len());
        assert_eq!(simulcast.slice(1..), svc.slice(1..));
        assert_eq!(simulcast.first(), Some(&1));
        assert_eq!(svc.first(), Some(&2));
    }

    #[test]
    fn test_pipe_keeps_stream_order() {
        let dump = ConsumerDump::Pipe(PipeConsumerDump {
            base: base(),
            rtp_streams: vec![stream(1), stream(2), stream(3)],
        });
        let encoded = encode_dump_response(&dump).unwrap();
        let ConsumerDump::Pipe(pipe) = decode_dump_response(Some(encoded)).unwrap() else {
            panic!("expected pipe dump");
        };
        let ssrcs: Vec<u32> = pipe.rtp_streams.iter().map(|s| s.params.ssrc).collect();
        assert_eq!(ssrcs, vec![1, 2, 3]);
    }

    #[test]
    fn test_simple_without_stream_is_missing_field() {
        let dump = ConsumerDump::Pipe(PipeConsumerDump {
            base: base(),
            rtp_streams: Vec::new(),
        });
        let encoded = encode_dump_response(&dump).unwrap();
        let mut raw = BytesMut::from(&encoded[..]);
        // Relabel the pipe payload as simple.
        raw[0] = 0;
        assert_eq!(
            decode_dump_response(Some(raw.freeze())),
            Err(CodecError::MissingField("rtp_stream"))
        );
    }

    #[test]
    fn test_missing_dump_body() {
        assert_eq!(
            decode_dump_response(None),
            Err(CodecError::MissingField("dump"))
        );
    }

    #[test]
    fn test_stats_unknown_direction() {
        let mut buf = BytesMut::new();
        buf.put_u16(1);
        buf.put_u8(7);
        assert_eq!(
            decode_stats_response(Some(buf.freeze())),
            Err(CodecError::UnknownDiscriminant {
                field: "stats_type",
                value: 7
            })
        );
    }

    #[test]
    fn test_stats_recv_and_send() {
        let stats_base = BaseRtpStreamStats {
            timestamp: 1_700_000_000,
            ssrc: 42,
            rtx_ssrc: None,
            rid: Some("r0".to_string()),
            kind: MediaKind::Video,
            mime_type: "video/VP8".to_string(),
            packets_lost: 3,
            fraction_lost: 0,
            packets_discarded: 0,
            packets_retransmitted: 1,
            packets_repaired: 1,
            nack_count: 2,
            nack_packet_count: 2,
            pli_count: 0,
            fir_count: 0,
            score: 9,
            round_trip_time: Some(12.5),
            rtx_packets_discarded: None,
        };
        let entries = vec![
            RtpStreamStats::Send(RtpStreamSendStats {
                base: stats_base.clone(),
                byte_count: 1000,
                packet_count: 10,
                bitrate: 8000,
            }),
            RtpStreamStats::Recv(RtpStreamRecvStats {
                base: stats_base,
                jitter: 4,
                byte_count: 2000,
                packet_count: 20,
                bitrate: 16_000,
                bitrate_by_layer: [("0.0".to_string(), 5000), ("1.0".to_string(), 11_000)]
                    .into_iter()
                    .collect(),
            }),
        ];

        let encoded = encode_stats_response(&entries).unwrap();
        let decoded = decode_stats_response(Some(encoded)).unwrap();
        assert_eq!(decoded, entries);

        let json = serde_json::to_value(&decoded).unwrap();
        assert_eq!(json[0]["type"], "outbound-rtp");
        assert_eq!(json[1]["type"], "inbound-rtp");
        assert_eq!(json[1]["bitrateByLayer"]["1.0"], 11_000);
    }

    #[test]
    fn test_stats_empty_ack() {
        assert!(decode_stats_response(None).unwrap().is_empty());
    }

    #[test]
    fn test_trace_without_info() {
        let mut buf = BytesMut::new();
        buf.put_u8(ConsumerTraceEventType::Nack.to_wire());
        buf.put_u64(123);
        buf.put_u8(1);
        buf.put_u8(0);
        let trace = decode_trace_notification(Some(buf.freeze())).unwrap();
        assert_eq!(trace.event_type, ConsumerTraceEventType::Nack);
        assert_eq!(trace.timestamp, 123);
        assert_eq!(trace.direction.as_str(), "out");
        assert!(trace.info.is_none());
    }

    #[test]
    fn test_trace_with_pli_info() {
        let data = ConsumerTraceEventData {
            event_type: ConsumerTraceEventType::Pli,
            timestamp: 5,
            direction: TraceDirection::In,
            info: Some(ConsumerTraceInfo::Pli { ssrc: 777 }),
        };
        let encoded = encode_trace_notification(&data).unwrap();
        let trace = decode_trace_notification(Some(encoded)).unwrap();
        assert_eq!(trace.direction.as_str(), "in");
        assert_eq!(trace.info, Some(ConsumerTraceInfo::Pli { ssrc: 777 }));
    }

    #[test]
    fn test_trace_unknown_info_kind() {
        let mut buf = BytesMut::new();
        buf.put_u8(0);
        buf.put_u64(1);
        buf.put_u8(0);
        buf.put_u8(5);
        assert_eq!(
            decode_trace_notification(Some(buf.freeze())),
            Err(CodecError::UnknownDiscriminant {
                field: "trace_info",
                value: 5
            })
        );
    }

    #[test]
    fn test_preferred_layers_empty_ack_clears() {
        assert_eq!(decode_set_preferred_layers_response(None).unwrap(), None);

        let mut buf = BytesMut::new();
        buf.put_u8(1);
        buf.put_u8(2);
        buf.put_u8(1);
        buf.put_u8(0);
        let layers = decode_set_preferred_layers_response(Some(buf.freeze())).unwrap();
        assert_eq!(
            layers,
            Some(ConsumerLayers {
                spatial_layer: 2,
                temporal_layer: Some(0)
            })
        );
    }

    #[test]
    fn test_rtp_blob() {
        let mut buf = BytesMut::new();
        buf.put_u32(3);
        buf.extend_from_slice(&[0x80, 0x60, 0x01]);
        let packet = decode_rtp_notification(Some(buf.freeze())).unwrap();
        assert_eq!(packet.as_ref(), &[0x80, 0x60, 0x01]);
    }
}
