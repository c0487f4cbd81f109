//! Request encoders, plus response and notification encoders.
//!
//! The control plane only sends requests; the response/notification encoders
//! mirror [`crate::decode`] so scripted channels and fuzz seeds can produce
//! worker payloads.

use crate::codec::{put_blob, put_optional, put_string, put_vec, CodecError, WireEncode};
use crate::dump::{ConsumerDump, LayeredConsumerDump};
use crate::stats::RtpStreamStats;
use crate::trace::{ConsumerTraceEventData, ConsumerTraceEventType};
use crate::types::{ConsumerLayers, ConsumerScore};
use bytes::{BufMut, Bytes, BytesMut};

/// Encode the body of `consumer.set_preferred_layers`.
///
/// # Errors
///
/// Infallible for well-formed layers; kept fallible to match the codec traits.
pub fn encode_set_preferred_layers_request(layers: &ConsumerLayers) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(3);
    layers.encode(&mut buf)?;
    Ok(buf.freeze())
}

/// Encode the body of `consumer.set_priority`.
#[must_use]
pub fn encode_set_priority_request(priority: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(4);
    buf.put_u32(priority);
    buf.freeze()
}

/// Encode the body of `consumer.enable_trace_event`.
///
/// # Errors
///
/// Returns [`CodecError::FieldTooLong`] if more types than fit a `u16` count are given.
pub fn encode_enable_trace_event_request(
    types: &[ConsumerTraceEventType],
) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(2 + types.len());
    put_vec(&mut buf, "types", types, |b, v| {
        b.put_u8(v.to_wire());
        Ok(())
    })?;
    Ok(buf.freeze())
}

/// Encode the body of `transport.close_consumer`.
///
/// # Errors
///
/// Returns [`CodecError::FieldTooLong`] if the id does not fit a `u16` length.
pub fn encode_close_consumer_request(consumer_id: &str) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(2 + consumer_id.len());
    put_string(&mut buf, "consumer_id", consumer_id)?;
    Ok(buf.freeze())
}

/// Encode a `consumer.dump` response.
///
/// # Errors
///
/// Returns [`CodecError::FieldTooLong`] if any string or list overflows its prefix.
pub fn encode_dump_response(dump: &ConsumerDump) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::new();
    buf.put_u8(dump.consumer_type().to_wire());
    dump.base().encode(&mut buf)?;

    match dump {
        ConsumerDump::Simple(simple) => {
            put_vec(&mut buf, "rtp_streams", std::slice::from_ref(&simple.rtp_stream), |b, v| {
                v.encode(b)
            })?;
        }
        ConsumerDump::Simulcast(layered) | ConsumerDump::Svc(layered) => {
            encode_layered(layered, &mut buf)?;
        }
        ConsumerDump::Pipe(pipe) => {
            put_vec(&mut buf, "rtp_streams", &pipe.rtp_streams, |b, v| v.encode(b))?;
        }
    }

    Ok(buf.freeze())
}

fn encode_layered(layered: &LayeredConsumerDump, buf: &mut BytesMut) -> Result<(), CodecError> {
    put_vec(buf, "rtp_streams", std::slice::from_ref(&layered.rtp_stream), |b, v| {
        v.encode(b)
    })?;
    for layer in [
        layered.preferred_spatial_layer,
        layered.target_spatial_layer,
        layered.current_spatial_layer,
        layered.preferred_temporal_layer,
        layered.target_temporal_layer,
        layered.current_temporal_layer,
    ] {
        put_layer_index(buf, layer)?;
    }
    Ok(())
}

fn put_layer_index(buf: &mut BytesMut, layer: Option<u8>) -> Result<(), CodecError> {
    put_optional(buf, layer.as_ref(), |b, v| {
        b.put_u8(*v);
        Ok(())
    })
}

/// Encode a `consumer.get_stats` response.
///
/// # Errors
///
/// Returns [`CodecError::FieldTooLong`] if a field overflows its prefix.
pub fn encode_stats_response(stats: &[RtpStreamStats]) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::new();
    put_vec(&mut buf, "stats", stats, |b, entry| {
        b.put_u8(entry.to_wire());
        match entry {
            RtpStreamStats::Recv(recv) => recv.encode(b),
            RtpStreamStats::Send(send) => send.encode(b),
        }
    })?;
    Ok(buf.freeze())
}

/// Encode a `score` notification.
///
/// # Errors
///
/// Returns [`CodecError::FieldTooLong`] if there are more producer scores than fit a `u16`.
pub fn encode_score_notification(score: &ConsumerScore) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::new();
    score.encode(&mut buf)?;
    Ok(buf.freeze())
}

/// Encode a `layers_change` notification.
///
/// # Errors
///
/// Infallible for well-formed layers; kept fallible to match the codec traits.
pub fn encode_layers_change_notification(
    layers: Option<&ConsumerLayers>,
) -> Result<Bytes, CodecError> {
    encode_optional_layers(layers)
}

/// Encode a `trace` notification.
///
/// # Errors
///
/// Returns [`CodecError::FieldTooLong`] if a packet string field overflows its prefix.
pub fn encode_trace_notification(trace: &ConsumerTraceEventData) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::new();
    buf.put_u8(trace.event_type.to_wire());
    buf.put_u64(trace.timestamp);
    buf.put_u8(trace.direction.to_wire());
    match &trace.info {
        Some(info) => {
            buf.put_u8(info.to_wire());
            info.encode_body(&mut buf)?;
        }
        None => buf.put_u8(0),
    }
    Ok(buf.freeze())
}

/// Encode an `rtp` passthrough notification.
///
/// # Errors
///
/// Returns [`CodecError::FieldTooLong`] if the packet exceeds a `u32` length.
pub fn encode_rtp_notification(packet: &[u8]) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(4 + packet.len());
    put_blob(&mut buf, "rtp", packet)?;
    Ok(buf.freeze())
}

/// Encode a `consumer.set_preferred_layers` response.
///
/// # Errors
///
/// Infallible for well-formed layers; kept fallible to match the codec traits.
pub fn encode_set_preferred_layers_response(
    layers: Option<&ConsumerLayers>,
) -> Result<Bytes, CodecError> {
    encode_optional_layers(layers)
}

/// Encode a `consumer.set_priority` response.
#[must_use]
pub fn encode_set_priority_response(priority: u32) -> Bytes {
    encode_set_priority_request(priority)
}

fn encode_optional_layers(layers: Option<&ConsumerLayers>) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(4);
    put_optional(&mut buf, layers, |b, v| v.encode(b))?;
    Ok(buf.freeze())
}
