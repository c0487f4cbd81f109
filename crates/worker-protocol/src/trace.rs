//! Consumer trace events.

use crate::codec::{
    get_bool, get_optional, get_string, get_u16, get_u32, get_u64, get_u8, put_bool,
    put_optional, put_string, CodecError, WireDecode, WireEncode,
};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of trace events a consumer can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerTraceEventType {
    /// RTP key frame forwarded
    KeyFrame,
    /// RTCP FIR received or sent
    Fir,
    /// RTCP NACK received or sent
    Nack,
    /// RTCP PLI received or sent
    Pli,
    /// RTP packet forwarded
    Rtp,
}

impl ConsumerTraceEventType {
    /// Name used by callers of `enable_trace_event`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ConsumerTraceEventType::KeyFrame => "keyframe",
            ConsumerTraceEventType::Fir => "fir",
            ConsumerTraceEventType::Nack => "nack",
            ConsumerTraceEventType::Pli => "pli",
            ConsumerTraceEventType::Rtp => "rtp",
        }
    }

    /// Map a wire discriminant to a trace event type.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownDiscriminant`] for unrecognized values.
    pub fn from_wire(value: u8) -> Result<Self, CodecError> {
        match value {
            0 => Ok(ConsumerTraceEventType::KeyFrame),
            1 => Ok(ConsumerTraceEventType::Fir),
            2 => Ok(ConsumerTraceEventType::Nack),
            3 => Ok(ConsumerTraceEventType::Pli),
            4 => Ok(ConsumerTraceEventType::Rtp),
            value => Err(CodecError::UnknownDiscriminant {
                field: "trace_event_type",
                value,
            }),
        }
    }

    /// Wire discriminant of the type.
    #[must_use]
    pub const fn to_wire(self) -> u8 {
        match self {
            ConsumerTraceEventType::KeyFrame => 0,
            ConsumerTraceEventType::Fir => 1,
            ConsumerTraceEventType::Nack => 2,
            ConsumerTraceEventType::Pli => 3,
            ConsumerTraceEventType::Rtp => 4,
        }
    }
}

impl AsRef<str> for ConsumerTraceEventType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ConsumerTraceEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown trace event name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid consumer trace event type: {0}")]
pub struct UnknownTraceEventType(pub String);

impl FromStr for ConsumerTraceEventType {
    type Err = UnknownTraceEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keyframe" => Ok(ConsumerTraceEventType::KeyFrame),
            "fir" => Ok(ConsumerTraceEventType::Fir),
            "nack" => Ok(ConsumerTraceEventType::Nack),
            "pli" => Ok(ConsumerTraceEventType::Pli),
            "rtp" => Ok(ConsumerTraceEventType::Rtp),
            other => Err(UnknownTraceEventType(other.to_string())),
        }
    }
}

/// Direction of a traced packet relative to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceDirection {
    /// Received by the worker
    In,
    /// Sent by the worker
    Out,
}

impl TraceDirection {
    /// `"in"` or `"out"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TraceDirection::In => "in",
            TraceDirection::Out => "out",
        }
    }

    pub(crate) fn from_wire(value: u8) -> Result<Self, CodecError> {
        match value {
            0 => Ok(TraceDirection::In),
            1 => Ok(TraceDirection::Out),
            value => Err(CodecError::UnknownDiscriminant {
                field: "direction",
                value,
            }),
        }
    }

    pub(crate) const fn to_wire(self) -> u8 {
        match self {
            TraceDirection::In => 0,
            TraceDirection::Out => 1,
        }
    }
}

/// Summary of an RTP packet carried by trace events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpPacketDump {
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub marker: bool,
    pub ssrc: u32,
    pub is_key_frame: bool,
    pub size: u64,
    pub payload_size: u64,
    pub spatial_layer: u8,
    pub temporal_layer: u8,
    pub mid: Option<String>,
    pub rid: Option<String>,
    pub rrid: Option<String>,
    pub wide_sequence_number: Option<u16>,
}

impl WireDecode for RtpPacketDump {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            payload_type: get_u8(buf)?,
            sequence_number: get_u16(buf)?,
            timestamp: get_u32(buf)?,
            marker: get_bool(buf, "marker")?,
            ssrc: get_u32(buf)?,
            is_key_frame: get_bool(buf, "is_key_frame")?,
            size: get_u64(buf)?,
            payload_size: get_u64(buf)?,
            spatial_layer: get_u8(buf)?,
            temporal_layer: get_u8(buf)?,
            mid: get_optional(buf, "mid", |b| get_string(b, "mid"))?,
            rid: get_optional(buf, "rid", |b| get_string(b, "rid"))?,
            rrid: get_optional(buf, "rrid", |b| get_string(b, "rrid"))?,
            wide_sequence_number: get_optional(buf, "wide_sequence_number", get_u16)?,
        })
    }
}

impl WireEncode for RtpPacketDump {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u8(self.payload_type);
        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        put_bool(buf, self.marker);
        buf.put_u32(self.ssrc);
        put_bool(buf, self.is_key_frame);
        buf.put_u64(self.size);
        buf.put_u64(self.payload_size);
        buf.put_u8(self.spatial_layer);
        buf.put_u8(self.temporal_layer);
        put_optional(buf, self.mid.as_deref(), |b, v| put_string(b, "mid", v))?;
        put_optional(buf, self.rid.as_deref(), |b, v| put_string(b, "rid", v))?;
        put_optional(buf, self.rrid.as_deref(), |b, v| put_string(b, "rrid", v))?;
        put_optional(buf, self.wide_sequence_number.as_ref(), |b, v| {
            b.put_u16(*v);
            Ok(())
        })
    }
}

/// Type-specific details of a trace event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConsumerTraceInfo {
    /// Key frame forwarded
    #[serde(rename_all = "camelCase")]
    KeyFrame { rtp_packet: RtpPacketDump, is_rtx: bool },
    /// Full intra request
    Fir { ssrc: u32 },
    /// Picture loss indication
    Pli { ssrc: u32 },
    /// RTP packet forwarded
    #[serde(rename_all = "camelCase")]
    Rtp { rtp_packet: RtpPacketDump, is_rtx: bool },
}

impl ConsumerTraceInfo {
    /// Info-union discriminant; 0 is reserved for "no info".
    pub(crate) const fn to_wire(&self) -> u8 {
        match self {
            ConsumerTraceInfo::KeyFrame { .. } => 1,
            ConsumerTraceInfo::Fir { .. } => 2,
            ConsumerTraceInfo::Pli { .. } => 3,
            ConsumerTraceInfo::Rtp { .. } => 4,
        }
    }

    pub(crate) fn encode_body(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        match self {
            ConsumerTraceInfo::KeyFrame { rtp_packet, is_rtx }
            | ConsumerTraceInfo::Rtp { rtp_packet, is_rtx } => {
                rtp_packet.encode(buf)?;
                put_bool(buf, *is_rtx);
            }
            ConsumerTraceInfo::Fir { ssrc } | ConsumerTraceInfo::Pli { ssrc } => {
                buf.put_u32(*ssrc);
            }
        }
        Ok(())
    }
}

/// A decoded trace notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerTraceEventData {
    /// Trace kind
    #[serde(rename = "type")]
    pub event_type: ConsumerTraceEventType,
    /// Worker timestamp in milliseconds
    pub timestamp: u64,
    /// Packet direction
    pub direction: TraceDirection,
    /// Type-specific details, absent when the worker sends none
    pub info: Option<ConsumerTraceInfo>,
}
