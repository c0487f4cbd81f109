//! Negotiated parameters and small records shared by requests, responses and notifications.

use crate::codec::{
    get_bool, get_optional, get_string, get_u32, get_u8, get_vec, put_bool, put_optional,
    put_string, put_vec, CodecError, WireDecode, WireEncode,
};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Media kind of a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl MediaKind {
    pub(crate) fn from_wire(value: u8) -> Result<Self, CodecError> {
        match value {
            0 => Ok(MediaKind::Audio),
            1 => Ok(MediaKind::Video),
            value => Err(CodecError::UnknownDiscriminant {
                field: "kind",
                value,
            }),
        }
    }

    pub(crate) const fn to_wire(self) -> u8 {
        match self {
            MediaKind::Audio => 0,
            MediaKind::Video => 1,
        }
    }
}

/// Structural type of a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerType {
    /// Single stream, no layers
    Simple,
    /// Several encodings, one forwarded at a time
    Simulcast,
    /// Single scalable stream with spatial/temporal layers
    Svc,
    /// Router-to-router pipe forwarding every stream
    Pipe,
}

impl ConsumerType {
    /// Map a wire discriminant to a consumer type.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownDiscriminant`] for unrecognized values.
    pub fn from_wire(value: u8) -> Result<Self, CodecError> {
        match value {
            0 => Ok(ConsumerType::Simple),
            1 => Ok(ConsumerType::Simulcast),
            2 => Ok(ConsumerType::Svc),
            3 => Ok(ConsumerType::Pipe),
            value => Err(CodecError::UnknownDiscriminant {
                field: "consumer_type",
                value,
            }),
        }
    }

    /// Wire discriminant of the type.
    #[must_use]
    pub const fn to_wire(self) -> u8 {
        match self {
            ConsumerType::Simple => 0,
            ConsumerType::Simulcast => 1,
            ConsumerType::Svc => 2,
            ConsumerType::Pipe => 3,
        }
    }

    /// Whether the worker selects spatial/temporal layers for this type.
    #[must_use]
    pub const fn is_layered(self) -> bool {
        matches!(self, ConsumerType::Simulcast | ConsumerType::Svc)
    }

    /// Lowercase name, as used in dumps.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ConsumerType::Simple => "simple",
            ConsumerType::Simulcast => "simulcast",
            ConsumerType::Svc => "svc",
            ConsumerType::Pipe => "pipe",
        }
    }
}

impl fmt::Display for ConsumerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spatial/temporal layer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerLayers {
    /// Spatial layer index
    pub spatial_layer: u8,
    /// Temporal layer index; `None` means the highest available
    pub temporal_layer: Option<u8>,
}

impl WireDecode for ConsumerLayers {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            spatial_layer: get_u8(buf)?,
            temporal_layer: get_optional(buf, "temporal_layer", get_u8)?,
        })
    }
}

impl WireEncode for ConsumerLayers {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u8(self.spatial_layer);
        put_optional(buf, self.temporal_layer.as_ref(), |b, v| {
            b.put_u8(*v);
            Ok(())
        })
    }
}

/// Transmission quality score of a consumer and its producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerScore {
    /// Score of the RTP stream sent to the remote endpoint (0-10)
    pub score: u8,
    /// Score of the currently selected producer stream (0-10)
    pub producer_score: u8,
    /// Scores of every producer stream, ordered by encoding
    pub producer_scores: Vec<u8>,
}

impl Default for ConsumerScore {
    fn default() -> Self {
        Self {
            score: 10,
            producer_score: 10,
            producer_scores: Vec::new(),
        }
    }
}

impl WireDecode for ConsumerScore {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            score: get_u8(buf)?,
            producer_score: get_u8(buf)?,
            producer_scores: get_vec(buf, get_u8)?,
        })
    }
}

impl WireEncode for ConsumerScore {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u8(self.score);
        buf.put_u8(self.producer_score);
        put_vec(buf, "producer_scores", &self.producer_scores, |b, v| {
            b.put_u8(*v);
            Ok(())
        })
    }
}

/// Codec negotiated for a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecParameters {
    /// MIME type, e.g. `video/VP8`
    pub mime_type: String,
    /// RTP payload type
    pub payload_type: u8,
    /// Clock rate in Hz
    pub clock_rate: u32,
    /// Audio channel count
    pub channels: Option<u8>,
}

impl WireDecode for RtpCodecParameters {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            mime_type: get_string(buf, "mime_type")?,
            payload_type: get_u8(buf)?,
            clock_rate: get_u32(buf)?,
            channels: get_optional(buf, "channels", get_u8)?,
        })
    }
}

impl WireEncode for RtpCodecParameters {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        put_string(buf, "mime_type", &self.mime_type)?;
        buf.put_u8(self.payload_type);
        buf.put_u32(self.clock_rate);
        put_optional(buf, self.channels.as_ref(), |b, v| {
            b.put_u8(*v);
            Ok(())
        })
    }
}

/// One RTP encoding (simulcast stream or SVC stream).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpEncodingParameters {
    /// SSRC of the encoding
    pub ssrc: Option<u32>,
    /// RTP stream id
    pub rid: Option<String>,
    /// Bitrate cap in bps
    pub max_bitrate: Option<u32>,
    /// Scalability mode, e.g. `L3T3`
    pub scalability_mode: Option<String>,
}

impl WireDecode for RtpEncodingParameters {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            ssrc: get_optional(buf, "ssrc", get_u32)?,
            rid: get_optional(buf, "rid", |b| get_string(b, "rid"))?,
            max_bitrate: get_optional(buf, "max_bitrate", get_u32)?,
            scalability_mode: get_optional(buf, "scalability_mode", |b| {
                get_string(b, "scalability_mode")
            })?,
        })
    }
}

impl WireEncode for RtpEncodingParameters {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        put_optional(buf, self.ssrc.as_ref(), |b, v| {
            b.put_u32(*v);
            Ok(())
        })?;
        put_optional(buf, self.rid.as_deref(), |b, v| put_string(b, "rid", v))?;
        put_optional(buf, self.max_bitrate.as_ref(), |b, v| {
            b.put_u32(*v);
            Ok(())
        })?;
        put_optional(buf, self.scalability_mode.as_deref(), |b, v| {
            put_string(b, "scalability_mode", v)
        })
    }
}

/// RTCP settings of a consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtcpParameters {
    /// Canonical name
    pub cname: Option<String>,
    /// Reduced-size RTCP (RFC 5506)
    pub reduced_size: bool,
}

impl WireDecode for RtcpParameters {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            cname: get_optional(buf, "cname", |b| get_string(b, "cname"))?,
            reduced_size: get_bool(buf, "reduced_size")?,
        })
    }
}

impl WireEncode for RtcpParameters {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        put_optional(buf, self.cname.as_deref(), |b, v| put_string(b, "cname", v))?;
        put_bool(buf, self.reduced_size);
        Ok(())
    }
}

/// RTP parameters negotiated when the consumer was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpParameters {
    /// MID of the media section
    pub mid: Option<String>,
    /// Codecs in preference order
    pub codecs: Vec<RtpCodecParameters>,
    /// Encodings sent to the remote endpoint
    pub encodings: Vec<RtpEncodingParameters>,
    /// RTCP settings
    pub rtcp: RtcpParameters,
}

impl WireDecode for RtpParameters {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            mid: get_optional(buf, "mid", |b| get_string(b, "mid"))?,
            codecs: get_vec(buf, RtpCodecParameters::decode)?,
            encodings: get_vec(buf, RtpEncodingParameters::decode)?,
            rtcp: RtcpParameters::decode(buf)?,
        })
    }
}

impl WireEncode for RtpParameters {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        put_optional(buf, self.mid.as_deref(), |b, v| put_string(b, "mid", v))?;
        put_vec(buf, "codecs", &self.codecs, |b, v| v.encode(b))?;
        put_vec(buf, "encodings", &self.encodings, |b, v| v.encode(b))?;
        self.rtcp.encode(buf)
    }
}
