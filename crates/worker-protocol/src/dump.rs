//! Structural snapshot of a consumer as reported by the worker.

use crate::codec::{
    get_bool, get_optional, get_string, get_u32, get_u8, get_vec, put_bool, put_optional,
    put_string, put_vec, CodecError, WireDecode, WireEncode,
};
use crate::trace::ConsumerTraceEventType;
use crate::types::{ConsumerType, MediaKind, RtpEncodingParameters, RtpParameters};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Parameters of one RTP stream sent by the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpStreamParametersDump {
    pub encoding_idx: u32,
    pub ssrc: u32,
    pub payload_type: u8,
    pub mime_type: String,
    pub clock_rate: u32,
    pub rid: Option<String>,
    pub cname: String,
    pub rtx_ssrc: Option<u32>,
    pub rtx_payload_type: Option<u8>,
    pub use_nack: bool,
    pub use_pli: bool,
    pub use_fir: bool,
    pub use_in_band_fec: bool,
    pub use_dtx: bool,
    pub spatial_layers: u8,
    pub temporal_layers: u8,
}

impl WireDecode for RtpStreamParametersDump {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            encoding_idx: get_u32(buf)?,
            ssrc: get_u32(buf)?,
            payload_type: get_u8(buf)?,
            mime_type: get_string(buf, "mime_type")?,
            clock_rate: get_u32(buf)?,
            rid: get_optional(buf, "rid", |b| get_string(b, "rid"))?,
            cname: get_string(buf, "cname")?,
            rtx_ssrc: get_optional(buf, "rtx_ssrc", get_u32)?,
            rtx_payload_type: get_optional(buf, "rtx_payload_type", get_u8)?,
            use_nack: get_bool(buf, "use_nack")?,
            use_pli: get_bool(buf, "use_pli")?,
            use_fir: get_bool(buf, "use_fir")?,
            use_in_band_fec: get_bool(buf, "use_in_band_fec")?,
            use_dtx: get_bool(buf, "use_dtx")?,
            spatial_layers: get_u8(buf)?,
            temporal_layers: get_u8(buf)?,
        })
    }
}

impl WireEncode for RtpStreamParametersDump {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u32(self.encoding_idx);
        buf.put_u32(self.ssrc);
        buf.put_u8(self.payload_type);
        put_string(buf, "mime_type", &self.mime_type)?;
        buf.put_u32(self.clock_rate);
        put_optional(buf, self.rid.as_deref(), |b, v| put_string(b, "rid", v))?;
        put_string(buf, "cname", &self.cname)?;
        put_optional(buf, self.rtx_ssrc.as_ref(), |b, v| {
            b.put_u32(*v);
            Ok(())
        })?;
        put_optional(buf, self.rtx_payload_type.as_ref(), |b, v| {
            b.put_u8(*v);
            Ok(())
        })?;
        put_bool(buf, self.use_nack);
        put_bool(buf, self.use_pli);
        put_bool(buf, self.use_fir);
        put_bool(buf, self.use_in_band_fec);
        put_bool(buf, self.use_dtx);
        buf.put_u8(self.spatial_layers);
        buf.put_u8(self.temporal_layers);
        Ok(())
    }
}

/// Parameters of the RTX stream paired with an RTP stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtxStreamParameters {
    pub ssrc: u32,
    pub payload_type: u8,
    pub mime_type: String,
    pub clock_rate: u32,
    pub rrid: Option<String>,
    pub cname: String,
}

impl WireDecode for RtxStreamParameters {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            ssrc: get_u32(buf)?,
            payload_type: get_u8(buf)?,
            mime_type: get_string(buf, "mime_type")?,
            clock_rate: get_u32(buf)?,
            rrid: get_optional(buf, "rrid", |b| get_string(b, "rrid"))?,
            cname: get_string(buf, "cname")?,
        })
    }
}

impl WireEncode for RtxStreamParameters {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u32(self.ssrc);
        buf.put_u8(self.payload_type);
        put_string(buf, "mime_type", &self.mime_type)?;
        buf.put_u32(self.clock_rate);
        put_optional(buf, self.rrid.as_deref(), |b, v| put_string(b, "rrid", v))?;
        put_string(buf, "cname", &self.cname)
    }
}

/// RTX stream dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtxStreamDump {
    pub params: RtxStreamParameters,
}

/// RTP stream dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpStreamDump {
    pub params: RtpStreamParametersDump,
    pub score: u8,
    pub rtx_stream: Option<RtxStreamDump>,
}

impl WireDecode for RtpStreamDump {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            params: RtpStreamParametersDump::decode(buf)?,
            score: get_u8(buf)?,
            rtx_stream: get_optional(buf, "rtx_stream", |b| {
                RtxStreamParameters::decode(b).map(|params| RtxStreamDump { params })
            })?,
        })
    }
}

impl WireEncode for RtpStreamDump {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        self.params.encode(buf)?;
        buf.put_u8(self.score);
        put_optional(buf, self.rtx_stream.as_ref(), |b, v| v.params.encode(b))
    }
}

/// Fields shared by every consumer dump variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseConsumerDump {
    pub id: String,
    pub producer_id: String,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    /// Encodings offered by the producer; `None` when the worker sends none
    pub consumable_rtp_encodings: Option<Vec<RtpEncodingParameters>>,
    pub trace_event_types: Vec<ConsumerTraceEventType>,
    pub supported_codec_payload_types: Vec<u8>,
    pub paused: bool,
    pub producer_paused: bool,
    pub priority: u32,
}

impl WireDecode for BaseConsumerDump {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        let id = get_string(buf, "id")?;
        let producer_id = get_string(buf, "producer_id")?;
        let kind = MediaKind::from_wire(get_u8(buf)?)?;
        let rtp_parameters = RtpParameters::decode(buf)?;
        let consumable = get_vec(buf, RtpEncodingParameters::decode)?;
        let trace_event_types = get_vec(buf, |b| {
            get_u8(b).and_then(ConsumerTraceEventType::from_wire)
        })?;

        Ok(Self {
            id,
            producer_id,
            kind,
            rtp_parameters,
            consumable_rtp_encodings: (!consumable.is_empty()).then_some(consumable),
            trace_event_types,
            supported_codec_payload_types: get_vec(buf, get_u8)?,
            paused: get_bool(buf, "paused")?,
            producer_paused: get_bool(buf, "producer_paused")?,
            priority: get_u32(buf)?,
        })
    }
}

impl WireEncode for BaseConsumerDump {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        put_string(buf, "id", &self.id)?;
        put_string(buf, "producer_id", &self.producer_id)?;
        buf.put_u8(self.kind.to_wire());
        self.rtp_parameters.encode(buf)?;
        put_vec(
            buf,
            "consumable_rtp_encodings",
            self.consumable_rtp_encodings.as_deref().unwrap_or_default(),
            |b, v| v.encode(b),
        )?;
        put_vec(buf, "trace_event_types", &self.trace_event_types, |b, v| {
            b.put_u8(v.to_wire());
            Ok(())
        })?;
        put_vec(
            buf,
            "supported_codec_payload_types",
            &self.supported_codec_payload_types,
            |b, v| {
                b.put_u8(*v);
                Ok(())
            },
        )?;
        put_bool(buf, self.paused);
        put_bool(buf, self.producer_paused);
        buf.put_u32(self.priority);
        Ok(())
    }
}

/// Dump of a simple consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleConsumerDump {
    #[serde(flatten)]
    pub base: BaseConsumerDump,
    pub rtp_stream: RtpStreamDump,
}

/// Dump of a simulcast or SVC consumer.
///
/// Layer indices are `None` when the worker has not selected one yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayeredConsumerDump {
    #[serde(flatten)]
    pub base: BaseConsumerDump,
    pub rtp_stream: RtpStreamDump,
    pub preferred_spatial_layer: Option<u8>,
    pub target_spatial_layer: Option<u8>,
    pub current_spatial_layer: Option<u8>,
    pub preferred_temporal_layer: Option<u8>,
    pub target_temporal_layer: Option<u8>,
    pub current_temporal_layer: Option<u8>,
}

/// Dump of a pipe consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipeConsumerDump {
    #[serde(flatten)]
    pub base: BaseConsumerDump,
    pub rtp_streams: Vec<RtpStreamDump>,
}

/// Consumer dump, one variant per structural type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConsumerDump {
    Simple(SimpleConsumerDump),
    Simulcast(LayeredConsumerDump),
    Svc(LayeredConsumerDump),
    Pipe(PipeConsumerDump),
}

impl ConsumerDump {
    /// Structural type of the dumped consumer.
    #[must_use]
    pub const fn consumer_type(&self) -> ConsumerType {
        match self {
            ConsumerDump::Simple(_) => ConsumerType::Simple,
            ConsumerDump::Simulcast(_) => ConsumerType::Simulcast,
            ConsumerDump::Svc(_) => ConsumerType::Svc,
            ConsumerDump::Pipe(_) => ConsumerType::Pipe,
        }
    }

    /// Fields shared by every variant.
    #[must_use]
    pub const fn base(&self) -> &BaseConsumerDump {
        match self {
            ConsumerDump::Simple(dump) => &dump.base,
            ConsumerDump::Simulcast(dump) | ConsumerDump::Svc(dump) => &dump.base,
            ConsumerDump::Pipe(dump) => &dump.base,
        }
    }
}
