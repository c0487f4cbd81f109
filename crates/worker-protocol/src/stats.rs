//! Per-stream RTP counters returned by `consumer.get_stats`.

use crate::codec::{
    get_f32, get_optional, get_string, get_u32, get_u64, get_u8, get_vec, put_optional,
    put_string, put_vec, CodecError, WireDecode, WireEncode,
};
use crate::types::MediaKind;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters shared by receive and send stream statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseRtpStreamStats {
    pub timestamp: u64,
    pub ssrc: u32,
    pub rtx_ssrc: Option<u32>,
    pub rid: Option<String>,
    pub kind: MediaKind,
    pub mime_type: String,
    pub packets_lost: u64,
    pub fraction_lost: u8,
    pub packets_discarded: u64,
    pub packets_retransmitted: u64,
    pub packets_repaired: u64,
    pub nack_count: u64,
    pub nack_packet_count: u64,
    pub pli_count: u64,
    pub fir_count: u64,
    pub score: u8,
    pub round_trip_time: Option<f32>,
    pub rtx_packets_discarded: Option<u64>,
}

impl WireDecode for BaseRtpStreamStats {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            timestamp: get_u64(buf)?,
            ssrc: get_u32(buf)?,
            rtx_ssrc: get_optional(buf, "rtx_ssrc", get_u32)?,
            rid: get_optional(buf, "rid", |b| get_string(b, "rid"))?,
            kind: MediaKind::from_wire(get_u8(buf)?)?,
            mime_type: get_string(buf, "mime_type")?,
            packets_lost: get_u64(buf)?,
            fraction_lost: get_u8(buf)?,
            packets_discarded: get_u64(buf)?,
            packets_retransmitted: get_u64(buf)?,
            packets_repaired: get_u64(buf)?,
            nack_count: get_u64(buf)?,
            nack_packet_count: get_u64(buf)?,
            pli_count: get_u64(buf)?,
            fir_count: get_u64(buf)?,
            score: get_u8(buf)?,
            round_trip_time: get_optional(buf, "round_trip_time", get_f32)?,
            rtx_packets_discarded: get_optional(buf, "rtx_packets_discarded", get_u64)?,
        })
    }
}

impl WireEncode for BaseRtpStreamStats {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        buf.put_u64(self.timestamp);
        buf.put_u32(self.ssrc);
        put_optional(buf, self.rtx_ssrc.as_ref(), |b, v| {
            b.put_u32(*v);
            Ok(())
        })?;
        put_optional(buf, self.rid.as_deref(), |b, v| put_string(b, "rid", v))?;
        buf.put_u8(self.kind.to_wire());
        put_string(buf, "mime_type", &self.mime_type)?;
        buf.put_u64(self.packets_lost);
        buf.put_u8(self.fraction_lost);
        buf.put_u64(self.packets_discarded);
        buf.put_u64(self.packets_retransmitted);
        buf.put_u64(self.packets_repaired);
        buf.put_u64(self.nack_count);
        buf.put_u64(self.nack_packet_count);
        buf.put_u64(self.pli_count);
        buf.put_u64(self.fir_count);
        buf.put_u8(self.score);
        put_optional(buf, self.round_trip_time.as_ref(), |b, v| {
            b.put_f32(*v);
            Ok(())
        })?;
        put_optional(buf, self.rtx_packets_discarded.as_ref(), |b, v| {
            b.put_u64(*v);
            Ok(())
        })
    }
}

/// Statistics of a stream received by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpStreamRecvStats {
    #[serde(flatten)]
    pub base: BaseRtpStreamStats,
    pub jitter: u32,
    pub byte_count: u64,
    pub packet_count: u64,
    pub bitrate: u32,
    /// Bitrate per layer label (`"<spatial>.<temporal>"`)
    pub bitrate_by_layer: BTreeMap<String, u64>,
}

impl WireDecode for RtpStreamRecvStats {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        let base = BaseRtpStreamStats::decode(buf)?;
        let jitter = get_u32(buf)?;
        let byte_count = get_u64(buf)?;
        let packet_count = get_u64(buf)?;
        let bitrate = get_u32(buf)?;
        let layers = get_vec(buf, |b| {
            let layer = get_string(b, "layer")?;
            let bitrate = get_u32(b)?;
            Ok((layer, u64::from(bitrate)))
        })?;

        Ok(Self {
            base,
            jitter,
            byte_count,
            packet_count,
            bitrate,
            bitrate_by_layer: layers.into_iter().collect(),
        })
    }
}

impl WireEncode for RtpStreamRecvStats {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        self.base.encode(buf)?;
        buf.put_u32(self.jitter);
        buf.put_u64(self.byte_count);
        buf.put_u64(self.packet_count);
        buf.put_u32(self.bitrate);
        let layers: Vec<(&String, &u64)> = self.bitrate_by_layer.iter().collect();
        put_vec(buf, "bitrate_by_layer", &layers, |b, (layer, bitrate)| {
            put_string(b, "layer", layer)?;
            let bitrate =
                u32::try_from(**bitrate).map_err(|_| CodecError::FieldTooLong("bitrate"))?;
            b.put_u32(bitrate);
            Ok(())
        })
    }
}

/// Statistics of a stream sent by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpStreamSendStats {
    #[serde(flatten)]
    pub base: BaseRtpStreamStats,
    pub byte_count: u64,
    pub packet_count: u64,
    pub bitrate: u32,
}

impl WireDecode for RtpStreamSendStats {
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError> {
        Ok(Self {
            base: BaseRtpStreamStats::decode(buf)?,
            byte_count: get_u64(buf)?,
            packet_count: get_u64(buf)?,
            bitrate: get_u32(buf)?,
        })
    }
}

impl WireEncode for RtpStreamSendStats {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        self.base.encode(buf)?;
        buf.put_u64(self.byte_count);
        buf.put_u64(self.packet_count);
        buf.put_u32(self.bitrate);
        Ok(())
    }
}

/// One entry of a stats response, discriminated by direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RtpStreamStats {
    #[serde(rename = "inbound-rtp")]
    Recv(RtpStreamRecvStats),
    #[serde(rename = "outbound-rtp")]
    Send(RtpStreamSendStats),
}

impl RtpStreamStats {
    /// Counters common to both directions.
    #[must_use]
    pub const fn base(&self) -> &BaseRtpStreamStats {
        match self {
            RtpStreamStats::Recv(stats) => &stats.base,
            RtpStreamStats::Send(stats) => &stats.base,
        }
    }

    pub(crate) const fn to_wire(&self) -> u8 {
        match self {
            RtpStreamStats::Recv(_) => 0,
            RtpStreamStats::Send(_) => 1,
        }
    }
}
