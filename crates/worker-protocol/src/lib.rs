//! Control channel protocol between the SFU control plane and the media worker.
//!
//! The worker is authoritative for every consumer it hosts. This crate only
//! describes what travels over the channel:
//!
//! - [`method`] - RPC method set and notification kinds
//! - [`types`], [`dump`], [`stats`], [`trace`] - typed records carried in payloads
//! - [`codec`] - big-endian wire primitives shared by every payload
//! - [`decode`] - discriminant-driven decoding of responses and notifications
//! - [`encode`] - request encoders plus response/notification encoders used by mocks

#![warn(clippy::pedantic)]

pub mod codec;
pub mod decode;
pub mod dump;
pub mod encode;
pub mod method;
pub mod stats;
pub mod trace;
pub mod types;

pub use codec::CodecError;
pub use dump::ConsumerDump;
pub use method::{Event, Method};
pub use stats::RtpStreamStats;
pub use trace::{ConsumerTraceEventData, ConsumerTraceEventType};
pub use types::{ConsumerLayers, ConsumerScore, ConsumerType, MediaKind};
