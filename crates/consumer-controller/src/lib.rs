//! Consumer Controller Library
//!
//! Control plane for media consumers hosted by a remote media worker. Each
//! consumer is represented locally by an actor that:
//!
//! - Translates operations into request/response round-trips on the worker channel
//! - Routes the worker's push notifications for that consumer back onto its state
//! - Publishes typed events for the consumer, its owning transport and observers
//!
//! # Modules
//!
//! - [`actors`] - `ConsumerActor` and its `ConsumerHandle`
//! - [`bus`] - typed event buses with panic-isolated listeners
//! - [`channel`] - the `ChannelTransport` boundary to the worker
//! - [`config`] - configuration from environment
//! - [`errors`] - error types
//! - [`events`] - consumer, internal and observer event sets
//! - [`observability`] - tracing targets and metrics
//! - [`router`] - per-consumer notification decoding

#![warn(clippy::pedantic)]

pub mod actors;
pub mod bus;
pub mod channel;
pub mod config;
pub mod errors;
pub mod events;
pub mod observability;
pub mod router;

pub use actors::{ConsumerActor, ConsumerHandle, ConsumerOptions, ConsumerState};
pub use bus::{EventBus, ListenerError, ListenerGuard};
pub use channel::{ChannelError, ChannelTransport, Notification, Subscription};
pub use config::Config;
pub use errors::ConsumerError;
pub use events::{ConsumerEvent, InternalEvent, ObserverEvent};
