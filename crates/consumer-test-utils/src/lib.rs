//! # Consumer Test Utilities
//!
//! Shared test utilities for the consumer controller.
//!
//! This crate provides a scriptable worker channel and test fixtures for
//! exercising consumers without a media worker.
//!
//! ## Modules
//!
//! - `mock_channel` - `MockChannel`, a `ChannelTransport` with scripted
//!   responses, held requests and notification injection
//! - `fixtures` - consumer options and sample worker payloads
//! - `recorder` - collects events from a bus for ordered assertions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use consumer_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let channel = MockChannel::builder()
//!         .respond(Method::ConsumerDump, encode_dump_response(&dump).unwrap())
//!         .build();
//!
//!     let (consumer, _task) = spawn_consumer(&channel, simulcast_options());
//!     let observer = EventRecorder::attach(consumer.observer());
//!
//!     channel.notify(&consumer.id().to_string(), Event::ProducerPause, None);
//!     // ...
//! }
//! ```

pub mod fixtures;
pub mod mock_channel;
pub mod recorder;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_channel::*;
pub use recorder::*;
