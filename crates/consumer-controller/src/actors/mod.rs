//! Actor model for consumers.
//!
//! ```text
//! owning transport (holds parent CancellationToken)
//! └── ConsumerActor (one per consumer, child token)
//!     ├── owns ConsumerState
//!     ├── owns NotificationRouter (one channel subscription)
//!     └── spawns one task per in-flight worker request
//! ```
//!
//! Callers only ever hold a [`ConsumerHandle`]; all state changes go
//! through the actor's mailbox.

pub mod consumer;
pub mod messages;
pub mod metrics;

pub use consumer::{ConsumerActor, ConsumerHandle, DEFAULT_PRIORITY};
pub use messages::{ConsumerOptions, ConsumerState};
pub use self::metrics::{MailboxLevel, MailboxMonitor};
