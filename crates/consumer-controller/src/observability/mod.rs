//! Observability for the consumer controller.
//!
//! Logging uses `tracing` with fixed targets so operators can filter per
//! concern:
//!
//! | Target | Emitted by |
//! |--------|------------|
//! | `consumer.actor` | actor lifecycle, request dispatch and completion |
//! | `consumer.router` | notification decode, demux and drops |
//! | `consumer.events` | listener failures on any event bus |
//! | `consumer.channel` | best-effort worker calls whose failure is swallowed |
//!
//! Fields never include payload contents; ids and bounded labels only.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `consumer_requests_total` | Counter | `method`, `status` | Worker request outcomes |
//! | `consumer_request_duration_seconds` | Histogram | `method` | Worker round-trip time |
//! | `consumer_notifications_total` | Counter | `event` | Notifications applied |
//! | `consumer_notifications_dropped_total` | Counter | `reason` | Notifications logged and dropped |
//! | `consumer_listener_errors_total` | Counter | `bus` | Panicking listeners caught |
//! | `consumer_closed_total` | Counter | `reason` | Terminal transitions by path |
//! | `consumer_actor_mailbox_depth` | Gauge | none | Backpressure indicator |

pub mod metrics;

pub use self::metrics::{
    adjust_actor_mailbox_depth, record_closed, record_listener_error, record_notification,
    record_notification_dropped, record_request, CloseReason, DropReason,
};
