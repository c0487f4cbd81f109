//! Metrics definitions for the consumer controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `consumer_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded by enums, never by consumer ids:
//! - `method`: 9 values (worker RPC methods)
//! - `status`: success, error
//! - `event`: 7 values (notification kinds)
//! - `reason`: drop reasons (3) and close reasons (3)
//! - `bus`: 3 values (events, internal, observer)
//!
//! No recorder is installed here; the embedding process chooses one.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use worker_protocol::{Event, Method};

/// Why a notification was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Kind not recognized
    UnknownKind,
    /// Body failed to decode
    DecodeError,
    /// Still buffered when the consumer closed
    Closed,
}

impl DropReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DropReason::UnknownKind => "unknown_kind",
            DropReason::DecodeError => "decode_error",
            DropReason::Closed => "closed",
        }
    }
}

/// Which terminal path closed a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` called by the owner
    Local,
    /// The owning transport closed, or the actor was cancelled
    Transport,
    /// The producer was closed by the worker
    Producer,
}

impl CloseReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Local => "local",
            CloseReason::Transport => "transport",
            CloseReason::Producer => "producer",
        }
    }
}

// ============================================================================
// Request Metrics
// ============================================================================

/// Record a completed worker request.
///
/// Metrics: `consumer_requests_total` (labels: `method`, `status`),
/// `consumer_request_duration_seconds` (labels: `method`)
pub fn record_request(method: Method, status: &'static str, duration: Duration) {
    counter!("consumer_requests_total",
        "method" => method.as_str(),
        "status" => status
    )
    .increment(1);

    histogram!("consumer_request_duration_seconds", "method" => method.as_str())
        .record(duration.as_secs_f64());
}

// ============================================================================
// Notification Metrics
// ============================================================================

/// Record a notification applied to a consumer.
///
/// Metric: `consumer_notifications_total`
/// Labels: `event`
pub fn record_notification(event: Event) {
    counter!("consumer_notifications_total", "event" => event.as_str()).increment(1);
}

/// Record a notification that was logged and dropped.
///
/// Metric: `consumer_notifications_dropped_total`
/// Labels: `reason`
pub fn record_notification_dropped(reason: DropReason) {
    counter!("consumer_notifications_dropped_total", "reason" => reason.as_str()).increment(1);
}

// ============================================================================
// Lifecycle Metrics
// ============================================================================

/// Record a consumer reaching the closed state.
///
/// Metric: `consumer_closed_total`
/// Labels: `reason`
pub fn record_closed(reason: CloseReason) {
    counter!("consumer_closed_total", "reason" => reason.as_str()).increment(1);
}

/// Record a listener that panicked while handling an event.
///
/// Metric: `consumer_listener_errors_total`
/// Labels: `bus`
pub fn record_listener_error(bus: &'static str) {
    counter!("consumer_listener_errors_total", "bus" => bus).increment(1);
}

// ============================================================================
// Actor Mailbox Metrics (Gauges)
// ============================================================================

/// Adjust the aggregate mailbox depth across consumer actors.
///
/// Metric: `consumer_actor_mailbox_depth`
/// Labels: none
pub fn adjust_actor_mailbox_depth(delta: f64) {
    gauge!("consumer_actor_mailbox_depth").increment(delta);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use metrics_util::MetricKind;

    #[test]
    fn test_labels_are_bounded() {
        let drop_reasons = [
            DropReason::UnknownKind,
            DropReason::DecodeError,
            DropReason::Closed,
        ];
        assert_eq!(
            drop_reasons.map(|r| r.as_str()),
            ["unknown_kind", "decode_error", "closed"]
        );

        let close_reasons = [CloseReason::Local, CloseReason::Transport, CloseReason::Producer];
        assert_eq!(
            close_reasons.map(|r| r.as_str()),
            ["local", "transport", "producer"]
        );
    }

    #[test]
    fn test_metrics_recorded_with_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_request(Method::ConsumerPause, "success", Duration::from_millis(3));
            record_request(Method::ConsumerPause, "error", Duration::from_millis(5));
            record_notification(Event::Score);
            record_notification_dropped(DropReason::UnknownKind);
            record_closed(CloseReason::Producer);
            record_listener_error("observer");
            adjust_actor_mailbox_depth(1.0);
        });

        let snapshot = snapshotter.snapshot().into_vec();

        let requests: u64 = snapshot
            .iter()
            .filter(|(key, _, _, _)| {
                key.kind() == MetricKind::Counter && key.key().name() == "consumer_requests_total"
            })
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(count) => *count,
                _ => 0,
            })
            .sum();
        assert_eq!(requests, 2);

        let closed = snapshot
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "consumer_closed_total")
            .expect("closed counter recorded");
        assert!(closed
            .0
            .key()
            .labels()
            .any(|label| label.key() == "reason" && label.value() == "producer"));

        assert!(snapshot
            .iter()
            .any(|(key, _, _, _)| key.key().name() == "consumer_actor_mailbox_depth"));
    }
}
