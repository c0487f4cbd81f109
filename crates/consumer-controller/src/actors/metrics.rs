//! Mailbox monitoring for consumer actors.
//!
//! | Level    | Depth   |
//! |----------|---------|
//! | Normal   | < 50    |
//! | Warning  | 50-200  |
//! | Critical | > 200   |
//!
//! Depth changes are mirrored into the `consumer_actor_mailbox_depth` gauge.

use crate::observability::adjust_actor_mailbox_depth;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Mailbox depth thresholds for consumer actors.
pub const CONSUMER_MAILBOX_NORMAL: usize = 50;
pub const CONSUMER_MAILBOX_WARNING: usize = 200;

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    /// Below normal threshold.
    Normal,
    /// Between normal and warning thresholds.
    Warning,
    /// Above warning threshold.
    Critical,
}

/// Tracks queue depth of one consumer actor's mailbox.
///
/// Shared between the handle (enqueue) and the actor (dequeue).
#[derive(Debug)]
pub struct MailboxMonitor {
    /// Consumer the mailbox belongs to.
    consumer_id: String,
    /// Current mailbox depth.
    depth: AtomicUsize,
    /// Peak mailbox depth since last reset.
    peak_depth: AtomicUsize,
    /// Total messages processed.
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(consumer_id: impl Into<String>) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record a message being added to the mailbox.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        adjust_actor_mailbox_depth(1.0);

        let mut current_peak = self.peak_depth.load(Ordering::Relaxed);
        while new_depth > current_peak {
            match self.peak_depth.compare_exchange_weak(
                current_peak,
                new_depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_peak = actual,
            }
        }

        match level_for_depth(new_depth) {
            MailboxLevel::Critical => {
                warn!(
                    target: "consumer.actor",
                    consumer_id = %self.consumer_id,
                    depth = new_depth,
                    threshold = CONSUMER_MAILBOX_WARNING,
                    "Mailbox depth critical"
                );
            }
            // Log once when crossing into the warning band
            MailboxLevel::Warning if new_depth == CONSUMER_MAILBOX_NORMAL + 1 => {
                debug!(
                    target: "consumer.actor",
                    consumer_id = %self.consumer_id,
                    depth = new_depth,
                    "Mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// Record a message being removed from the mailbox.
    pub fn record_dequeue(&self) {
        let previous = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| d.checked_sub(1));
        if previous.is_ok() {
            adjust_actor_mailbox_depth(-1.0);
        }
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        level_for_depth(self.current_depth())
    }
}

fn level_for_depth(depth: usize) -> MailboxLevel {
    if depth > CONSUMER_MAILBOX_WARNING {
        MailboxLevel::Critical
    } else if depth > CONSUMER_MAILBOX_NORMAL {
        MailboxLevel::Warning
    } else {
        MailboxLevel::Normal
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_dequeue_tracks_depth_and_peak() {
        let monitor = MailboxMonitor::new("consumer-1");

        monitor.record_enqueue();
        monitor.record_enqueue();
        assert_eq!(monitor.current_depth(), 2);
        assert_eq!(monitor.peak_depth(), 2);

        monitor.record_dequeue();
        assert_eq!(monitor.current_depth(), 1);
        assert_eq!(monitor.peak_depth(), 2);
        assert_eq!(monitor.messages_processed(), 1);
    }

    #[test]
    fn test_dequeue_never_underflows() {
        let monitor = MailboxMonitor::new("consumer-1");
        monitor.record_dequeue();
        assert_eq!(monitor.current_depth(), 0);
    }

    #[test]
    fn test_levels() {
        let monitor = MailboxMonitor::new("consumer-1");
        assert_eq!(monitor.current_level(), MailboxLevel::Normal);

        for _ in 0..=CONSUMER_MAILBOX_NORMAL {
            monitor.record_enqueue();
        }
        assert_eq!(monitor.current_level(), MailboxLevel::Warning);

        for _ in CONSUMER_MAILBOX_NORMAL..CONSUMER_MAILBOX_WARNING {
            monitor.record_enqueue();
        }
        assert_eq!(monitor.current_level(), MailboxLevel::Critical);

        while monitor.current_depth() > 0 {
            monitor.record_dequeue();
        }
        assert_eq!(monitor.current_level(), MailboxLevel::Normal);
    }
}
