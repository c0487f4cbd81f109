//! Per-consumer notification routing.
//!
//! The router owns the consumer's single channel subscription and turns raw
//! `(kind, body)` pairs into typed [`Inbound`] notifications. Unknown kinds
//! and undecodable bodies are logged, counted and dropped; they never surface
//! as errors. Applying an inbound notification to consumer state is the
//! actor's job, so both sources of mutation meet in one owner.

use crate::channel::{ChannelTransport, Notification, Subscription};
use crate::observability::{record_notification_dropped, DropReason};
use bytes::Bytes;
use common::types::ConsumerId;
use tracing::{debug, warn};
use worker_protocol::decode::{
    decode_layers_change_notification, decode_rtp_notification, decode_score_notification,
    decode_trace_notification,
};
use worker_protocol::{ConsumerLayers, ConsumerScore, ConsumerTraceEventData, Event};

/// A decoded notification for one consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    ProducerClose,
    ProducerPause,
    ProducerResume,
    Score(ConsumerScore),
    LayersChange(Option<ConsumerLayers>),
    Trace(ConsumerTraceEventData),
    Rtp(Bytes),
}

impl Inbound {
    /// Notification kind this value was decoded from.
    #[must_use]
    pub const fn event(&self) -> Event {
        match self {
            Inbound::ProducerClose => Event::ProducerClose,
            Inbound::ProducerPause => Event::ProducerPause,
            Inbound::ProducerResume => Event::ProducerResume,
            Inbound::Score(_) => Event::Score,
            Inbound::LayersChange(_) => Event::LayersChange,
            Inbound::Trace(_) => Event::Trace,
            Inbound::Rtp(_) => Event::Rtp,
        }
    }
}

/// Owner of one consumer's notification subscription.
#[derive(Debug)]
pub struct NotificationRouter {
    consumer_id: ConsumerId,
    subscription: Option<Subscription>,
    rtp_sequence: u64,
}

impl NotificationRouter {
    /// Subscribe to notifications routed to `consumer_id`.
    pub fn attach(channel: &dyn ChannelTransport, consumer_id: ConsumerId, capacity: usize) -> Self {
        let subscription = channel.subscribe(&consumer_id.to_string(), capacity);
        debug!(
            target: "consumer.router",
            consumer_id = %consumer_id,
            capacity,
            "Subscribed to consumer notifications"
        );
        Self {
            consumer_id,
            subscription: Some(subscription),
            rtp_sequence: 0,
        }
    }

    /// Whether the subscription is still held.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Release the subscription. Only the first call has an effect.
    ///
    /// Notifications still buffered are dropped and counted; returns how many.
    pub fn detach(&mut self) -> usize {
        let Some(mut subscription) = self.subscription.take() else {
            return 0;
        };

        let mut dropped = 0;
        while subscription.try_recv().is_some() {
            record_notification_dropped(DropReason::Closed);
            dropped += 1;
        }
        drop(subscription);

        debug!(
            target: "consumer.router",
            consumer_id = %self.consumer_id,
            dropped,
            "Unsubscribed from consumer notifications"
        );
        dropped
    }

    /// Next raw notification in arrival order.
    ///
    /// Stays pending while detached. If the channel side goes away the
    /// subscription is released and this keeps pending.
    pub async fn next(&mut self) -> Notification {
        loop {
            let Some(subscription) = self.subscription.as_mut() else {
                return std::future::pending().await;
            };
            if let Some(notification) = subscription.recv().await {
                return notification;
            }
            warn!(
                target: "consumer.router",
                consumer_id = %self.consumer_id,
                "Notification stream ended by channel"
            );
            self.detach();
        }
    }

    /// Demultiplex and decode a raw notification.
    ///
    /// Returns `None` when the notification is dropped.
    pub fn decode(&self, notification: Notification) -> Option<Inbound> {
        let Some(event) = Event::from_wire(notification.kind) else {
            warn!(
                target: "consumer.router",
                consumer_id = %self.consumer_id,
                kind = notification.kind,
                "Ignoring unknown notification kind"
            );
            record_notification_dropped(DropReason::UnknownKind);
            return None;
        };

        let body = notification.body;
        let decoded = match event {
            Event::ProducerClose => Ok(Inbound::ProducerClose),
            Event::ProducerPause => Ok(Inbound::ProducerPause),
            Event::ProducerResume => Ok(Inbound::ProducerResume),
            Event::Score => decode_score_notification(body).map(Inbound::Score),
            Event::LayersChange => {
                decode_layers_change_notification(body).map(Inbound::LayersChange)
            }
            Event::Trace => decode_trace_notification(body).map(Inbound::Trace),
            Event::Rtp => decode_rtp_notification(body).map(Inbound::Rtp),
        };

        match decoded {
            Ok(inbound) => Some(inbound),
            Err(e) => {
                warn!(
                    target: "consumer.router",
                    consumer_id = %self.consumer_id,
                    event = event.as_str(),
                    error = %e,
                    "Dropping undecodable notification"
                );
                record_notification_dropped(DropReason::DecodeError);
                None
            }
        }
    }

    /// Sequence number for the next delivered RTP packet.
    pub fn next_rtp_sequence(&mut self) -> u64 {
        let sequence = self.rtp_sequence;
        self.rtp_sequence = self.rtp_sequence.wrapping_add(1);
        sequence
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::channel::ChannelError;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;
    use worker_protocol::encode::{encode_rtp_notification, encode_score_notification};
    use worker_protocol::Method;

    #[derive(Default)]
    struct SingleSubscriber {
        sender: Mutex<Option<mpsc::Sender<Notification>>>,
        unsubscribed: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ChannelTransport for SingleSubscriber {
        async fn request(
            &self,
            _method: Method,
            _payload: Option<Bytes>,
            _routing_id: &str,
        ) -> Result<Option<Bytes>, ChannelError> {
            Ok(None)
        }

        fn subscribe(&self, _routing_id: &str, capacity: usize) -> Subscription {
            let (tx, rx) = mpsc::channel(capacity);
            *self.sender.lock().unwrap() = Some(tx);
            let unsubscribed = Arc::clone(&self.unsubscribed);
            Subscription::new(rx, move || {
                unsubscribed.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    fn router() -> (NotificationRouter, SingleSubscriber) {
        let channel = SingleSubscriber::default();
        let router = NotificationRouter::attach(&channel, ConsumerId::new(), 8);
        (router, channel)
    }

    #[test]
    fn test_unknown_kind_is_dropped() {
        let (router, _channel) = router();
        let inbound = router.decode(Notification {
            kind: 42,
            body: None,
        });
        assert!(inbound.is_none());
    }

    #[test]
    fn test_undecodable_score_is_dropped() {
        let (router, _channel) = router();
        let inbound = router.decode(Notification {
            kind: Event::Score.code(),
            body: Some(Bytes::from_static(&[0x01])),
        });
        assert!(inbound.is_none());
    }

    #[test]
    fn test_decodes_known_kinds() {
        let (router, _channel) = router();

        let score = ConsumerScore {
            score: 7,
            producer_score: 9,
            producer_scores: vec![9, 4],
        };
        let inbound = router.decode(Notification {
            kind: Event::Score.code(),
            body: Some(encode_score_notification(&score).unwrap()),
        });
        assert_eq!(inbound, Some(Inbound::Score(score)));

        let inbound = router.decode(Notification {
            kind: Event::Rtp.code(),
            body: Some(encode_rtp_notification(&[1, 2, 3]).unwrap()),
        });
        assert_eq!(inbound, Some(Inbound::Rtp(Bytes::from_static(&[1, 2, 3]))));

        let inbound = router.decode(Notification {
            kind: Event::ProducerPause.code(),
            body: None,
        });
        assert_eq!(inbound.map(|i| i.event()), Some(Event::ProducerPause));
    }

    #[test]
    fn test_detach_unsubscribes_once() {
        let (mut router, channel) = router();
        assert!(router.is_attached());

        router.detach();
        router.detach();

        assert!(!router.is_attached());
        assert_eq!(channel.unsubscribed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_detach_counts_buffered_notifications() {
        let (mut router, channel) = router();
        let sender = channel.sender.lock().unwrap().clone().unwrap();
        for kind in [Event::ProducerPause, Event::ProducerResume] {
            sender
                .send(Notification {
                    kind: kind.code(),
                    body: None,
                })
                .await
                .unwrap();
        }

        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let dropped = metrics::with_local_recorder(&recorder, || router.detach());

        assert_eq!(dropped, 2);
        assert_eq!(router.detach(), 0);
        assert!(sender.is_closed());

        let closed_drops: u64 = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, _)| {
                key.key().name() == "consumer_notifications_dropped_total"
                    && key
                        .key()
                        .labels()
                        .any(|label| label.key() == "reason" && label.value() == "closed")
            })
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(count) => count,
                _ => 0,
            })
            .sum();
        assert_eq!(closed_drops, 2);
    }

    #[test]
    fn test_rtp_sequence_starts_at_zero() {
        let (mut router, _channel) = router();
        assert_eq!(router.next_rtp_sequence(), 0);
        assert_eq!(router.next_rtp_sequence(), 1);
        assert_eq!(router.next_rtp_sequence(), 2);
    }

    #[tokio::test]
    async fn test_next_preserves_arrival_order() {
        let (mut router, channel) = router();
        let sender = channel.sender.lock().unwrap().clone().unwrap();

        for kind in [Event::ProducerPause, Event::ProducerResume] {
            sender
                .send(Notification {
                    kind: kind.code(),
                    body: None,
                })
                .await
                .unwrap();
        }

        assert_eq!(router.next().await.kind, Event::ProducerPause.code());
        assert_eq!(router.next().await.kind, Event::ProducerResume.code());
    }
}
