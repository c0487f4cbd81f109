//! Mock worker channel for consumer testing.
//!
//! `MockChannel` implements [`ChannelTransport`] and can be configured to:
//! - Answer a method with a fixed body or a [`ChannelError`]
//! - Hold requests of a method until released, to test in-flight behavior
//! - Push notifications to any subscribed routing id
//!
//! Every request is recorded before it is answered.
//!
//! # Example
//!
//! ```rust,ignore
//! use consumer_test_utils::MockChannel;
//!
//! let channel = MockChannel::builder()
//!     .fail(Method::ConsumerPause, ChannelError::Remote("boom".into()))
//!     .hold(Method::ConsumerDump)
//!     .build();
//! ```

use bytes::Bytes;
use consumer_controller::channel::{ChannelError, ChannelTransport, Notification, Subscription};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use worker_protocol::decode::{decode_set_preferred_layers_request, decode_set_priority_request};
use worker_protocol::encode::{encode_set_preferred_layers_response, encode_set_priority_response};
use worker_protocol::{Event, Method};

/// A request seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub payload: Option<Bytes>,
    pub routing_id: String,
}

type Response = Result<Option<Bytes>, ChannelError>;

#[derive(Default)]
struct MockState {
    responses: HashMap<Method, Response>,
    requests: Vec<RecordedRequest>,
    subscribers: HashMap<String, mpsc::Sender<Notification>>,
    unsubscribed: Vec<String>,
}

struct Inner {
    state: Mutex<MockState>,
    held: watch::Sender<HashSet<Method>>,
}

/// Scriptable in-memory worker channel. Clones share state.
#[derive(Clone)]
pub struct MockChannel {
    inner: Arc<Inner>,
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChannel")
            .field("requests", &self.request_count())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl MockChannel {
    /// A mock with default answers for every method.
    #[must_use]
    pub fn new() -> Self {
        let (held, _) = watch::channel(HashSet::new());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(MockState::default()),
                held,
            }),
        }
    }

    /// Create a new `MockChannel` builder.
    #[must_use]
    pub fn builder() -> MockChannelBuilder {
        MockChannelBuilder::default()
    }

    /// Shared handle usable where a `dyn ChannelTransport` is expected.
    #[must_use]
    pub fn as_transport(&self) -> Arc<dyn ChannelTransport> {
        Arc::new(self.clone())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.inner.state.lock().unwrap()
    }

    /// Answer `method` with `body` from now on.
    pub fn respond(&self, method: Method, body: Option<Bytes>) {
        self.state().responses.insert(method, Ok(body));
    }

    /// Fail `method` with `error` from now on.
    pub fn fail(&self, method: Method, error: ChannelError) {
        self.state().responses.insert(method, Err(error));
    }

    /// Go back to the default answer for `method`.
    pub fn reset(&self, method: Method) {
        self.state().responses.remove(&method);
    }

    /// Hold requests for `method` until [`Self::release`].
    pub fn hold(&self, method: Method) {
        self.inner.held.send_modify(|held| {
            held.insert(method);
        });
    }

    /// Let held and future requests for `method` complete.
    pub fn release(&self, method: Method) {
        self.inner.held.send_modify(|held| {
            held.remove(&method);
        });
    }

    /// All recorded requests in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    /// Recorded requests for one method.
    #[must_use]
    pub fn requests_for(&self, method: Method) -> Vec<RecordedRequest> {
        self.state()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }

    /// Wait until at least `count` requests for `method` were recorded.
    pub async fn wait_for_requests(&self, method: Method, count: usize) {
        while self.requests_for(method).len() < count {
            tokio::task::yield_now().await;
        }
    }

    /// Push a notification to `routing_id`.
    ///
    /// Returns `false` if nobody is subscribed or the queue is full.
    pub fn notify(&self, routing_id: &str, event: Event, body: Option<Bytes>) -> bool {
        self.notify_raw(routing_id, event.code(), body)
    }

    /// Push a notification with an arbitrary kind byte.
    pub fn notify_raw(&self, routing_id: &str, kind: u8, body: Option<Bytes>) -> bool {
        let sender = self.state().subscribers.get(routing_id).cloned();
        match sender {
            Some(sender) => sender.try_send(Notification { kind, body }).is_ok(),
            None => false,
        }
    }

    /// Whether `routing_id` currently has a subscriber.
    #[must_use]
    pub fn is_subscribed(&self, routing_id: &str) -> bool {
        self.state().subscribers.contains_key(routing_id)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    /// Routing ids that unsubscribed, in order.
    #[must_use]
    pub fn unsubscribed(&self) -> Vec<String> {
        self.state().unsubscribed.clone()
    }

    fn answer(&self, method: Method, payload: Option<Bytes>) -> Response {
        if let Some(response) = self.state().responses.get(&method) {
            return response.clone();
        }

        match method {
            Method::ConsumerSetPriority => decode_set_priority_request(payload)
                .map(|priority| Some(encode_set_priority_response(priority)))
                .map_err(|e| ChannelError::Remote(e.to_string())),
            Method::ConsumerSetPreferredLayers => decode_set_preferred_layers_request(payload)
                .and_then(|layers| encode_set_preferred_layers_response(Some(&layers)))
                .map(Some)
                .map_err(|e| ChannelError::Remote(e.to_string())),
            _ => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl ChannelTransport for MockChannel {
    async fn request(
        &self,
        method: Method,
        payload: Option<Bytes>,
        routing_id: &str,
    ) -> Result<Option<Bytes>, ChannelError> {
        self.state().requests.push(RecordedRequest {
            method,
            payload: payload.clone(),
            routing_id: routing_id.to_string(),
        });

        let mut held = self.inner.held.subscribe();
        let _ = held.wait_for(|held| !held.contains(&method)).await;

        self.answer(method, payload)
    }

    fn subscribe(&self, routing_id: &str, capacity: usize) -> Subscription {
        let (tx, rx) = mpsc::channel(capacity);
        self.state()
            .subscribers
            .insert(routing_id.to_string(), tx);

        let inner = Arc::downgrade(&self.inner);
        let routing_id = routing_id.to_string();
        Subscription::new(rx, move || {
            if let Some(inner) = inner.upgrade() {
                let mut state = inner.state.lock().unwrap();
                state.subscribers.remove(&routing_id);
                state.unsubscribed.push(routing_id);
            }
        })
    }
}

/// Builder for `MockChannel` configuration.
#[derive(Debug, Default)]
pub struct MockChannelBuilder {
    responses: Vec<(Method, Response)>,
    held: Vec<Method>,
}

impl MockChannelBuilder {
    /// Answer `method` with `body`.
    #[must_use]
    pub fn respond(mut self, method: Method, body: Bytes) -> Self {
        self.responses.push((method, Ok(Some(body))));
        self
    }

    /// Answer `method` with an empty acknowledgement.
    #[must_use]
    pub fn ack(mut self, method: Method) -> Self {
        self.responses.push((method, Ok(None)));
        self
    }

    /// Fail `method` with `error`.
    #[must_use]
    pub fn fail(mut self, method: Method, error: ChannelError) -> Self {
        self.responses.push((method, Err(error)));
        self
    }

    /// Hold `method` until released.
    #[must_use]
    pub fn hold(mut self, method: Method) -> Self {
        self.held.push(method);
        self
    }

    /// Build the `MockChannel`.
    #[must_use]
    pub fn build(self) -> MockChannel {
        let channel = MockChannel::new();
        for (method, response) in self.responses {
            channel.state().responses.insert(method, response);
        }
        for method in self.held {
            channel.hold(method);
        }
        channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worker_protocol::decode::{
        decode_set_preferred_layers_response, decode_set_priority_response,
    };
    use worker_protocol::encode::{
        encode_set_preferred_layers_request, encode_set_priority_request,
    };
    use worker_protocol::ConsumerLayers;

    #[tokio::test]
    async fn test_default_answers_echo_requests() {
        let channel = MockChannel::new();

        let body = channel
            .request(
                Method::ConsumerSetPriority,
                Some(encode_set_priority_request(9)),
                "c1",
            )
            .await
            .unwrap();
        assert_eq!(decode_set_priority_response(body).unwrap(), 9);

        let layers = ConsumerLayers {
            spatial_layer: 1,
            temporal_layer: Some(0),
        };
        let body = channel
            .request(
                Method::ConsumerSetPreferredLayers,
                Some(encode_set_preferred_layers_request(&layers).unwrap()),
                "c1",
            )
            .await
            .unwrap();
        assert_eq!(
            decode_set_preferred_layers_response(body).unwrap(),
            Some(layers)
        );

        assert_eq!(
            channel.request(Method::ConsumerPause, None, "c1").await,
            Ok(None)
        );
        assert_eq!(channel.request_count(), 3);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let channel = MockChannel::builder()
            .fail(Method::ConsumerDump, ChannelError::NotFound("c1".into()))
            .build();

        let result = channel.request(Method::ConsumerDump, None, "c1").await;
        assert_eq!(result, Err(ChannelError::NotFound("c1".into())));
        assert_eq!(channel.requests_for(Method::ConsumerDump).len(), 1);
    }

    #[tokio::test]
    async fn test_held_request_completes_after_release() {
        let channel = MockChannel::builder().hold(Method::ConsumerDump).build();

        let pending = tokio::spawn({
            let channel = channel.clone();
            async move { channel.request(Method::ConsumerDump, None, "c1").await }
        });

        channel.wait_for_requests(Method::ConsumerDump, 1).await;
        assert!(!pending.is_finished());

        channel.release(Method::ConsumerDump);
        assert_eq!(pending.await.unwrap(), Ok(None));
    }

    #[tokio::test]
    async fn test_notify_reaches_subscriber_until_dropped() {
        let channel = MockChannel::new();
        let mut subscription = channel.subscribe("c1", 4);
        assert!(channel.is_subscribed("c1"));

        assert!(channel.notify("c1", Event::ProducerPause, None));
        assert!(!channel.notify("c2", Event::ProducerPause, None));
        let notification = subscription.recv().await.unwrap();
        assert_eq!(notification.kind, Event::ProducerPause.code());

        drop(subscription);
        assert!(!channel.is_subscribed("c1"));
        assert_eq!(channel.unsubscribed(), vec!["c1".to_string()]);
        assert!(!channel.notify("c1", Event::ProducerResume, None));
    }
}
