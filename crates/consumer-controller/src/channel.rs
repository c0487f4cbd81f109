//! Boundary to the duplex channel carrying requests and notifications to and
//! from the media worker.
//!
//! The worker process, its supervision and the framing of bytes on the pipe
//! live behind [`ChannelTransport`]. Production code wires a real channel;
//! tests use the scriptable mock from `consumer-test-utils`.

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use worker_protocol::Method;

/// Failure reported by a [`ChannelTransport`] request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The worker answered with an error.
    #[error("Worker rejected request: {0}")]
    Remote(String),

    /// The channel is closed or the worker process is gone.
    #[error("Worker unreachable: {0}")]
    Unreachable(String),

    /// The routing id no longer exists inside the worker.
    #[error("Entity not found in worker: {0}")]
    NotFound(String),
}

impl ChannelError {
    /// Bounded label for metrics.
    #[must_use]
    pub const fn error_type_label(&self) -> &'static str {
        match self {
            ChannelError::Remote(_) => "remote",
            ChannelError::Unreachable(_) => "unreachable",
            ChannelError::NotFound(_) => "not_found",
        }
    }
}

/// One push notification for a routing id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Raw notification kind; see [`worker_protocol::Event::from_wire`].
    pub kind: u8,
    /// Encoded body, if the notification carries one.
    pub body: Option<Bytes>,
}

/// Per-routing-id notification stream.
///
/// Dropping the subscription runs the unsubscribe callback exactly once,
/// after which the channel stops delivering for that routing id.
pub struct Subscription {
    receiver: mpsc::Receiver<Notification>,
    on_unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a receiver fed by the channel and the callback that detaches it.
    pub fn new(
        receiver: mpsc::Receiver<Notification>,
        on_unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            on_unsubscribe: Some(Box::new(on_unsubscribe)),
        }
    }

    /// Next notification in arrival order; `None` once the channel side is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }

    /// Next already-buffered notification, without waiting.
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.on_unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.on_unsubscribe.is_some())
            .finish_non_exhaustive()
    }
}

/// Request/notification channel to the media worker (enables mocking).
#[async_trait::async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Send `method` with an optional encoded body to `routing_id`.
    ///
    /// `Ok(None)` is an empty acknowledgement.
    async fn request(
        &self,
        method: Method,
        payload: Option<Bytes>,
        routing_id: &str,
    ) -> Result<Option<Bytes>, ChannelError>;

    /// Subscribe to notifications for `routing_id`, buffering up to `capacity`.
    fn subscribe(&self, routing_id: &str, capacity: usize) -> Subscription;
}
