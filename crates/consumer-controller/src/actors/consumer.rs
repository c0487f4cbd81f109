//! `ConsumerActor` - per-consumer actor that owns consumer state.
//!
//! Each `ConsumerActor`:
//! - Owns the mutable state of one consumer (paused flags, priority, score, layers)
//! - Owns the consumer's notification subscription through a [`NotificationRouter`]
//! - Runs every worker request in its own task and applies the completion when
//!   it is posted back, so completions and notifications never race
//! - Publishes on the consumer's three event buses
//!
//! # Closing
//!
//! A consumer closes exactly once, through whichever of these fires first:
//! 1. `close()` from the owner (best-effort `transport.close_consumer` to the worker)
//! 2. `transport_closed()` or cancellation of the actor's token (no remote call)
//! 3. A producer-close notification from the worker (no remote call)
//!
//! Closing releases the subscription immediately and never waits for
//! in-flight requests. Their completions still reply to the caller but no
//! longer touch state. The actor keeps answering `state()` until the last
//! handle is dropped; every other operation fails with
//! [`ConsumerError::Closed`].

use super::messages::{
    Completion, ConsumerMessage, ConsumerOptions, ConsumerState, Operation, OperationOutput,
    OperationReply,
};
use super::metrics::MailboxMonitor;
use crate::bus::EventBus;
use crate::channel::{ChannelTransport, Notification};
use crate::config::Config;
use crate::errors::ConsumerError;
use crate::events::{ConsumerBuses, ConsumerEvent, InternalEvent, ObserverEvent};
use crate::observability::{
    record_closed, record_notification, record_request, CloseReason,
};
use crate::router::{Inbound, NotificationRouter};

use common::types::{AppData, ConsumerId, ProducerId, TransportId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use worker_protocol::decode::{
    decode_dump_response, decode_set_preferred_layers_response, decode_set_priority_response,
    decode_stats_response,
};
use worker_protocol::encode::encode_close_consumer_request;
use worker_protocol::types::RtpParameters;
use worker_protocol::{
    ConsumerDump, ConsumerLayers, ConsumerTraceEventType, ConsumerType, MediaKind, Method,
    RtpStreamStats,
};

/// Priority restored by `unset_priority`.
pub const DEFAULT_PRIORITY: u32 = 1;

/// Immutable data fixed at construction.
#[derive(Debug)]
struct ConsumerInfo {
    id: ConsumerId,
    transport_id: TransportId,
    producer_id: ProducerId,
    kind: MediaKind,
    rtp_parameters: RtpParameters,
    consumer_type: ConsumerType,
}

/// Handle to a `ConsumerActor`.
#[derive(Clone)]
pub struct ConsumerHandle {
    sender: mpsc::Sender<ConsumerMessage>,
    cancel_token: CancellationToken,
    info: Arc<ConsumerInfo>,
    app_data: Arc<RwLock<AppData>>,
    buses: ConsumerBuses,
    closed: Arc<AtomicBool>,
    mailbox: Arc<MailboxMonitor>,
}

impl std::fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerHandle")
            .field("id", &self.info.id)
            .field("consumer_type", &self.info.consumer_type)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ConsumerHandle {
    #[must_use]
    pub fn id(&self) -> ConsumerId {
        self.info.id
    }

    #[must_use]
    pub fn transport_id(&self) -> TransportId {
        self.info.transport_id
    }

    #[must_use]
    pub fn producer_id(&self) -> ProducerId {
        self.info.producer_id
    }

    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.info.kind
    }

    #[must_use]
    pub fn rtp_parameters(&self) -> &RtpParameters {
        &self.info.rtp_parameters
    }

    #[must_use]
    pub fn consumer_type(&self) -> ConsumerType {
        self.info.consumer_type
    }

    /// Current application data, shared by every clone of the handle.
    #[must_use]
    pub fn app_data(&self) -> AppData {
        self.app_data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the application data. Allowed after close.
    pub fn set_app_data(&self, app_data: AppData) {
        *self.app_data.write().unwrap_or_else(PoisonError::into_inner) = app_data;
    }

    /// Whether the consumer has reached its terminal state.
    ///
    /// Set by the actor as soon as it applies a close; use [`Self::state`]
    /// for a snapshot ordered with other operations.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Public consumer events.
    #[must_use]
    pub fn events(&self) -> &EventBus<ConsumerEvent> {
        &self.buses.events
    }

    /// Lifecycle signals for the owning transport.
    #[must_use]
    pub fn internal_events(&self) -> &EventBus<InternalEvent> {
        &self.buses.internal
    }

    /// Observer events for cross-cutting monitors.
    #[must_use]
    pub fn observer(&self) -> &EventBus<ObserverEvent> {
        &self.buses.observer
    }

    async fn send(&self, message: ConsumerMessage) -> Result<(), ConsumerError> {
        // Count only once a slot is held; a caller dropped while waiting leaves no trace.
        let permit = self
            .sender
            .reserve()
            .await
            .map_err(|e| ConsumerError::Internal(format!("channel send failed: {e}")))?;
        self.mailbox.record_enqueue();
        permit.send(message);
        Ok(())
    }

    /// Current state snapshot. Works after close.
    pub async fn state(&self) -> Result<ConsumerState, ConsumerError> {
        let (tx, rx) = oneshot::channel();
        self.send(ConsumerMessage::GetState { respond_to: tx })
            .await?;

        rx.await
            .map_err(|e| ConsumerError::Internal(format!("response receive failed: {e}")))
    }

    /// Close the consumer. Idempotent; does not wait for the worker.
    pub async fn close(&self) -> Result<(), ConsumerError> {
        let (tx, rx) = oneshot::channel();
        self.send(ConsumerMessage::Close { respond_to: tx }).await?;

        rx.await
            .map_err(|e| ConsumerError::Internal(format!("response receive failed: {e}")))
    }

    /// Tell the consumer its owning transport is gone. Idempotent.
    pub async fn transport_closed(&self) -> Result<(), ConsumerError> {
        let (tx, rx) = oneshot::channel();
        self.send(ConsumerMessage::TransportClosed { respond_to: tx })
            .await?;

        rx.await
            .map_err(|e| ConsumerError::Internal(format!("response receive failed: {e}")))
    }

    async fn request(&self, op: Operation) -> Result<OperationOutput, ConsumerError> {
        let (tx, rx) = oneshot::channel();
        self.send(ConsumerMessage::Request { op, respond_to: tx })
            .await?;

        rx.await
            .map_err(|e| ConsumerError::Internal(format!("response receive failed: {e}")))?
    }

    /// Full structural snapshot from the worker.
    pub async fn dump(&self) -> Result<ConsumerDump, ConsumerError> {
        match self.request(Operation::Dump).await? {
            OperationOutput::Dump(dump) => Ok(*dump),
            other => Err(unexpected_output(Method::ConsumerDump, &other)),
        }
    }

    /// Current RTP stream counters from the worker.
    pub async fn get_stats(&self) -> Result<Vec<RtpStreamStats>, ConsumerError> {
        match self.request(Operation::GetStats).await? {
            OperationOutput::Stats(stats) => Ok(stats),
            other => Err(unexpected_output(Method::ConsumerGetStats, &other)),
        }
    }

    /// Stop forwarding media.
    pub async fn pause(&self) -> Result<(), ConsumerError> {
        self.request(Operation::Pause).await.map(|_| ())
    }

    /// Resume forwarding media.
    pub async fn resume(&self) -> Result<(), ConsumerError> {
        self.request(Operation::Resume).await.map(|_| ())
    }

    /// Select preferred layers; returns what the worker settled on.
    ///
    /// Non-layered consumers get `None` back and their cached preference is cleared.
    pub async fn set_preferred_layers(
        &self,
        spatial_layer: u8,
        temporal_layer: Option<u8>,
    ) -> Result<Option<ConsumerLayers>, ConsumerError> {
        let layers = ConsumerLayers {
            spatial_layer,
            temporal_layer,
        };
        match self.request(Operation::SetPreferredLayers(layers)).await? {
            OperationOutput::PreferredLayers(layers) => Ok(layers),
            other => Err(unexpected_output(Method::ConsumerSetPreferredLayers, &other)),
        }
    }

    /// Set bandwidth priority; returns the value confirmed by the worker.
    ///
    /// # Errors
    ///
    /// [`ConsumerError::Validation`] for negative values or values above
    /// `u32::MAX`, before anything is sent.
    pub async fn set_priority(&self, priority: i64) -> Result<u32, ConsumerError> {
        let priority = u32::try_from(priority)
            .map_err(|_| ConsumerError::Validation(format!("invalid priority: {priority}")))?;

        match self.request(Operation::SetPriority(priority)).await? {
            OperationOutput::Priority(confirmed) => Ok(confirmed),
            other => Err(unexpected_output(Method::ConsumerSetPriority, &other)),
        }
    }

    /// Same as `set_priority(1)`.
    pub async fn unset_priority(&self) -> Result<u32, ConsumerError> {
        self.set_priority(i64::from(DEFAULT_PRIORITY)).await
    }

    /// Ask the producer for a key frame.
    pub async fn request_key_frame(&self) -> Result<(), ConsumerError> {
        self.request(Operation::RequestKeyFrame).await.map(|_| ())
    }

    /// Choose which trace events the worker emits.
    ///
    /// Unknown names are skipped with a warning; the rest are sent in one
    /// request, which may be empty.
    pub async fn enable_trace_event<I, S>(&self, types: I) -> Result<(), ConsumerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed: Vec<ConsumerTraceEventType> = Vec::new();
        for name in types {
            match name.as_ref().parse::<ConsumerTraceEventType>() {
                Ok(event_type) => parsed.push(event_type),
                Err(e) => {
                    warn!(
                        target: "consumer.actor",
                        consumer_id = %self.info.id,
                        error = %e,
                        "Skipping unknown trace event type"
                    );
                }
            }
        }

        self.request(Operation::EnableTraceEvent(parsed))
            .await
            .map(|_| ())
    }

    /// Cancel the actor; handled like `transport_closed`.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

fn unexpected_output(method: Method, output: &OperationOutput) -> ConsumerError {
    ConsumerError::Internal(format!("unexpected {method} output: {output:?}"))
}

/// The `ConsumerActor` implementation.
pub struct ConsumerActor {
    info: Arc<ConsumerInfo>,
    /// Message receiver.
    receiver: mpsc::Receiver<ConsumerMessage>,
    /// Completions posted by request tasks.
    completions: mpsc::UnboundedReceiver<Completion>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    /// Cancellation token (child of the owning transport's token).
    cancel_token: CancellationToken,
    channel: Arc<dyn ChannelTransport>,
    router: NotificationRouter,
    state: ConsumerState,
    buses: ConsumerBuses,
    closed: Arc<AtomicBool>,
    mailbox: Arc<MailboxMonitor>,
}

impl ConsumerActor {
    /// Spawn a new consumer actor.
    ///
    /// Subscribes to the consumer's notifications before returning, so none
    /// sent after `spawn` are missed.
    pub fn spawn(
        options: ConsumerOptions,
        channel: Arc<dyn ChannelTransport>,
        config: &Config,
        cancel_token: CancellationToken,
    ) -> (ConsumerHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.mailbox_buffer);
        let (completion_tx, completions) = mpsc::unbounded_channel();

        let state = ConsumerState::from_options(&options);
        let router =
            NotificationRouter::attach(channel.as_ref(), options.id, config.notification_buffer);
        let info = Arc::new(ConsumerInfo {
            id: options.id,
            transport_id: options.transport_id,
            producer_id: options.producer_id,
            kind: options.kind,
            rtp_parameters: options.rtp_parameters,
            consumer_type: options.consumer_type,
        });
        let app_data = Arc::new(RwLock::new(options.app_data));
        let buses = ConsumerBuses::new();
        let closed = Arc::new(AtomicBool::new(false));
        let mailbox = Arc::new(MailboxMonitor::new(info.id.to_string()));

        let actor = Self {
            info: Arc::clone(&info),
            receiver,
            completions,
            completion_tx,
            cancel_token: cancel_token.clone(),
            channel,
            router,
            state,
            buses: buses.clone(),
            closed: Arc::clone(&closed),
            mailbox: Arc::clone(&mailbox),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = ConsumerHandle {
            sender,
            cancel_token,
            info,
            app_data,
            buses,
            closed,
            mailbox,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    ///
    /// Sources are polled in a fixed order: cancellation, request
    /// completions, notifications, then the mailbox.
    #[instrument(skip_all, name = "consumer.actor", fields(consumer_id = %self.info.id))]
    async fn run(mut self) {
        info!(
            target: "consumer.actor",
            consumer_id = %self.info.id,
            consumer_type = self.info.consumer_type.as_str(),
            "ConsumerActor started"
        );

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled(), if !self.state.closed => {
                    info!(
                        target: "consumer.actor",
                        consumer_id = %self.info.id,
                        "ConsumerActor received cancellation signal"
                    );
                    self.handle_transport_closed();
                }

                Some(completion) = self.completions.recv() => {
                    self.handle_completion(completion);
                }

                notification = self.router.next() => {
                    self.handle_notification(notification);
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_dequeue();
                            self.handle_message(message);
                        }
                        None => {
                            debug!(
                                target: "consumer.actor",
                                consumer_id = %self.info.id,
                                "All handles dropped, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.router.detach();

        info!(
            target: "consumer.actor",
            consumer_id = %self.info.id,
            closed = self.state.closed,
            messages_processed = self.mailbox.messages_processed(),
            "ConsumerActor stopped"
        );
    }

    fn handle_message(&mut self, message: ConsumerMessage) {
        match message {
            ConsumerMessage::Close { respond_to } => {
                self.handle_close();
                let _ = respond_to.send(());
            }

            ConsumerMessage::TransportClosed { respond_to } => {
                self.handle_transport_closed();
                let _ = respond_to.send(());
            }

            ConsumerMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.state.clone());
            }

            ConsumerMessage::Request { op, respond_to } => {
                self.dispatch(op, respond_to);
            }
        }
    }

    /// Start a worker request in its own task.
    fn dispatch(&self, op: Operation, respond_to: OperationReply) {
        if self.state.closed {
            let _ = respond_to.send(Err(ConsumerError::Closed));
            return;
        }

        let method = op.method();
        let payload = match op.encode_payload() {
            Ok(payload) => payload,
            Err(e) => {
                let _ = respond_to.send(Err(ConsumerError::Validation(format!(
                    "cannot encode {method} request: {e}"
                ))));
                return;
            }
        };

        debug!(
            target: "consumer.actor",
            consumer_id = %self.info.id,
            method = method.as_str(),
            "Dispatching worker request"
        );

        let channel = Arc::clone(&self.channel);
        let completion_tx = self.completion_tx.clone();
        let routing_id = self.info.id.to_string();
        tokio::spawn(async move {
            let start = Instant::now();
            let outcome = channel.request(method, payload, &routing_id).await;
            let status = if outcome.is_ok() { "success" } else { "error" };
            record_request(method, status, start.elapsed());

            // Fails only once the actor is gone; the caller then sees a dropped reply.
            let _ = completion_tx.send(Completion {
                op,
                outcome,
                respond_to,
            });
        });
    }

    fn handle_completion(&mut self, completion: Completion) {
        let Completion {
            op,
            outcome,
            respond_to,
        } = completion;
        let method = op.method();

        let body = match outcome {
            Ok(body) => body,
            Err(reason) => {
                warn!(
                    target: "consumer.actor",
                    consumer_id = %self.info.id,
                    method = method.as_str(),
                    error = %reason,
                    "Worker request failed"
                );
                let _ = respond_to.send(Err(ConsumerError::Request { method, reason }));
                return;
            }
        };

        let result = self.apply_completion(op, body);
        if let Err(e) = &result {
            warn!(
                target: "consumer.actor",
                consumer_id = %self.info.id,
                method = method.as_str(),
                error = %e,
                "Worker response rejected"
            );
        }
        let _ = respond_to.send(result);
    }

    /// Decode a successful response and apply it to state unless closed.
    fn apply_completion(
        &mut self,
        op: Operation,
        body: Option<bytes::Bytes>,
    ) -> Result<OperationOutput, ConsumerError> {
        let closed = self.state.closed;
        match op {
            Operation::Dump => Ok(OperationOutput::Dump(Box::new(decode_dump_response(body)?))),
            Operation::GetStats => Ok(OperationOutput::Stats(decode_stats_response(body)?)),
            Operation::Pause => {
                if !closed {
                    let was_paused = self.state.is_effectively_paused();
                    self.state.paused = true;
                    if !was_paused {
                        self.buses.observer.safe_emit(&ObserverEvent::Pause);
                    }
                }
                Ok(OperationOutput::Ack)
            }
            Operation::Resume => {
                if !closed {
                    let was_paused = self.state.paused;
                    self.state.paused = false;
                    if was_paused && !self.state.producer_paused {
                        self.buses.observer.safe_emit(&ObserverEvent::Resume);
                    }
                }
                Ok(OperationOutput::Ack)
            }
            Operation::SetPreferredLayers(_) => {
                let layers = decode_set_preferred_layers_response(body)?;
                if !closed {
                    self.state.preferred_layers = layers;
                }
                Ok(OperationOutput::PreferredLayers(layers))
            }
            Operation::SetPriority(_) => {
                let priority = decode_set_priority_response(body)?;
                if !closed {
                    self.state.priority = priority;
                }
                Ok(OperationOutput::Priority(priority))
            }
            Operation::RequestKeyFrame | Operation::EnableTraceEvent(_) => Ok(OperationOutput::Ack),
        }
    }

    fn handle_notification(&mut self, notification: Notification) {
        // Closing detaches the router, so only open consumers get here.
        let Some(inbound) = self.router.decode(notification) else {
            return;
        };

        record_notification(inbound.event());

        match inbound {
            Inbound::ProducerClose => self.handle_producer_close(),

            Inbound::ProducerPause => {
                if self.state.producer_paused {
                    return;
                }
                let was_paused = self.state.is_effectively_paused();
                self.state.producer_paused = true;
                self.buses.events.safe_emit(&ConsumerEvent::ProducerPause);
                if !was_paused {
                    self.buses.observer.safe_emit(&ObserverEvent::Pause);
                }
            }

            Inbound::ProducerResume => {
                if !self.state.producer_paused {
                    return;
                }
                self.state.producer_paused = false;
                self.buses.events.safe_emit(&ConsumerEvent::ProducerResume);
                if !self.state.paused {
                    self.buses.observer.safe_emit(&ObserverEvent::Resume);
                }
            }

            Inbound::Score(score) => {
                self.state.score = score.clone();
                self.buses
                    .events
                    .safe_emit(&ConsumerEvent::Score(score.clone()));
                self.buses.observer.safe_emit(&ObserverEvent::Score(score));
            }

            Inbound::LayersChange(layers) => {
                self.state.current_layers = layers;
                self.buses
                    .events
                    .safe_emit(&ConsumerEvent::LayersChange(layers));
                self.buses
                    .observer
                    .safe_emit(&ObserverEvent::LayersChange(layers));
            }

            Inbound::Trace(trace) => {
                self.buses
                    .events
                    .safe_emit(&ConsumerEvent::Trace(trace.clone()));
                self.buses.observer.safe_emit(&ObserverEvent::Trace(trace));
            }

            Inbound::Rtp(packet) => {
                let sequence = self.router.next_rtp_sequence();
                self.buses
                    .events
                    .safe_emit(&ConsumerEvent::Rtp { sequence, packet });
            }
        }
    }

    /// Shared terminal step. Returns `false` if already closed.
    fn mark_closed(&mut self, reason: CloseReason) -> bool {
        if self.state.closed {
            return false;
        }
        self.state.closed = true;
        self.closed.store(true, Ordering::Release);
        self.router.detach();
        record_closed(reason);
        info!(
            target: "consumer.actor",
            consumer_id = %self.info.id,
            reason = reason.as_str(),
            "Consumer closed"
        );
        true
    }

    fn handle_close(&mut self) {
        if !self.mark_closed(CloseReason::Local) {
            return;
        }
        self.send_remote_close();
        self.buses.internal.safe_emit(&InternalEvent::Close);
        self.buses.observer.safe_emit(&ObserverEvent::Close);
    }

    fn handle_transport_closed(&mut self) {
        if !self.mark_closed(CloseReason::Transport) {
            return;
        }
        self.buses.events.safe_emit(&ConsumerEvent::TransportClose);
        self.buses.observer.safe_emit(&ObserverEvent::Close);
    }

    fn handle_producer_close(&mut self) {
        if !self.mark_closed(CloseReason::Producer) {
            return;
        }
        self.buses.internal.safe_emit(&InternalEvent::ProducerClose);
        self.buses.events.safe_emit(&ConsumerEvent::ProducerClose);
        self.buses.observer.safe_emit(&ObserverEvent::Close);
    }

    /// Fire `transport.close_consumer` without waiting; failures are logged only.
    fn send_remote_close(&self) {
        let consumer_id = self.info.id.to_string();
        let payload = match encode_close_consumer_request(&consumer_id) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    target: "consumer.channel",
                    consumer_id = %consumer_id,
                    error = %e,
                    "Cannot encode close request"
                );
                return;
            }
        };

        let channel = Arc::clone(&self.channel);
        let routing_id = self.info.transport_id.to_string();
        tokio::spawn(async move {
            let method = Method::TransportCloseConsumer;
            let start = Instant::now();
            match channel.request(method, Some(payload), &routing_id).await {
                Ok(_) => record_request(method, "success", start.elapsed()),
                Err(e) => {
                    record_request(method, "error", start.elapsed());
                    warn!(
                        target: "consumer.channel",
                        consumer_id = %consumer_id,
                        error = %e,
                        "Best-effort consumer close failed in worker"
                    );
                }
            }
        });
    }
}
