//! Consumer operation integration tests.
//!
//! Exercises every remote-backed operation against `MockChannel`: payloads
//! sent, responses decoded, state cached and observer signals emitted.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use bytes::Bytes;
use consumer_controller::channel::ChannelError;
use consumer_controller::events::ObserverEvent;
use consumer_controller::ConsumerError;
use consumer_test_utils::*;
use worker_protocol::decode::{decode_enable_trace_event_request, decode_set_priority_request};
use worker_protocol::encode::{encode_dump_response, encode_stats_response};
use worker_protocol::{CodecError, ConsumerTraceEventType, ConsumerType, Event, Method};

#[tokio::test]
async fn test_pause_resume_with_producer_pause_scenario() {
    let channel = MockChannel::new();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());
    let id = consumer.id().to_string();
    let mut observer = EventRecorder::attach(consumer.observer());

    consumer.pause().await.unwrap();
    assert!(consumer.state().await.unwrap().paused);
    assert_eq!(observer.drain(), vec![ObserverEvent::Pause]);

    assert!(channel.notify(&id, Event::ProducerPause, None));
    assert!(consumer.state().await.unwrap().producer_paused);
    observer.assert_empty();

    consumer.resume().await.unwrap();
    let state = consumer.state().await.unwrap();
    assert!(!state.paused);
    assert!(state.producer_paused);
    observer.assert_empty();

    assert!(channel.notify(&id, Event::ProducerResume, None));
    assert!(!consumer.state().await.unwrap().producer_paused);
    assert_eq!(observer.drain(), vec![ObserverEvent::Resume]);
}

#[tokio::test]
async fn test_repeated_pause_and_resume_emit_only_on_transition() {
    let channel = MockChannel::new();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());
    let mut observer = EventRecorder::attach(consumer.observer());

    consumer.pause().await.unwrap();
    consumer.pause().await.unwrap();
    consumer.resume().await.unwrap();
    consumer.resume().await.unwrap();

    assert_eq!(
        observer.drain(),
        vec![ObserverEvent::Pause, ObserverEvent::Resume]
    );
    assert_eq!(channel.requests_for(Method::ConsumerPause).len(), 2);
    assert_eq!(channel.requests_for(Method::ConsumerResume).len(), 2);
}

#[tokio::test]
async fn test_pause_while_producer_paused_is_silent() {
    let channel = MockChannel::new();
    let options = simulcast_options().with_producer_paused(true);
    let (consumer, _task) = spawn_consumer(&channel, options);
    let mut observer = EventRecorder::attach(consumer.observer());

    consumer.pause().await.unwrap();
    assert!(consumer.state().await.unwrap().paused);
    observer.assert_empty();
}

#[tokio::test]
async fn test_failed_pause_leaves_state_unchanged() {
    let channel = MockChannel::builder()
        .fail(
            Method::ConsumerPause,
            ChannelError::Remote("consumer not found".to_string()),
        )
        .build();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());
    let mut observer = EventRecorder::attach(consumer.observer());

    let err = consumer.pause().await.unwrap_err();
    assert_eq!(err.error_type_label(), "request");
    assert_eq!(
        err.to_string(),
        "Request consumer.pause failed: Worker rejected request: consumer not found"
    );
    assert!(!consumer.state().await.unwrap().paused);
    observer.assert_empty();
}

#[tokio::test]
async fn test_dump_decodes_every_consumer_type() {
    for consumer_type in [
        ConsumerType::Simple,
        ConsumerType::Simulcast,
        ConsumerType::Svc,
        ConsumerType::Pipe,
    ] {
        let options = consumer_options(consumer_type);
        let expected = sample_dump(&options);
        let channel = MockChannel::builder()
            .respond(
                Method::ConsumerDump,
                encode_dump_response(&expected).unwrap(),
            )
            .build();
        let (consumer, _task) = spawn_consumer(&channel, options);

        let dump = consumer.dump().await.unwrap();
        assert_eq!(dump, expected);
        assert_eq!(dump.consumer_type(), consumer_type);

        let request = channel.requests_for(Method::ConsumerDump).pop().unwrap();
        assert_eq!(request.routing_id, consumer.id().to_string());
        assert_eq!(request.payload, None);
    }
}

#[tokio::test]
async fn test_dump_with_unknown_type_is_decode_error() {
    let channel = MockChannel::builder()
        .respond(Method::ConsumerDump, Bytes::from_static(&[0x09, 0x00]))
        .build();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());
    let before = consumer.state().await.unwrap();

    let err = consumer.dump().await.unwrap_err();
    assert!(matches!(
        err,
        ConsumerError::Decode(CodecError::UnknownDiscriminant { value: 9, .. })
    ));
    assert_eq!(consumer.state().await.unwrap(), before);

    // A decode failure is local to the call.
    consumer.pause().await.unwrap();
    assert!(consumer.state().await.unwrap().paused);
}

#[tokio::test]
async fn test_get_stats() {
    let expected = sample_stats();
    let channel = MockChannel::builder()
        .respond(
            Method::ConsumerGetStats,
            encode_stats_response(&expected).unwrap(),
        )
        .build();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());

    assert_eq!(consumer.get_stats().await.unwrap(), expected);

    channel.respond(Method::ConsumerGetStats, None);
    assert!(consumer.get_stats().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stats_with_unknown_direction_is_decode_error() {
    // One entry whose direction byte is neither recv (0) nor send (1).
    let channel = MockChannel::builder()
        .respond(Method::ConsumerGetStats, Bytes::from_static(&[0x00, 0x01, 0x07]))
        .build();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());

    let err = consumer.get_stats().await.unwrap_err();
    assert!(matches!(
        err,
        ConsumerError::Decode(CodecError::UnknownDiscriminant { value: 7, .. })
    ));
}

#[tokio::test]
async fn test_set_priority_validation_happens_before_request() {
    let channel = MockChannel::new();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());

    for invalid in [-1, i64::MIN, i64::from(u32::MAX) + 1] {
        let err = consumer.set_priority(invalid).await.unwrap_err();
        assert!(matches!(err, ConsumerError::Validation(_)), "{invalid}");
    }
    assert_eq!(channel.request_count(), 0);
    assert_eq!(consumer.state().await.unwrap().priority, 1);
}

#[tokio::test]
async fn test_set_priority_caches_worker_value() {
    let channel = MockChannel::new();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());

    assert_eq!(consumer.set_priority(0).await.unwrap(), 0);
    assert_eq!(consumer.state().await.unwrap().priority, 0);

    // The worker may normalize the requested value.
    channel.respond(
        Method::ConsumerSetPriority,
        Some(worker_protocol::encode::encode_set_priority_response(255)),
    );
    assert_eq!(consumer.set_priority(1000).await.unwrap(), 255);
    assert_eq!(consumer.state().await.unwrap().priority, 255);
}

#[tokio::test]
async fn test_unset_priority_is_set_priority_one() {
    let channel = MockChannel::new();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());

    consumer.set_priority(9).await.unwrap();
    assert_eq!(consumer.unset_priority().await.unwrap(), 1);
    assert_eq!(consumer.state().await.unwrap().priority, 1);

    let requests = channel.requests_for(Method::ConsumerSetPriority);
    let sent: Vec<u32> = requests
        .into_iter()
        .map(|r| decode_set_priority_request(r.payload).unwrap())
        .collect();
    assert_eq!(sent, vec![9, 1]);
}

#[tokio::test]
async fn test_set_priority_decode_error_keeps_cached_value() {
    let channel = MockChannel::builder()
        .respond(Method::ConsumerSetPriority, Bytes::from_static(&[0x01]))
        .build();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());

    let err = consumer.set_priority(4).await.unwrap_err();
    assert!(matches!(
        err,
        ConsumerError::Decode(CodecError::InsufficientData)
    ));
    assert_eq!(consumer.state().await.unwrap().priority, 1);
}

#[tokio::test]
async fn test_set_preferred_layers_caches_worker_value() {
    let channel = MockChannel::new();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());

    let confirmed = consumer.set_preferred_layers(2, Some(1)).await.unwrap();
    assert_eq!(confirmed, Some(layers(2, Some(1))));
    assert_eq!(
        consumer.state().await.unwrap().preferred_layers,
        Some(layers(2, Some(1)))
    );
}

#[tokio::test]
async fn test_set_preferred_layers_empty_ack_clears_value() {
    let channel = MockChannel::new();
    let options = consumer_options(ConsumerType::Simple).with_preferred_layers(layers(0, None));
    let (consumer, _task) = spawn_consumer(&channel, options);
    assert_eq!(
        consumer.state().await.unwrap().preferred_layers,
        Some(layers(0, None))
    );

    channel.respond(Method::ConsumerSetPreferredLayers, None);
    assert_eq!(consumer.set_preferred_layers(1, None).await.unwrap(), None);
    assert_eq!(consumer.state().await.unwrap().preferred_layers, None);
}

#[tokio::test]
async fn test_request_key_frame_has_no_state_effect() {
    let channel = MockChannel::new();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());
    let before = consumer.state().await.unwrap();

    consumer.request_key_frame().await.unwrap();

    assert_eq!(consumer.state().await.unwrap(), before);
    assert_eq!(channel.requests_for(Method::ConsumerRequestKeyFrame).len(), 1);
}

#[tokio::test]
async fn test_enable_trace_event_skips_unknown_names() {
    let channel = MockChannel::new();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());

    consumer
        .enable_trace_event(vec!["pli", "sli", "keyframe", "KEYFRAME"])
        .await
        .unwrap();

    let request = channel
        .requests_for(Method::ConsumerEnableTraceEvent)
        .pop()
        .unwrap();
    assert_eq!(
        decode_enable_trace_event_request(request.payload).unwrap(),
        vec![ConsumerTraceEventType::Pli, ConsumerTraceEventType::KeyFrame]
    );
}

#[tokio::test]
async fn test_enable_trace_event_with_no_valid_names_sends_empty_list() {
    let channel = MockChannel::new();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());

    consumer
        .enable_trace_event(Vec::<String>::new())
        .await
        .unwrap();

    let request = channel
        .requests_for(Method::ConsumerEnableTraceEvent)
        .pop()
        .unwrap();
    assert!(decode_enable_trace_event_request(request.payload)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_concurrent_operations_each_complete() {
    let channel = MockChannel::new();
    let (consumer, _task) = spawn_consumer(&channel, simulcast_options());

    let (paused, priority, keyframe) = tokio::join!(
        consumer.pause(),
        consumer.set_priority(3),
        consumer.request_key_frame()
    );
    paused.unwrap();
    assert_eq!(priority.unwrap(), 3);
    keyframe.unwrap();

    let state = consumer.state().await.unwrap();
    assert!(state.paused);
    assert_eq!(state.priority, 3);
}
