mod common;

use std::sync::Arc;

use common::{is_error, success, RecordingMessenger, CHANNEL};
use eventchannel::{EventChannel, EventSink, HandlerError, StreamHandler, Value};
use mockall::{mock, predicate::*, Sequence};
use serde_json::json;

mock! {
    pub Handler {}

    impl StreamHandler for Handler {
        fn on_listen(&self, arguments: Value, sink: EventSink) -> Result<(), HandlerError>;
        fn on_cancel(&self, arguments: Value) -> Result<(), HandlerError>;
    }
}

fn channel_with(handler: MockHandler) -> (Arc<RecordingMessenger>, EventChannel) {
    let messenger = RecordingMessenger::new();
    let channel = EventChannel::new(messenger.clone(), CHANNEL);
    channel.set_stream_handler(Some(Arc::new(handler)));
    (messenger, channel)
}

#[test]
fn test_callbacks_alternate_listen_cancel() {
    let mut handler = MockHandler::new();
    let mut seq = Sequence::new();

    handler
        .expect_on_listen()
        .withf(|args, sink| *args == json!({"round": 1}) && sink.is_active())
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    handler
        .expect_on_cancel()
        .with(eq(json!({"round": 1})))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    handler
        .expect_on_listen()
        .withf(|args, _| *args == json!({"round": 2}))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let (messenger, _channel) = channel_with(handler);

    assert_eq!(messenger.request(CHANNEL, "listen", json!({"round": 1})), success(Value::Null));
    assert_eq!(messenger.request(CHANNEL, "cancel", json!({"round": 1})), success(Value::Null));
    assert_eq!(messenger.request(CHANNEL, "listen", json!({"round": 2})), success(Value::Null));
}

#[test]
fn test_rejected_requests_never_reach_handler() {
    let mut handler = MockHandler::new();
    handler.expect_on_listen().times(1).returning(|_, _| Ok(()));
    handler.expect_on_cancel().times(1).returning(|_| Ok(()));

    let (messenger, _channel) = channel_with(handler);

    assert!(is_error(&messenger.cancel(), "error", "No active stream to cancel"));
    assert_eq!(messenger.listen(), success(Value::Null));
    assert!(is_error(&messenger.listen(), "error", "Stream already active"));
    assert_eq!(messenger.cancel(), success(Value::Null));
    assert!(is_error(&messenger.cancel(), "error", "No active stream to cancel"));
}

#[test]
fn test_unknown_methods_never_reach_handler() {
    let mut handler = MockHandler::new();
    handler.expect_on_listen().never();
    handler.expect_on_cancel().never();

    let (messenger, _channel) = channel_with(handler);

    assert_eq!(messenger.request(CHANNEL, "resume", Value::Null), None);
    assert_eq!(messenger.request(CHANNEL, "LISTEN", Value::Null), None);
}

#[test]
fn test_sink_emits_from_listen_callback() {
    let mut handler = MockHandler::new();
    handler.expect_on_listen().times(1).returning(|_, sink| {
        sink.success(&json!({"state": "charging"}));
        Ok(())
    });

    let (messenger, _channel) = channel_with(handler);
    messenger.listen();

    assert_eq!(messenger.sent_envelopes(), vec![success(json!({"state": "charging"}))]);
}

#[test]
fn test_handler_error_message_is_forwarded() {
    let mut handler = MockHandler::new();
    handler
        .expect_on_listen()
        .times(2)
        .returning(|_, _| {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such device").into())
        });

    let (messenger, channel) = channel_with(handler);

    assert!(is_error(&messenger.listen(), "uncaught", "no such device"));
    assert!(is_error(&messenger.listen(), "uncaught", "no such device"));
    assert_eq!(channel.stats().listens_accepted, 0);
}
