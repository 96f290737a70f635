// Shared test utilities for the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use eventchannel::{
    BinaryMessageHandler, BinaryMessenger, CodecError, Envelope, JsonMethodCodec, MethodCall,
    MethodCodec, Reply, ReplyCallback, Value,
};

pub const CHANNEL: &str = "test/events";

/// Messenger that records one-way sends and lets tests drive the installed handlers
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, Option<Bytes>)>>,
    handlers: Mutex<HashMap<String, Arc<dyn BinaryMessageHandler>>>,
}

impl RecordingMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver a raw message to the handler for `channel` and return its single reply
    pub fn request_raw(&self, channel: &str, message: Option<Bytes>) -> Option<Bytes> {
        let handler = self.handlers.lock().unwrap().get(channel).cloned();
        let replies = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&replies);
        let reply = Reply::new(channel, move |response: Option<Bytes>| {
            recorded.lock().unwrap().push(response)
        });

        match handler {
            Some(handler) => handler.on_message(message, reply),
            None => reply.send(None),
        }

        let mut replies = replies.lock().unwrap();
        assert_eq!(replies.len(), 1, "every request must receive exactly one reply");
        replies.pop().unwrap()
    }

    /// Send a JSON-encoded lifecycle call and decode the reply envelope
    pub fn request(&self, channel: &str, method: &str, arguments: Value) -> Option<Envelope> {
        let message = JsonMethodCodec::new()
            .encode_method_call(&MethodCall::new(method, arguments))
            .unwrap();
        self.request_raw(channel, Some(message)).map(|reply| decode(&reply))
    }

    pub fn listen(&self) -> Option<Envelope> {
        self.request(CHANNEL, "listen", Value::Null)
    }

    pub fn cancel(&self) -> Option<Envelope> {
        self.request(CHANNEL, "cancel", Value::Null)
    }

    pub fn has_handler(&self, channel: &str) -> bool {
        self.handlers.lock().unwrap().contains_key(channel)
    }

    /// All one-way messages sent so far
    pub fn sent(&self) -> Vec<(String, Option<Bytes>)> {
        self.sent.lock().unwrap().clone()
    }

    /// One-way messages decoded as envelopes; `None` marks end of stream
    pub fn sent_envelopes(&self) -> Vec<Option<Envelope>> {
        self.sent()
            .into_iter()
            .map(|(_, message)| message.map(|m| decode(&m)))
            .collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl BinaryMessenger for RecordingMessenger {
    fn send_with_reply(
        &self,
        channel: &str,
        message: Option<Bytes>,
        callback: Option<ReplyCallback>,
    ) {
        self.sent.lock().unwrap().push((channel.to_string(), message));
        if let Some(callback) = callback {
            callback(None);
        }
    }

    fn set_message_handler(&self, channel: &str, handler: Option<Arc<dyn BinaryMessageHandler>>) {
        let mut handlers = self.handlers.lock().unwrap();
        match handler {
            Some(handler) => {
                handlers.insert(channel.to_string(), handler);
            }
            None => {
                handlers.remove(channel);
            }
        }
    }
}

pub fn decode(envelope: &[u8]) -> Envelope {
    JsonMethodCodec::new().decode_envelope(envelope).unwrap()
}

pub fn success(value: Value) -> Option<Envelope> {
    Some(Envelope::Success(value))
}

/// Matches an error envelope by code and message, ignoring details
pub fn is_error(envelope: &Option<Envelope>, expected_code: &str, expected_message: &str) -> bool {
    matches!(
        envelope,
        Some(Envelope::Error { code, message: Some(message), .. })
            if code == expected_code && message.contains(expected_message)
    )
}

/// JSON codec whose success-envelope encoding can be made to fail
#[derive(Default)]
pub struct FlakyCodec {
    pub fail_success: bool,
    pub fail_errors: bool,
    pub fail_decode: bool,
}

impl MethodCodec for FlakyCodec {
    fn encode_method_call(&self, call: &MethodCall) -> Result<Bytes, CodecError> {
        JsonMethodCodec::new().encode_method_call(call)
    }

    fn decode_method_call(&self, message: Option<&[u8]>) -> Result<MethodCall, CodecError> {
        if self.fail_decode {
            return Err(CodecError::Decode("corrupt frame".to_string()));
        }
        JsonMethodCodec::new().decode_method_call(message)
    }

    fn encode_success_envelope(&self, result: &Value) -> Result<Bytes, CodecError> {
        if self.fail_success {
            return Err(CodecError::Encode("unsupported value".to_string()));
        }
        JsonMethodCodec::new().encode_success_envelope(result)
    }

    fn encode_error_envelope(
        &self,
        code: &str,
        message: Option<&str>,
        details: Option<&Value>,
    ) -> Result<Bytes, CodecError> {
        if self.fail_errors {
            return Err(CodecError::Encode("unsupported error".to_string()));
        }
        JsonMethodCodec::new().encode_error_envelope(code, message, details)
    }

    fn decode_envelope(&self, envelope: &[u8]) -> Result<Envelope, CodecError> {
        JsonMethodCodec::new().decode_envelope(envelope)
    }
}
