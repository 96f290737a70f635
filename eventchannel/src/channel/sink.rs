use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use super::slot::{ActiveSlot, SessionToken};
use super::stats::bump;
use super::ChannelShared;
use crate::error::{CodecError, ErrorCode};

/// Handle through which a stream handler emits events for one listen session
///
/// Handed to [`StreamHandler::on_listen`](super::StreamHandler::on_listen). Clones share
/// the same session and may be moved to other threads; every method is safe to call
/// concurrently with the others and with cancellation of the session.
///
/// Once the session is cancelled, or after [`end_of_stream`](EventSink::end_of_stream),
/// all methods are silent no-ops. A call that already passed the active check when a
/// concurrent cancel lands may still reach the transport.
#[derive(Clone)]
pub struct EventSink {
    inner: Arc<SinkState>,
}

struct SinkState {
    token: SessionToken,
    ended: AtomicBool,
    slot: Arc<ActiveSlot>,
    channel: Arc<ChannelShared>,
}

impl EventSink {
    pub(crate) fn new(
        token: SessionToken,
        slot: Arc<ActiveSlot>,
        channel: Arc<ChannelShared>,
    ) -> Self {
        Self {
            inner: Arc::new(SinkState {
                token,
                ended: AtomicBool::new(false),
                slot,
                channel,
            }),
        }
    }

    /// The session this sink belongs to
    pub fn token(&self) -> SessionToken {
        self.inner.token
    }

    /// Whether events submitted now would be sent
    pub fn is_active(&self) -> bool {
        !self.inner.ended.load(Ordering::Acquire) && self.inner.slot.is_active(self.inner.token)
    }

    /// Whether `end_of_stream` has been called on this sink
    pub fn has_ended(&self) -> bool {
        self.inner.ended.load(Ordering::Acquire)
    }

    /// Emit a successful event
    ///
    /// If the event cannot be encoded, the failure is logged and an `encode` error event
    /// carrying the failure message is sent in its place.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use eventchannel::EventSink;
    /// # let sink: EventSink = todo!();
    /// sink.success(&serde_json::json!({"celsius": 21.5}));
    /// sink.success("plain string events work too");
    /// ```
    pub fn success<T: Serialize + ?Sized>(&self, event: &T) {
        if !self.is_active() {
            self.discard("event");
            return;
        }
        let codec = &self.inner.channel.codec;
        let encoded = serde_json::to_value(event)
            .map_err(|e| CodecError::Encode(e.to_string()))
            .and_then(|value| codec.encode_success_envelope(&value));
        self.emit(encoded, "event");
    }

    /// Emit an error event
    ///
    /// `details` is any serializable value; pass `&()` for none. If the error cannot be
    /// encoded, a generic `encode` error event is sent instead and the original code and
    /// details are lost.
    pub fn error<D: Serialize + ?Sized>(&self, code: &str, message: Option<&str>, details: &D) {
        if !self.is_active() {
            self.discard("error");
            return;
        }
        let codec = &self.inner.channel.codec;
        let encoded = serde_json::to_value(details)
            .map_err(|e| CodecError::Encode(e.to_string()))
            .and_then(|details| {
                let details = if details.is_null() { None } else { Some(&details) };
                codec.encode_error_envelope(code, message, details)
            });
        self.emit(encoded, "error");
    }

    /// Signal that the stream is complete
    ///
    /// Sends the empty end-of-stream message at most once; later calls to any method
    /// of this sink have no effect.
    pub fn end_of_stream(&self) {
        if self.inner.ended.swap(true, Ordering::AcqRel)
            || !self.inner.slot.is_active(self.inner.token)
        {
            return;
        }
        let channel = &self.inner.channel;
        log::debug!(
            "EventChannel#{}: end of stream for session {}",
            channel.name,
            self.inner.token
        );
        channel.messenger.send(&channel.name, None);
    }

    fn emit(&self, encoded: Result<Bytes, CodecError>, what: &str) {
        let channel = &self.inner.channel;
        match encoded {
            Ok(message) => {
                bump(&channel.counters.events_sent);
                channel.messenger.send(&channel.name, Some(message));
            }
            Err(err) => {
                bump(&channel.counters.encode_failures);
                log::error!("EventChannel#{}: Failed to encode {}: {}", channel.name, what, err);
                match channel
                    .codec
                    .encode_error_envelope(ErrorCode::Encode.as_str(), Some(err.detail()), None)
                {
                    Ok(message) => channel.messenger.send(&channel.name, Some(message)),
                    Err(err) => log::error!(
                        "EventChannel#{}: Failed to encode {} error, dropping it: {}",
                        channel.name,
                        ErrorCode::Encode,
                        err
                    ),
                }
            }
        }
    }

    fn discard(&self, what: &str) {
        bump(&self.inner.channel.counters.events_dropped);
        log::trace!(
            "EventChannel#{}: dropping {} from inactive session {}",
            self.inner.channel.name,
            what,
            self.inner.token
        );
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("channel", &self.inner.channel.name)
            .field("token", &self.inner.token)
            .field("ended", &self.has_ended())
            .field("active_session", &self.inner.slot.current())
            .finish()
    }
}
