use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;

use super::sink::EventSink;
use super::slot::ActiveSlot;
use super::stats::bump;
use super::ChannelShared;
use crate::codec::{Value, CANCEL_METHOD, LISTEN_METHOD};
use crate::error::{ErrorCode, HandlerError};
use crate::transport::{BinaryMessageHandler, Reply};

/// Producer side of an event channel
///
/// Implementations must accept alternating calls to `on_listen` and `on_cancel`, and
/// should hold no resources while the last call was not `on_listen`. Typically
/// `on_listen` registers with an event source and `on_cancel` deregisters again.
///
/// Returning an error, or panicking, from either method is reported to the listener as
/// an `uncaught` error. A failed `on_listen` leaves the channel idle.
pub trait StreamHandler: Send + Sync {
    /// Start producing events into `sink`
    ///
    /// # Arguments
    ///
    /// * `arguments` - Stream configuration sent by the listener, possibly null
    /// * `sink` - Handle for emitting events; may be cloned and moved to other threads
    fn on_listen(&self, arguments: Value, sink: EventSink) -> Result<(), HandlerError>;

    /// Stop producing events and release resources
    ///
    /// # Arguments
    ///
    /// * `arguments` - Arguments sent with the cancel request, possibly null
    fn on_cancel(&self, arguments: Value) -> Result<(), HandlerError>;
}

type ListenFn = Box<dyn Fn(Value, EventSink) -> Result<(), HandlerError> + Send + Sync>;
type CancelFn = Box<dyn Fn(Value) -> Result<(), HandlerError> + Send + Sync>;

/// [`StreamHandler`] assembled from closures
///
/// # Example
///
/// ```rust,no_run
/// use eventchannel::StreamHandlerFn;
///
/// let handler = StreamHandlerFn::new(|_args, sink| {
///     sink.success("hello");
///     sink.end_of_stream();
///     Ok(())
/// })
/// .with_cancel(|_args| Ok(()));
/// ```
pub struct StreamHandlerFn {
    on_listen: ListenFn,
    on_cancel: Option<CancelFn>,
}

impl StreamHandlerFn {
    /// Create a handler from a listen closure; cancel does nothing until set
    pub fn new<F>(on_listen: F) -> Self
    where
        F: Fn(Value, EventSink) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self {
            on_listen: Box::new(on_listen),
            on_cancel: None,
        }
    }

    /// Set the cancel closure
    pub fn with_cancel<F>(mut self, on_cancel: F) -> Self
    where
        F: Fn(Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.on_cancel = Some(Box::new(on_cancel));
        self
    }
}

impl StreamHandler for StreamHandlerFn {
    fn on_listen(&self, arguments: Value, sink: EventSink) -> Result<(), HandlerError> {
        (self.on_listen)(arguments, sink)
    }

    fn on_cancel(&self, arguments: Value) -> Result<(), HandlerError> {
        match &self.on_cancel {
            Some(on_cancel) => on_cancel(arguments),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for StreamHandlerFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandlerFn")
            .field("has_cancel", &self.on_cancel.is_some())
            .finish()
    }
}

/// Transport-facing handler of `listen`/`cancel` requests for one channel
///
/// Owns the channel's active-session slot. Every request is answered exactly once.
pub(crate) struct StreamRequestHandler {
    channel: Arc<ChannelShared>,
    handler: Arc<dyn StreamHandler>,
    slot: Arc<ActiveSlot>,
}

impl StreamRequestHandler {
    pub(crate) fn new(channel: Arc<ChannelShared>, handler: Arc<dyn StreamHandler>) -> Self {
        Self {
            channel,
            handler,
            slot: Arc::new(ActiveSlot::new()),
        }
    }

    fn on_listen(&self, arguments: Value, reply: Reply) {
        let token = self.slot.issue();
        if !self.slot.try_claim(token) {
            bump(&self.channel.counters.listens_rejected);
            log::debug!(
                "EventChannel#{}: rejecting listen, stream already active",
                self.channel.name
            );
            reply.send(self.error_envelope(ErrorCode::Error, "Stream already active"));
            return;
        }

        let sink = EventSink::new(token, Arc::clone(&self.slot), Arc::clone(&self.channel));
        match invoke_guarded(|| self.handler.on_listen(arguments, sink)) {
            Ok(()) => {
                bump(&self.channel.counters.listens_accepted);
                log::debug!("EventChannel#{}: session {} listening", self.channel.name, token);
                reply.send(self.success_envelope());
            }
            Err(message) => {
                self.slot.release(token);
                log::error!(
                    "EventChannel#{}: Failed to open event stream: {}",
                    self.channel.name,
                    message
                );
                reply.send(self.error_envelope(ErrorCode::Uncaught, &message));
            }
        }
    }

    fn on_cancel(&self, arguments: Value, reply: Reply) {
        let Some(token) = self.slot.take() else {
            log::debug!("EventChannel#{}: rejecting cancel, no active stream", self.channel.name);
            reply.send(self.error_envelope(ErrorCode::Error, "No active stream to cancel"));
            return;
        };

        bump(&self.channel.counters.cancels);
        log::debug!("EventChannel#{}: session {} cancelled", self.channel.name, token);
        match invoke_guarded(|| self.handler.on_cancel(arguments)) {
            Ok(()) => reply.send(self.success_envelope()),
            Err(message) => {
                log::error!(
                    "EventChannel#{}: Failed to close event stream: {}",
                    self.channel.name,
                    message
                );
                reply.send(self.error_envelope(ErrorCode::Uncaught, &message));
            }
        }
    }

    fn success_envelope(&self) -> Option<Bytes> {
        match self.channel.codec.encode_success_envelope(&Value::Null) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                log::error!("EventChannel#{}: Failed to encode reply: {}", self.channel.name, err);
                None
            }
        }
    }

    fn error_envelope(&self, code: ErrorCode, message: &str) -> Option<Bytes> {
        match self.channel.codec.encode_error_envelope(code.as_str(), Some(message), None) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                log::error!(
                    "EventChannel#{}: Failed to encode {} reply: {}",
                    self.channel.name,
                    code,
                    err
                );
                None
            }
        }
    }
}

impl BinaryMessageHandler for StreamRequestHandler {
    fn on_message(&self, message: Option<Bytes>, reply: Reply) {
        let call = match self.channel.codec.decode_method_call(message.as_deref()) {
            Ok(call) => call,
            Err(err) => {
                log::error!(
                    "EventChannel#{}: Failed to decode event stream lifecycle call: {}",
                    self.channel.name,
                    err
                );
                reply.send(self.error_envelope(ErrorCode::Decode, err.detail()));
                return;
            }
        };

        match call.method.as_str() {
            LISTEN_METHOD => self.on_listen(call.arguments, reply),
            CANCEL_METHOD => self.on_cancel(call.arguments, reply),
            other => {
                log::debug!(
                    "EventChannel#{}: ignoring unknown method '{}'",
                    self.channel.name,
                    other
                );
                reply.send(None);
            }
        }
    }
}

/// Run a stream handler callback, turning an error or a panic into its message
fn invoke_guarded<F>(callback: F) -> Result<(), String>
where
    F: FnOnce() -> Result<(), HandlerError>,
{
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "stream handler panicked".to_string()
    }
}
