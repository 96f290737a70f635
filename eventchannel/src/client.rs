use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::codec::{
    Envelope, JsonMethodCodec, MethodCall, MethodCodec, Value, CANCEL_METHOD, LISTEN_METHOD,
};
use crate::error::{ChannelError, ErrorCode, RemoteError, Result};
use crate::transport::{BinaryMessageHandler, BinaryMessenger, Reply};

/// Listening side of an event channel
///
/// Sends `listen` and `cancel` requests to the [`EventChannel`](crate::EventChannel) with
/// the same name on the other end of the messenger, and receives its events. A client
/// has at most one open [`EventStream`] at a time.
///
/// # Example
///
/// ```rust,no_run
/// use eventchannel::{EventStreamClient, MemoryMessenger};
/// use std::sync::Arc;
///
/// # async fn run() -> eventchannel::Result<()> {
/// let (_host, remote) = MemoryMessenger::pair();
/// let client = EventStreamClient::new(Arc::new(remote), "sensors/temperature");
///
/// let mut stream = client.listen(serde_json::json!({"unit": "celsius"})).await?;
/// while let Some(event) = stream.next().await {
///     match event {
///         Ok(reading) => println!("reading: {}", reading),
///         Err(err) => eprintln!("sensor error: {}", err),
///     }
/// }
/// stream.cancel(serde_json::Value::Null).await?;
/// # Ok(())
/// # }
/// ```
pub struct EventStreamClient {
    messenger: Arc<dyn BinaryMessenger>,
    name: String,
    codec: Arc<dyn MethodCodec>,
    listening: Arc<AtomicBool>,
}

impl EventStreamClient {
    /// Create a client using the JSON method codec
    pub fn new(messenger: Arc<dyn BinaryMessenger>, name: impl Into<String>) -> Self {
        Self::with_codec(messenger, name, Arc::new(JsonMethodCodec::new()))
    }

    /// Create a client using the given method codec
    pub fn with_codec(
        messenger: Arc<dyn BinaryMessenger>,
        name: impl Into<String>,
        codec: Arc<dyn MethodCodec>,
    ) -> Self {
        Self {
            messenger,
            name: name.into(),
            codec,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a stream opened by this client is still open
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    /// Start the event stream
    ///
    /// The event handler is installed before the request is sent, so events emitted
    /// while the producer handles `listen` are not lost.
    ///
    /// # Errors
    ///
    /// * `ChannelError::AlreadyListening` - A stream from this client is still open; it is
    ///   left untouched
    /// * `ChannelError::Remote` - The producer refused or failed to start the stream
    /// * `ChannelError::MissingHandler` - No producer is registered under this name
    /// * `ChannelError::Codec` - The request or its reply could not be encoded or decoded
    pub async fn listen(&self, arguments: Value) -> Result<EventStream> {
        if self
            .listening
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("EventStream#{}: rejecting listen, stream already open", self.name);
            return Err(ChannelError::AlreadyListening(self.name.clone()));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.messenger.set_message_handler(
            &self.name,
            Some(Arc::new(IncomingEvents {
                channel: self.name.clone(),
                codec: Arc::clone(&self.codec),
                events: events_tx,
            })),
        );

        // Undoes the registration if the request fails or this future is dropped
        let pending = PendingListen { client: self };
        invoke(
            &*self.messenger,
            &*self.codec,
            &self.name,
            LISTEN_METHOD,
            arguments,
        )
        .await?;
        std::mem::forget(pending);

        log::debug!("EventStream#{}: listening", self.name);
        Ok(EventStream {
            events: events_rx,
            messenger: Arc::clone(&self.messenger),
            name: self.name.clone(),
            codec: Arc::clone(&self.codec),
            listening: Arc::clone(&self.listening),
            ended: false,
            cancelled: false,
        })
    }
}

struct PendingListen<'a> {
    client: &'a EventStreamClient,
}

impl Drop for PendingListen<'_> {
    fn drop(&mut self) {
        self.client.messenger.set_message_handler(&self.client.name, None);
        self.client.listening.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for EventStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStreamClient")
            .field("name", &self.name)
            .finish()
    }
}

enum Incoming {
    Event(std::result::Result<Value, RemoteError>),
    End,
}

/// Receives events sent by the producer and forwards them to the [`EventStream`]
struct IncomingEvents {
    channel: String,
    codec: Arc<dyn MethodCodec>,
    events: mpsc::UnboundedSender<Incoming>,
}

impl BinaryMessageHandler for IncomingEvents {
    fn on_message(&self, message: Option<Bytes>, reply: Reply) {
        let incoming = match message {
            None => Incoming::End,
            Some(message) => match self.codec.decode_envelope(&message) {
                Ok(Envelope::Success(value)) => Incoming::Event(Ok(value)),
                Ok(Envelope::Error {
                    code,
                    message,
                    details,
                }) => Incoming::Event(Err(RemoteError::new(code, message, details))),
                Err(err) => {
                    log::error!("EventStream#{}: Failed to decode event: {}", self.channel, err);
                    Incoming::Event(Err(RemoteError::new(
                        ErrorCode::Decode.as_str(),
                        Some(err.detail().to_string()),
                        Value::Null,
                    )))
                }
            },
        };

        if self.events.send(incoming).is_err() {
            log::debug!("EventStream#{}: stream dropped, discarding event", self.channel);
        }
        reply.send(None);
    }
}

/// An active event stream
///
/// Yields events in the order the producer emitted them until the producer ends the
/// stream. Dropping the stream without calling [`cancel`](EventStream::cancel) still
/// tears it down: the event handler is removed and a `cancel` request is sent without
/// waiting for its reply. The client can open a new stream once this one is gone.
pub struct EventStream {
    events: mpsc::UnboundedReceiver<Incoming>,
    messenger: Arc<dyn BinaryMessenger>,
    name: String,
    codec: Arc<dyn MethodCodec>,
    listening: Arc<AtomicBool>,
    ended: bool,
    cancelled: bool,
}

impl EventStream {
    /// Wait for the next event
    ///
    /// Returns `None` once the producer has ended the stream.
    pub async fn next(&mut self) -> Option<std::result::Result<Value, RemoteError>> {
        if self.ended {
            return None;
        }
        match self.events.recv().await {
            Some(Incoming::Event(event)) => Some(event),
            Some(Incoming::End) | None => {
                self.ended = true;
                None
            }
        }
    }

    /// Take the next event if one has already arrived
    pub fn try_next(&mut self) -> Option<std::result::Result<Value, RemoteError>> {
        if self.ended {
            return None;
        }
        match self.events.try_recv() {
            Ok(Incoming::Event(event)) => Some(event),
            Ok(Incoming::End) | Err(mpsc::error::TryRecvError::Disconnected) => {
                self.ended = true;
                None
            }
            Err(mpsc::error::TryRecvError::Empty) => None,
        }
    }

    /// Whether the producer has ended the stream and all its events were consumed
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the stream and wait for the producer to acknowledge
    ///
    /// Events still queued are discarded.
    pub async fn cancel(mut self, arguments: Value) -> Result<()> {
        self.cancelled = true;
        self.messenger.set_message_handler(&self.name, None);
        log::debug!("EventStream#{}: cancelling", self.name);
        invoke(&*self.messenger, &*self.codec, &self.name, CANCEL_METHOD, arguments).await
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if !self.cancelled {
            self.messenger.set_message_handler(&self.name, None);
            match self
                .codec
                .encode_method_call(&MethodCall::new(CANCEL_METHOD, Value::Null))
            {
                Ok(message) => self.messenger.send(&self.name, Some(message)),
                Err(err) => {
                    log::error!("EventStream#{}: Failed to encode cancel: {}", self.name, err)
                }
            }
        }
        self.listening.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("name", &self.name)
            .field("ended", &self.ended)
            .finish()
    }
}

/// Send a lifecycle request and map its reply envelope
async fn invoke(
    messenger: &dyn BinaryMessenger,
    codec: &dyn MethodCodec,
    channel: &str,
    method: &str,
    arguments: Value,
) -> Result<()> {
    let message = codec.encode_method_call(&MethodCall::new(method, arguments))?;
    let (reply_tx, reply_rx) = oneshot::channel();
    messenger.send_with_reply(
        channel,
        Some(message),
        Some(Box::new(move |response: Option<Bytes>| {
            let _ = reply_tx.send(response);
        })),
    );

    let response = reply_rx
        .await
        .map_err(|_| ChannelError::ReplyDropped(channel.to_string()))?
        .ok_or_else(|| ChannelError::MissingHandler(channel.to_string()))?;

    match codec.decode_envelope(&response)? {
        Envelope::Success(_) => Ok(()),
        Envelope::Error {
            code,
            message,
            details,
        } => Err(RemoteError::new(code, message, details).into()),
    }
}
