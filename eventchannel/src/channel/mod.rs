pub mod handler;
pub mod sink;
pub mod slot;
pub mod stats;

use std::sync::Arc;

use crate::codec::{JsonMethodCodec, MethodCodec};
use crate::error::{ChannelError, Result};
use crate::transport::{BinaryMessageHandler, BinaryMessenger};

pub use handler::{StreamHandler, StreamHandlerFn};
pub use sink::EventSink;
pub use slot::SessionToken;
pub use stats::ChannelStats;

use handler::StreamRequestHandler;
use stats::StatsCounters;

/// Identity and collaborators of a channel, shared with its request handler and sinks
pub(crate) struct ChannelShared {
    pub(crate) name: String,
    pub(crate) messenger: Arc<dyn BinaryMessenger>,
    pub(crate) codec: Arc<dyn MethodCodec>,
    pub(crate) counters: StatsCounters,
}

/// A named channel for publishing an event stream to the other side of a transport
///
/// The other side starts the stream with a `listen` request and stops it with
/// `cancel`; in between, the registered [`StreamHandler`] emits events through the
/// [`EventSink`] it was given. At most one stream is active on a channel at a time.
///
/// The channel's identity is its name. Identically named channels on the same
/// messenger interfere with each other.
///
/// # Example
///
/// ```rust,no_run
/// use eventchannel::{EventChannel, MemoryMessenger, StreamHandlerFn};
/// use std::sync::Arc;
///
/// let (host, _remote) = MemoryMessenger::pair();
/// let channel = EventChannel::new(Arc::new(host), "battery/level");
///
/// channel.set_stream_handler(Some(Arc::new(StreamHandlerFn::new(|_args, sink| {
///     sink.success(&87);
///     Ok(())
/// }))));
/// ```
pub struct EventChannel {
    shared: Arc<ChannelShared>,
}

impl EventChannel {
    /// Create a channel using the JSON method codec
    ///
    /// # Arguments
    ///
    /// * `messenger` - Transport connecting this side to the listener
    /// * `name` - Channel name; must match the listener's
    pub fn new(messenger: Arc<dyn BinaryMessenger>, name: impl Into<String>) -> Self {
        Self::with_codec(messenger, name, Arc::new(JsonMethodCodec::new()))
    }

    /// Create a channel using the given method codec
    pub fn with_codec(
        messenger: Arc<dyn BinaryMessenger>,
        name: impl Into<String>,
        codec: Arc<dyn MethodCodec>,
    ) -> Self {
        Self {
            shared: Arc::new(ChannelShared {
                name: name.into(),
                messenger,
                codec,
                counters: StatsCounters::default(),
            }),
        }
    }

    /// Start building a channel with a validated configuration
    pub fn builder(name: impl Into<String>) -> EventChannelBuilder {
        EventChannelBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn codec(&self) -> &Arc<dyn MethodCodec> {
        &self.shared.codec
    }

    /// Register the producer of this channel's events
    ///
    /// Replaces any registration for the channel name on the messenger, including one
    /// made by another channel with the same name. Each registration starts idle.
    /// With `None`, the registration is removed and requests for this name receive the
    /// transport's empty reply.
    pub fn set_stream_handler(&self, handler: Option<Arc<dyn StreamHandler>>) {
        let request_handler = handler.map(|handler| {
            Arc::new(StreamRequestHandler::new(Arc::clone(&self.shared), handler))
                as Arc<dyn BinaryMessageHandler>
        });
        self.shared
            .messenger
            .set_message_handler(&self.shared.name, request_handler);
    }

    /// Snapshot of the traffic counters for this channel
    pub fn stats(&self) -> ChannelStats {
        self.shared.counters.snapshot()
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.shared.name)
            .finish()
    }
}

/// Builder for [`EventChannel`] that validates the channel configuration
///
/// ```rust,no_run
/// use eventchannel::{EventChannel, JsonMethodCodec, MemoryMessenger};
/// use std::sync::Arc;
///
/// let (host, _remote) = MemoryMessenger::pair();
/// let channel = EventChannel::builder("sensors/accelerometer")
///     .with_codec(Arc::new(JsonMethodCodec::new()))
///     .build(Arc::new(host))?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct EventChannelBuilder {
    name: String,
    codec: Option<Arc<dyn MethodCodec>>,
}

impl EventChannelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            codec: None,
        }
    }

    /// Use `codec` instead of the JSON method codec
    pub fn with_codec(mut self, codec: Arc<dyn MethodCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ChannelError::InvalidConfiguration(
                "Channel name must not be empty".to_string(),
            ));
        }
        if self.name.trim() != self.name {
            return Err(ChannelError::InvalidConfiguration(format!(
                "Channel name '{}' has leading or trailing whitespace",
                self.name
            )));
        }
        Ok(())
    }

    /// Validate the configuration and create the channel on `messenger`
    pub fn build(self, messenger: Arc<dyn BinaryMessenger>) -> Result<EventChannel> {
        self.validate()?;
        let codec = self
            .codec
            .unwrap_or_else(|| Arc::new(JsonMethodCodec::new()) as Arc<dyn MethodCodec>);
        Ok(EventChannel::with_codec(messenger, self.name, codec))
    }
}

impl std::fmt::Debug for EventChannelBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannelBuilder")
            .field("name", &self.name)
            .field("custom_codec", &self.codec.is_some())
            .finish()
    }
}
