pub mod memory;

use std::sync::Arc;

use bytes::Bytes;

pub use memory::MemoryMessenger;

/// Callback receiving the response to a message sent with a reply expected
pub type ReplyCallback = Box<dyn FnOnce(Option<Bytes>) + Send>;

/// Move-only token for answering one incoming message
///
/// `send` consumes the token, so a handler cannot reply twice. A token that is dropped
/// without being consumed answers with an empty reply, so a handler cannot leave a
/// request unanswered either.
pub struct Reply {
    channel: String,
    callback: Option<ReplyCallback>,
}

impl Reply {
    /// Create a reply token for a message received on `channel`
    pub fn new<F>(channel: impl Into<String>, callback: F) -> Self
    where
        F: FnOnce(Option<Bytes>) + Send + 'static,
    {
        Self {
            channel: channel.into(),
            callback: Some(Box::new(callback)),
        }
    }

    /// Reply token for a message sent with or, for one-way messages, without a callback
    pub(crate) fn from_callback(
        channel: impl Into<String>,
        callback: Option<ReplyCallback>,
    ) -> Self {
        Self {
            channel: channel.into(),
            callback,
        }
    }

    /// The channel the answered message arrived on
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Answer the message, consuming the token
    pub fn send(mut self, response: Option<Bytes>) {
        if let Some(callback) = self.callback.take() {
            callback(response);
        }
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            log::warn!(
                "Reply on channel '{}' dropped without a response, replying empty",
                self.channel
            );
            callback(None);
        }
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply")
            .field("channel", &self.channel)
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

/// Handler for binary messages arriving on one channel name
pub trait BinaryMessageHandler: Send + Sync {
    /// Handle an incoming message
    ///
    /// The handler owns `reply` and must answer through it; see [`Reply`].
    fn on_message(&self, message: Option<Bytes>, reply: Reply);
}

/// Opaque binary transport between the two sides of a set of named channels
pub trait BinaryMessenger: Send + Sync {
    /// Send a message on `channel`, optionally expecting a response
    ///
    /// If a callback is given, the transport invokes it exactly once with the response,
    /// which is empty when no handler is registered for `channel` on the other side.
    fn send_with_reply(
        &self,
        channel: &str,
        message: Option<Bytes>,
        callback: Option<ReplyCallback>,
    );

    /// Send a one-way message on `channel`
    fn send(&self, channel: &str, message: Option<Bytes>) {
        self.send_with_reply(channel, message, None);
    }

    /// Install or, with `None`, remove the handler for messages arriving on `channel`
    ///
    /// Installing replaces any handler previously registered under the same name.
    fn set_message_handler(&self, channel: &str, handler: Option<Arc<dyn BinaryMessageHandler>>);
}
