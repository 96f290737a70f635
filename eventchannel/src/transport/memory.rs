use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;

use super::{BinaryMessageHandler, BinaryMessenger, Reply, ReplyCallback};

/// Handlers registered on one end of a [`MemoryMessenger`] pair
#[derive(Default)]
struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn BinaryMessageHandler>>>,
}

impl HandlerRegistry {
    fn get(&self, channel: &str) -> Option<Arc<dyn BinaryMessageHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(channel)
            .cloned()
    }

    fn set(&self, channel: &str, handler: Option<Arc<dyn BinaryMessageHandler>>) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        match handler {
            Some(handler) => {
                handlers.insert(channel.to_string(), handler);
            }
            None => {
                handlers.remove(channel);
            }
        }
    }

    fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// In-process transport connecting two endpoints
///
/// A message sent on one endpoint is delivered, on the sending thread, to the handler
/// registered under the same channel name on the other endpoint. The registry lock is
/// released before the handler runs, so handlers may send or re-register freely.
///
/// Handlers typically hold a clone of the messenger they reply through; removing a
/// handler with `set_message_handler(name, None)` releases that reference.
///
/// # Example
///
/// ```rust,no_run
/// use eventchannel::{EventChannel, EventStreamClient, MemoryMessenger};
/// use std::sync::Arc;
///
/// let (host, remote) = MemoryMessenger::pair();
/// let channel = EventChannel::new(Arc::new(host), "sensors/temperature");
/// let client = EventStreamClient::new(Arc::new(remote), "sensors/temperature");
/// ```
#[derive(Clone)]
pub struct MemoryMessenger {
    local: Arc<HandlerRegistry>,
    peer: Arc<HandlerRegistry>,
}

impl MemoryMessenger {
    /// Create two connected endpoints
    pub fn pair() -> (MemoryMessenger, MemoryMessenger) {
        let a = Arc::new(HandlerRegistry::default());
        let b = Arc::new(HandlerRegistry::default());
        (
            MemoryMessenger {
                local: Arc::clone(&a),
                peer: Arc::clone(&b),
            },
            MemoryMessenger { local: b, peer: a },
        )
    }

    /// Whether a handler is registered under `channel` on this endpoint
    pub fn has_handler(&self, channel: &str) -> bool {
        self.local.get(channel).is_some()
    }

    /// Number of handlers registered on this endpoint
    pub fn handler_count(&self) -> usize {
        self.local.len()
    }
}

impl BinaryMessenger for MemoryMessenger {
    fn send_with_reply(
        &self,
        channel: &str,
        message: Option<Bytes>,
        callback: Option<ReplyCallback>,
    ) {
        match self.peer.get(channel) {
            Some(handler) => {
                log::trace!(
                    "Delivering {} byte message on channel '{}'",
                    message.as_ref().map_or(0, |m| m.len()),
                    channel
                );
                handler.on_message(message, Reply::from_callback(channel, callback));
            }
            None => {
                log::debug!("No handler for channel '{}', replying empty", channel);
                if let Some(callback) = callback {
                    callback(None);
                }
            }
        }
    }

    fn set_message_handler(&self, channel: &str, handler: Option<Arc<dyn BinaryMessageHandler>>) {
        log::debug!(
            "{} message handler for channel '{}'",
            if handler.is_some() { "Installing" } else { "Removing" },
            channel
        );
        self.local.set(channel, handler);
    }
}
