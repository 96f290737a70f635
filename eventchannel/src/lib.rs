//! Named event streams over an opaque binary transport.
//!
//! One side registers a [`StreamHandler`] on an [`EventChannel`]; the other side starts
//! and stops the stream with `listen`/`cancel` requests (see [`EventStreamClient`]) and
//! receives the events the handler emits through its [`EventSink`].

pub mod channel;
pub mod client;
pub mod codec;
pub mod error;
pub mod transport;

// Re-export key types for easier access
pub use channel::{
    ChannelStats, EventChannel, EventChannelBuilder, EventSink, SessionToken, StreamHandler,
    StreamHandlerFn,
};
pub use client::{EventStream, EventStreamClient};
pub use codec::{Envelope, JsonMethodCodec, MethodCall, MethodCodec, Value};
pub use error::{ChannelError, CodecError, ErrorCode, HandlerError, RemoteError, Result};
pub use transport::{BinaryMessageHandler, BinaryMessenger, MemoryMessenger, Reply, ReplyCallback};
