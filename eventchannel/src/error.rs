use crate::codec::Value;

/// Failure raised by user-supplied stream handler callbacks
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Error codes carried by the error envelopes this crate emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The lifecycle request could not be decoded
    Decode,
    /// A stream handler callback failed or panicked
    Uncaught,
    /// An event or error could not be encoded for emission
    Encode,
    /// Protocol misuse: double listen or cancel without listen
    Error,
}

impl ErrorCode {
    /// Get the code string as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Decode => "decode",
            ErrorCode::Uncaught => "uncaught",
            ErrorCode::Encode => "encode",
            ErrorCode::Error => "error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types for codec operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to decode message: {0}")]
    Decode(String),

    #[error("Failed to encode value: {0}")]
    Encode(String),
}

impl CodecError {
    /// The underlying failure description, without the decode/encode prefix
    pub fn detail(&self) -> &str {
        match self {
            CodecError::Decode(msg) | CodecError::Encode(msg) => msg,
        }
    }
}

/// An error envelope received from the other side of a channel
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {}", .message.as_deref().unwrap_or("<no message>"))]
pub struct RemoteError {
    pub code: String,
    pub message: Option<String>,
    pub details: Value,
}

impl RemoteError {
    pub fn new(code: impl Into<String>, message: Option<String>, details: Value) -> Self {
        Self {
            code: code.into(),
            message,
            details,
        }
    }
}

/// Error types for channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Invalid channel configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("No handler registered on the other side of channel '{0}'")]
    MissingHandler(String),

    #[error("Reply for channel '{0}' was dropped by the transport")]
    ReplyDropped(String),

    #[error("A stream is already open on channel '{0}'")]
    AlreadyListening(String),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

/// Result type for channel operations
pub type Result<T> = std::result::Result<T, ChannelError>;
