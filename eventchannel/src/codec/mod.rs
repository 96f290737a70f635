pub mod json;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

pub use json::JsonMethodCodec;

/// Dynamically typed payload value carried by method calls, events and envelopes
pub type Value = serde_json::Value;

/// Method name of a request that starts an event stream
pub const LISTEN_METHOD: &str = "listen";

/// Method name of a request that tears an event stream down
pub const CANCEL_METHOD: &str = "cancel";

/// A decoded request: a method name plus its arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(rename = "args", default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// A decoded response: either a successful result or an error
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Success(Value),
    Error {
        code: String,
        message: Option<String>,
        details: Value,
    },
}

/// Encodes and decodes method calls and result envelopes to and from binary messages
///
/// Both ends of a channel must use compatible codecs. Failures are always reported as
/// `Err(CodecError)`; no encoded buffer ever stands in for a failure.
pub trait MethodCodec: Send + Sync {
    /// Encode a method call into a binary message
    fn encode_method_call(&self, call: &MethodCall) -> Result<Bytes, CodecError>;

    /// Decode a binary message into a method call
    ///
    /// An absent message is not a valid method call and fails with `CodecError::Decode`.
    fn decode_method_call(&self, message: Option<&[u8]>) -> Result<MethodCall, CodecError>;

    /// Encode a successful result envelope
    fn encode_success_envelope(&self, result: &Value) -> Result<Bytes, CodecError>;

    /// Encode an error result envelope
    fn encode_error_envelope(
        &self,
        code: &str,
        message: Option<&str>,
        details: Option<&Value>,
    ) -> Result<Bytes, CodecError>;

    /// Decode a result envelope produced by one of the encode methods above
    fn decode_envelope(&self, envelope: &[u8]) -> Result<Envelope, CodecError>;
}
