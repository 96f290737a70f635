use bytes::Bytes;

use super::{Envelope, MethodCall, MethodCodec, Value};
use crate::error::CodecError;

/// Method codec using UTF-8 JSON
///
/// Wire layout:
/// - method call: `{"method": "listen", "args": ...}`
/// - success envelope: `[result]`
/// - error envelope: `[code, message, details]`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMethodCodec;

impl JsonMethodCodec {
    pub fn new() -> Self {
        Self
    }
}

fn encode_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes, CodecError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| CodecError::Encode(e.to_string()))
}

fn decode_json(bytes: &[u8]) -> Result<Value, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

impl MethodCodec for JsonMethodCodec {
    fn encode_method_call(&self, call: &MethodCall) -> Result<Bytes, CodecError> {
        encode_json(call)
    }

    fn decode_method_call(&self, message: Option<&[u8]>) -> Result<MethodCall, CodecError> {
        let bytes = message.ok_or_else(|| CodecError::Decode("Empty method call".to_string()))?;
        let json = decode_json(bytes)?;
        if !json.is_object() {
            return Err(CodecError::Decode(format!("Invalid method call: {}", json)));
        }
        serde_json::from_value(json)
            .map_err(|e| CodecError::Decode(format!("Invalid method call: {}", e)))
    }

    fn encode_success_envelope(&self, result: &Value) -> Result<Bytes, CodecError> {
        encode_json(&[result])
    }

    fn encode_error_envelope(
        &self,
        code: &str,
        message: Option<&str>,
        details: Option<&Value>,
    ) -> Result<Bytes, CodecError> {
        encode_json(&(code, message, details))
    }

    fn decode_envelope(&self, envelope: &[u8]) -> Result<Envelope, CodecError> {
        let items = match decode_json(envelope)? {
            Value::Array(items) => items,
            other => return Err(CodecError::Decode(format!("Invalid envelope: {}", other))),
        };

        match items.len() {
            1 => Ok(Envelope::Success(items.into_iter().next().unwrap_or_default())),
            3 => {
                let mut parts = items.into_iter();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(Value::String(code)), Some(Value::String(message)), Some(details)) => {
                        Ok(Envelope::Error {
                            code,
                            message: Some(message),
                            details,
                        })
                    }
                    (Some(Value::String(code)), Some(Value::Null), Some(details)) => {
                        Ok(Envelope::Error {
                            code,
                            message: None,
                            details,
                        })
                    }
                    _ => Err(CodecError::Decode(
                        "Invalid error envelope: expected [code, message, details]".to_string(),
                    )),
                }
            }
            n => Err(CodecError::Decode(format!(
                "Invalid envelope: expected 1 or 3 elements, got {}",
                n
            ))),
        }
    }
}
