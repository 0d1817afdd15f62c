//! Message codec.
//!
//! Stateless conversion between [`Message`] and the bytes handed to the
//! transport. The wire form is a camelCase JSON object:
//!
//! ```json
//! {"sender": "bob", "text": "hi", "seq": 3, "timestamp": "2024-01-02T03:04:05Z"}
//! ```
//!
//! `seq` and `timestamp` are optional. Unknown fields are ignored on decode.

use serde_json::Value;

use crate::errors::CodecError;
use crate::message::Message;

/// Encode a message into a transport payload.
pub fn encode(message: &Message) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(message).map_err(CodecError::Encode)
}

/// Decode a transport payload into a message.
///
/// Fails with [`CodecError::MalformedPayload`] on any invalid input,
/// including well-formed JSON that is not an object.
pub fn decode(payload: &[u8]) -> Result<Message, CodecError> {
    let malformed = |e: serde_json::Error| CodecError::MalformedPayload {
        reason: e.to_string(),
    };
    let value: Value = serde_json::from_slice(payload).map_err(malformed)?;
    if !value.is_object() {
        return Err(CodecError::MalformedPayload {
            reason: format!("expected a JSON object, found {}", kind(&value)),
        });
    }
    serde_json::from_value(value).map_err(malformed)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
