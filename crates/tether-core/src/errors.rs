//! Codec error types.

use thiserror::Error;

/// Errors raised while converting messages to or from wire payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload could not be turned into a [`Message`](crate::Message).
    ///
    /// Covers invalid UTF-8, invalid JSON, and well-formed JSON of the wrong
    /// shape. No partial message is ever produced.
    #[error("malformed payload: {reason}")]
    MalformedPayload {
        /// Parser diagnostic.
        reason: String,
    },
    /// The message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

impl CodecError {
    /// Whether this error came from decoding an inbound payload.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedPayload { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display() {
        let err = CodecError::MalformedPayload {
            reason: "expected value at line 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed payload: expected value at line 1"
        );
        assert!(err.is_malformed());
    }

    #[test]
    fn encode_is_not_malformed() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let err = CodecError::Encode(json_err);
        assert!(!err.is_malformed());
        assert!(err.to_string().starts_with("failed to encode message"));
    }
}
