//! Chat message exchanged over the session.
//!
//! A [`Message`] is built once by its producer (console input or an inbound
//! frame decode) and never mutated afterwards. Ownership moves through the
//! queues: producer, queue, then exactly one consumer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat message.
///
/// Fields are private; use the accessors. The optional `seq` and
/// `timestamp` are logical metadata set by the producer and carried
/// verbatim over the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    sender: String,
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a message with no sequence number or timestamp.
    #[must_use]
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            seq: None,
            timestamp: None,
        }
    }

    /// Attach a producer-local sequence number.
    #[must_use]
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    /// Attach a timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Stamp the message with the current time.
    #[must_use]
    pub fn stamped_now(self) -> Self {
        self.with_timestamp(Utc::now())
    }

    /// Sender identity.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Message body.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Producer-local sequence number, if any.
    pub fn seq(&self) -> Option<u64> {
        self.seq
    }

    /// Timestamp, if any.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.sender, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn new_has_no_metadata() {
        let msg = Message::new("bob", "hi");
        assert_eq!(msg.sender(), "bob");
        assert_eq!(msg.text(), "hi");
        assert!(msg.seq().is_none());
        assert!(msg.timestamp().is_none());
    }

    #[test]
    fn builders_set_metadata() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let msg = Message::new("alice", "hello").with_seq(7).with_timestamp(ts);
        assert_eq!(msg.seq(), Some(7));
        assert_eq!(msg.timestamp(), Some(ts));
    }

    #[test]
    fn stamped_now_sets_timestamp() {
        let before = Utc::now();
        let msg = Message::new("bob", "hi").stamped_now();
        let ts = msg.timestamp().unwrap();
        assert!(ts >= before);
    }

    #[test]
    fn display_format() {
        let msg = Message::new("bob", "hi there");
        assert_eq!(msg.to_string(), "bob: hi there");
    }

    #[test]
    fn serializes_camel_case_and_omits_none() {
        let value = serde_json::to_value(Message::new("bob", "hi")).unwrap();
        assert_eq!(value, serde_json::json!({"sender": "bob", "text": "hi"}));
    }

    #[test]
    fn serializes_optional_fields_when_present() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let value =
            serde_json::to_value(Message::new("bob", "hi").with_seq(3).with_timestamp(ts)).unwrap();
        assert_eq!(value["seq"], 3);
        assert_eq!(value["timestamp"], "2024-01-02T03:04:05Z");
    }
}
