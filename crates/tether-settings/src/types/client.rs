//! Connection endpoint and timing settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection endpoint, identity, and lifecycle timing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub url: String,
    /// Sender identity stamped on outgoing messages.
    pub user_name: String,
    /// Bound on each receive in milliseconds.
    pub read_timeout_ms: u64,
    /// Bound on each send in milliseconds.
    pub write_timeout_ms: u64,
    /// Bound on the liveness probe acknowledgement in milliseconds.
    pub ping_timeout_ms: u64,
    /// Delay between connection lifecycle attempts in milliseconds.
    pub reconnect_cooldown_ms: u64,
    /// Outbound queue depth that triggers a warning.
    ///
    /// `0` in the settings file (or `off` in the environment) disables it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_high_water_mark: Option<usize>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:5555".to_string(),
            user_name: "bob".to_string(),
            read_timeout_ms: 1000,
            write_timeout_ms: 1000,
            ping_timeout_ms: 1000,
            reconnect_cooldown_ms: 5000,
            outbound_high_water_mark: Some(10_000),
        }
    }
}

impl ClientSettings {
    /// Receive bound as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Send bound as a [`Duration`].
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Probe bound as a [`Duration`].
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    /// Reconnect cooldown as a [`Duration`].
    pub fn reconnect_cooldown(&self) -> Duration {
        Duration::from_millis(self.reconnect_cooldown_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_timings() {
        let s = ClientSettings::default();
        assert_eq!(s.read_timeout(), Duration::from_secs(1));
        assert_eq!(s.write_timeout(), Duration::from_secs(1));
        assert_eq!(s.ping_timeout(), Duration::from_secs(1));
        assert_eq!(s.reconnect_cooldown(), Duration::from_secs(5));
    }

    #[test]
    fn camel_case_keys() {
        let value = serde_json::to_value(ClientSettings::default()).unwrap();
        assert_eq!(value["readTimeoutMs"], 1000);
        assert_eq!(value["reconnectCooldownMs"], 5000);
        assert_eq!(value["userName"], "bob");
    }

    #[test]
    fn missing_high_water_mark_is_omitted() {
        let s = ClientSettings {
            outbound_high_water_mark: None,
            ..ClientSettings::default()
        };
        let value = serde_json::to_value(s).unwrap();
        assert!(value.get("outboundHighWaterMark").is_none());
    }
}
