//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. `#[serde(default)]` allows partial
//! JSON: missing fields get their default during deserialization.

mod client;
mod logging;

pub use client::*;
pub use logging::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the tether client.
///
/// Loaded from `~/.tether/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
///
/// # JSON Format
///
/// ```json
/// {
///   "client": { "url": "ws://chat.local:5555", "reconnectCooldownMs": 2000 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TetherSettings {
    /// Settings schema version.
    pub version: String,
    /// Connection and timing settings.
    pub client: ClientSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for TetherSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            client: ClientSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl TetherSettings {
    /// Reject values the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        let client = &self.client;
        if client.url.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "client.url must not be empty".into(),
            ));
        }
        if client.user_name.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "client.userName must not be empty".into(),
            ));
        }
        for (name, value) in [
            ("client.readTimeoutMs", client.read_timeout_ms),
            ("client.writeTimeoutMs", client.write_timeout_ms),
            ("client.pingTimeoutMs", client.ping_timeout_ms),
        ] {
            if value == 0 {
                return Err(SettingsError::InvalidValue(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if client.outbound_high_water_mark == Some(0) {
            return Err(SettingsError::InvalidValue(
                "client.outboundHighWaterMark must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
