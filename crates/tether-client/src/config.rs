//! Client timing configuration.

use std::time::Duration;

/// Default bound on a single receive.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);
/// Default bound on a single send.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Default bound on the liveness probe acknowledgement.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(1);
/// Default delay between lifecycle attempts.
pub const DEFAULT_RECONNECT_COOLDOWN: Duration = Duration::from_secs(5);

/// Timing configuration for the connection lifecycle.
///
/// All four durations are independent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bound on each `recv`; expiry triggers a liveness probe.
    pub read_timeout: Duration,
    /// Bound on each `send`; expiry triggers a liveness probe.
    pub write_timeout: Duration,
    /// Bound on the probe acknowledgement.
    pub ping_timeout: Duration,
    /// Delay before the next lifecycle after a confirmed loss or a
    /// name-resolution failure.
    pub reconnect_cooldown: Duration,
    /// Outbound queue depth that triggers a warning (`None` disables it).
    pub outbound_high_water_mark: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            reconnect_cooldown: DEFAULT_RECONNECT_COOLDOWN,
            outbound_high_water_mark: None,
        }
    }
}
