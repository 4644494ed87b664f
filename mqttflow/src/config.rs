use std::time::Duration;

use serde::Deserialize;

/// Engine tunables.
///
/// Deserializable from any serde source; every field has a default so a
/// host may configure only what it cares about.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Seconds to wait for an acknowledgement before a dup-flagged resend.
    pub wait_timeout_secs: u64,
    /// Largest inbound packet accepted by the framing codec, 0 = unlimited.
    pub max_packet_size: u32,
    /// Whether `+`/`#` are accepted in subscription filters.
    pub support_wildcards: bool,
    /// Whether an empty client id with clean-session set is assigned a
    /// generated identity instead of being refused.
    pub allow_anonymous: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: 10,
            max_packet_size: 1024 * 1024,
            support_wildcards: true,
            allow_anonymous: true,
        }
    }
}

impl FlowConfig {
    #[inline]
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}
