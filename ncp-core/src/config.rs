//! Control-core configuration.
//!
//! Deserialized from the `[ncp]` table of the daemon's TOML file. Every
//! field has a default, so an empty table is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::spinel::MAX_FRAME_SIZE;

/// Top-level control-core configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NcpConfig {
    /// Wait for the outbound buffer to become free, and for a frame to be written.
    pub command_send_timeout_ms: u64,
    /// Wait for the reply to a command.
    pub command_response_timeout_ms: u64,
    /// Wait for a reset notification after asking for one.
    pub reset_response_timeout_ms: u64,
    /// Quiet period before a joined NCP is pinged.
    pub tickle_timeout_ms: u64,
    /// Quiet period before a sleeping NCP is reset as a watchdog.
    pub deep_sleep_tickle_timeout_ms: u64,
    /// Init retries allowed before the NCP is declared faulted.
    pub failure_threshold: u32,
    /// Capacity of the outbound frame buffer in bytes.
    pub outbound_buffer_size: usize,

    /// Start administratively enabled.
    pub enabled: bool,
    /// Credentials are known to be stored on the NCP.
    pub commissioned: bool,
    /// Bring the interface back up after every init.
    pub auto_resume: bool,
    /// Put the NCP to sleep while offline and idle.
    pub auto_deep_sleep: bool,
    /// Idle time before auto deep sleep.
    pub auto_deep_sleep_timeout_ms: u64,
    /// Reflash the NCP before giving up on it.
    pub auto_update_firmware: bool,

    /// Values the property cache starts from at every init.
    pub phy: PhyDefaults,
}

/// Radio parameters assumed until the NCP reports its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhyDefaults {
    pub region: u8,
    pub cca_threshold: i8,
    pub tx_power: i8,
    pub bc_interval: u32,
    pub uc_channel_function: u8,
    pub bc_channel_function: u8,
    pub uc_dwell_interval: u8,
    pub bc_dwell_interval: u8,
}

/// The configured timeouts as [`Duration`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub send: Duration,
    pub response: Duration,
    pub reset_response: Duration,
    pub tickle: Duration,
    pub deep_sleep_tickle: Duration,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NcpConfig {
    fn default() -> Self {
        Self {
            command_send_timeout_ms: 2_000,
            command_response_timeout_ms: 5_000,
            reset_response_timeout_ms: 10_000,
            tickle_timeout_ms: 60_000,
            deep_sleep_tickle_timeout_ms: 900_000,
            failure_threshold: 3,
            outbound_buffer_size: MAX_FRAME_SIZE,
            enabled: true,
            commissioned: false,
            auto_resume: false,
            auto_deep_sleep: false,
            auto_deep_sleep_timeout_ms: 10_000,
            auto_update_firmware: false,
            phy: PhyDefaults::default(),
        }
    }
}

impl Default for PhyDefaults {
    fn default() -> Self {
        Self {
            region: 1,
            cca_threshold: -60,
            tx_power: 20,
            bc_interval: 1020,
            uc_channel_function: 2,
            bc_channel_function: 2,
            uc_dwell_interval: 255,
            bc_dwell_interval: 255,
        }
    }
}

impl NcpConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            send: Duration::from_millis(self.command_send_timeout_ms),
            response: Duration::from_millis(self.command_response_timeout_ms),
            reset_response: Duration::from_millis(self.reset_response_timeout_ms),
            tickle: Duration::from_millis(self.tickle_timeout_ms),
            deep_sleep_tickle: Duration::from_millis(self.deep_sleep_tickle_timeout_ms),
        }
    }

    pub fn auto_deep_sleep_timeout(&self) -> Duration {
        Duration::from_millis(self.auto_deep_sleep_timeout_ms)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        NcpConfig::default().timeouts()
    }
}
