//! Hooks into the physical NCP: power, reset lines, firmware.

use tracing::warn;

/// State of a firmware upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpgradeStatus {
    #[default]
    Idle,
    InProgress,
    Complete,
    /// The upgrade failed with a device-specific code.
    Failed(i32),
}

/// Out-of-band control of the NCP hardware.
pub trait NcpDevice: Send {
    /// Drive the NCP power line.
    fn set_power(&mut self, on: bool);

    /// Pulse the hardware reset line.
    fn hard_reset(&mut self);

    fn upgrade_status(&self) -> UpgradeStatus {
        UpgradeStatus::Idle
    }

    /// Whether a firmware image is available to flash.
    fn can_upgrade_firmware(&self) -> bool {
        false
    }

    /// Start flashing the NCP. Progress is reported by `upgrade_status`.
    fn upgrade_firmware(&mut self) {
        warn!("firmware upgrade requested but not supported by this device");
    }
}
