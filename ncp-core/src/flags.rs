//! Process-wide driver flags.

use bitflags::bitflags;

use crate::config::NcpConfig;

bitflags! {
    /// Long-lived switches read by every control sub-process.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NcpFlags: u16 {
        /// Administrative on/off.
        const ENABLED              = 0x0001;
        /// Network credentials are stored on the NCP.
        const COMMISSIONED         = 0x0002;
        /// Bring the interface back up after init.
        const AUTO_RESUME          = 0x0004;
        /// Put the NCP to sleep after a quiet period while offline.
        const AUTO_DEEP_SLEEP      = 0x0008;
        /// The driver asked for a reset and is waiting for it.
        const RESET_EXPECTED       = 0x0010;
        /// Raw frame capture was running before the last reset.
        const PCAP_IN_PROGRESS     = 0x0020;
        /// The extended PAN id was set by the user.
        const XPANID_EXPLICITLY_SET = 0x0040;
        /// Reflash the NCP as a last resort before giving up.
        const AUTO_UPDATE_FIRMWARE = 0x0080;
    }
}

impl NcpFlags {
    /// Initial flags from configuration.
    pub fn from_config(config: &NcpConfig) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::ENABLED, config.enabled);
        flags.set(Self::COMMISSIONED, config.commissioned);
        flags.set(Self::AUTO_RESUME, config.auto_resume);
        flags.set(Self::AUTO_DEEP_SLEEP, config.auto_deep_sleep);
        flags.set(Self::AUTO_UPDATE_FIRMWARE, config.auto_update_firmware);
        flags
    }

    /// Flags cleared when init completes.
    pub const INIT_TRANSIENT: Self = Self::PCAP_IN_PROGRESS
        .union(Self::RESET_EXPECTED)
        .union(Self::XPANID_EXPLICITLY_SET);
}
