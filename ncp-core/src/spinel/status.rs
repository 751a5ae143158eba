//! `LAST_STATUS` codes reported by the NCP.
//!
//! Status values are an open set: vendors extend them and reset reasons
//! occupy a reserved range, so the type is a newtype over `u32` with
//! named constants rather than a closed enum.

use std::fmt;

/// A Spinel status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SpinelStatus(pub u32);

impl SpinelStatus {
    pub const OK: Self = Self(0);
    pub const FAILURE: Self = Self(1);
    pub const UNIMPLEMENTED: Self = Self(2);
    pub const INVALID_ARGUMENT: Self = Self(3);
    pub const INVALID_STATE: Self = Self(4);
    pub const INVALID_COMMAND: Self = Self(5);
    pub const INVALID_INTERFACE: Self = Self(6);
    pub const INTERNAL_ERROR: Self = Self(7);
    pub const SECURITY_ERROR: Self = Self(8);
    pub const PARSE_ERROR: Self = Self(9);
    pub const IN_PROGRESS: Self = Self(10);
    pub const NOMEM: Self = Self(11);
    pub const BUSY: Self = Self(12);
    pub const PROP_NOT_FOUND: Self = Self(13);
    pub const DROPPED: Self = Self(14);
    pub const EMPTY: Self = Self(15);
    pub const CMD_TOO_BIG: Self = Self(16);
    pub const NO_ACK: Self = Self(17);
    pub const CCA_FAILURE: Self = Self(18);
    pub const ALREADY: Self = Self(19);
    pub const ITEM_NOT_FOUND: Self = Self(20);
    pub const INVALID_COMMAND_FOR_PROP: Self = Self(21);

    // Reset reasons (112..=128).
    pub const RESET_POWER_ON: Self = Self(112);
    pub const RESET_EXTERNAL: Self = Self(113);
    pub const RESET_SOFTWARE: Self = Self(114);
    pub const RESET_FAULT: Self = Self(115);
    pub const RESET_CRASH: Self = Self(116);
    pub const RESET_ASSERT: Self = Self(117);
    pub const RESET_OTHER: Self = Self(118);
    pub const RESET_UNKNOWN: Self = Self(119);
    pub const RESET_WATCHDOG: Self = Self(120);

    const RESET_BEGIN: u32 = 112;
    const RESET_END: u32 = 128;

    /// Returns `true` for the success status.
    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    /// Returns `true` when the status announces an NCP reset.
    pub fn is_reset(self) -> bool {
        (Self::RESET_BEGIN..=Self::RESET_END).contains(&self.0)
    }

    /// Short symbolic name, if the code is a known one.
    pub fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "OK",
            1 => "FAILURE",
            2 => "UNIMPLEMENTED",
            3 => "INVALID_ARGUMENT",
            4 => "INVALID_STATE",
            5 => "INVALID_COMMAND",
            6 => "INVALID_INTERFACE",
            7 => "INTERNAL_ERROR",
            8 => "SECURITY_ERROR",
            9 => "PARSE_ERROR",
            10 => "IN_PROGRESS",
            11 => "NOMEM",
            12 => "BUSY",
            13 => "PROP_NOT_FOUND",
            14 => "DROPPED",
            15 => "EMPTY",
            16 => "CMD_TOO_BIG",
            17 => "NO_ACK",
            18 => "CCA_FAILURE",
            19 => "ALREADY",
            20 => "ITEM_NOT_FOUND",
            21 => "INVALID_COMMAND_FOR_PROP",
            112 => "RESET_POWER_ON",
            113 => "RESET_EXTERNAL",
            114 => "RESET_SOFTWARE",
            115 => "RESET_FAULT",
            116 => "RESET_CRASH",
            117 => "RESET_ASSERT",
            118 => "RESET_OTHER",
            119 => "RESET_UNKNOWN",
            120 => "RESET_WATCHDOG",
            _ => return None,
        };
        Some(name)
    }
}

impl From<u32> for SpinelStatus {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for SpinelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({})", self.0),
            None => write!(f, "UNKNOWN ({})", self.0),
        }
    }
}
