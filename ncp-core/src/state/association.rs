//! Association and power state of the NCP as seen by the host.
//!
//! Exactly one value is current at any time. Only the control state
//! machine and the inbound property handler change it; tasks request
//! transitions through [`NcpContext::change_state`](crate::NcpContext::change_state).
//!
//! ```text
//!  Uninitialized ──► Offline ◄──► Commissioned
//!        │  ▲           │  ▲
//!        ▼  │           ▼  │
//!    Upgrading      Associating ──► Associated ◄──► Isolated
//!        │                                  │
//!        ▼                                  ▼
//!      Fault                         NetWakeAsleep ◄──► NetWakeWaking
//!
//!  any non-fault ──► DeepSleep ──► Offline
//! ```

use std::fmt;

// ── NcpState ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NcpState {
    /// Not initialized since the last reset.
    #[default]
    Uninitialized,

    /// A firmware image is being written to the NCP.
    Upgrading,

    /// Initialization gave up. Terminal until an external restart.
    Fault,

    /// The NCP is powered down at the host's request.
    DeepSleep,

    /// Network interface down, no stored credentials.
    Offline,

    /// Network interface down, credentials stored on the NCP.
    Commissioned,

    /// Joining a network.
    Associating,

    /// Join paused waiting for credentials.
    CredentialsNeeded,

    /// Attached to a network.
    Associated,

    /// Attached but no peers reachable.
    Isolated,

    /// Attached and sleeping between wake windows.
    NetWakeAsleep,

    /// Attached and waking for a wake window.
    NetWakeWaking,
}

impl NcpState {
    /// `Uninitialized` or `Upgrading`.
    pub fn is_initializing(self) -> bool {
        matches!(self, Self::Uninitialized | Self::Upgrading)
    }

    pub fn is_sleeping(self) -> bool {
        matches!(self, Self::DeepSleep | Self::NetWakeAsleep)
    }

    pub fn is_joining(self) -> bool {
        matches!(self, Self::Associating | Self::CredentialsNeeded)
    }

    pub fn is_joined(self) -> bool {
        matches!(
            self,
            Self::Associated | Self::Isolated | Self::NetWakeAsleep | Self::NetWakeWaking
        )
    }

    pub fn is_joining_or_joined(self) -> bool {
        self.is_joining() || self.is_joined()
    }

    /// Whether the host network interface should be up in this state.
    pub fn is_interface_up(self) -> bool {
        self.is_joining_or_joined()
    }
}

impl fmt::Display for NcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Upgrading => "uninitialized:upgrading",
            Self::Fault => "uninitialized:fault",
            Self::DeepSleep => "offline:deep-sleep",
            Self::Offline => "offline",
            Self::Commissioned => "offline:commissioned",
            Self::Associating => "associating",
            Self::CredentialsNeeded => "associating:credentials-needed",
            Self::Associated => "associated",
            Self::Isolated => "associated:no-parent",
            Self::NetWakeAsleep => "associated:netwake-asleep",
            Self::NetWakeWaking => "associated:netwake-waking",
        };
        f.write_str(name)
    }
}

// ── Tests ────────────────────────────────────────────────────────
