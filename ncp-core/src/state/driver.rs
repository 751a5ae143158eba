//! Driver lifecycle, tracked beside [`NcpState`](super::NcpState).
//!
//! Decides what an unsolicited reset notification means: while
//! `Initializing` it restarts init from scratch, while
//! `InitializingWaitingForReset` it is the reset being waited for.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverState {
    /// Init is talking to the NCP; a reset now is a failure.
    Initializing,

    /// Init is waiting for the NCP to announce a reset.
    #[default]
    InitializingWaitingForReset,

    /// Init completed.
    NormalOperation,
}

impl DriverState {
    pub fn is_initializing(self) -> bool {
        !matches!(self, Self::NormalOperation)
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "Initializing"),
            Self::InitializingWaitingForReset => write!(f, "InitializingWaitingForReset"),
            Self::NormalOperation => write!(f, "NormalOperation"),
        }
    }
}
