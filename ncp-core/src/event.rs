//! Events delivered to the control state machine.

use crate::spinel::{SpinelFrame, SpinelStatus};

/// One input to [`NcpInstance::handle_event`](crate::NcpInstance::handle_event).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NcpEvent {
    /// Timer expiry, flush completion, or a host-side change.
    Tick,
    /// An inbound frame was processed.
    Frame(SpinelFrame),
    /// The NCP announced a reset.
    Reset(SpinelStatus),
}

impl NcpEvent {
    /// Classify an inbound frame.
    pub fn from_frame(frame: SpinelFrame) -> Self {
        match frame.status() {
            Some(status) if status.is_reset() => NcpEvent::Reset(status),
            _ => NcpEvent::Frame(frame),
        }
    }

    /// Whether the event originated from the NCP.
    pub fn is_from_ncp(&self) -> bool {
        !matches!(self, NcpEvent::Tick)
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, NcpEvent::Reset(_))
    }

    pub fn frame(&self) -> Option<&SpinelFrame> {
        match self {
            NcpEvent::Frame(frame) => Some(frame),
            _ => None,
        }
    }
}
