//! Device hooks for an NCP reached only through its socket.

use ncp_core::NcpDevice;
use tracing::{debug, warn};

/// No power or reset lines: recovery relies on the protocol reset.
#[derive(Debug, Default)]
pub struct SocketDevice;

impl NcpDevice for SocketDevice {
    fn set_power(&mut self, on: bool) {
        debug!(on, "no power control on socket link");
    }

    fn hard_reset(&mut self) {
        warn!("no reset line on socket link; waiting for the ncp to reset itself");
    }
}
