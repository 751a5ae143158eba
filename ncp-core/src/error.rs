//! Domain-specific error types for the NCP control core.
//!
//! All fallible operations return `Result<T, NcpError>`.
//! No panics on malformed frames or a misbehaving NCP; every error is
//! typed and handled by the control loop.

use std::time::Duration;
use thiserror::Error;

use crate::spinel::SpinelStatus;
use crate::state::NcpState;

/// The canonical error type for the NCP control core.
#[derive(Debug, Error)]
pub enum NcpError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A frame header byte did not carry the Spinel flag bits.
    #[error("invalid spinel header byte: {0:#04x}")]
    InvalidHeader(u8),

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A frame or value ended before all expected fields were read.
    #[error("truncated {0}")]
    Truncated(&'static str),

    /// The NCP answered with a non-zero `LAST_STATUS`.
    #[error("ncp returned status {0}")]
    ProtocolStatus(SpinelStatus),

    // ── Transport Errors ─────────────────────────────────────────
    /// An encoded command does not fit the outbound frame buffer.
    #[error("command too large: {size} bytes (max {max})")]
    BufferTooSmall { size: usize, max: usize },

    /// A frame is already pending flush; the buffer cannot be reused yet.
    #[error("outbound frame already pending")]
    TransportBusy,

    /// Frame size exceeded the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A bounded wait did not resolve before its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The link layer reported an error.
    #[error("link error: {0}")]
    Io(#[from] std::io::Error),

    /// A result channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    // ── State Errors ─────────────────────────────────────────────
    /// The NCP is in the terminal `Fault` state.
    #[error("ncp is in fault state")]
    Fault,

    // ── Task Errors ─────────────────────────────────────────────
    /// A queued task failed.
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── TaskError ─────────────────────────────────────────────────────

/// Typed result error delivered to the caller of a queued task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task was canceled before it completed (queue reset).
    #[error("task was canceled")]
    Canceled,

    /// The task's exchange did not complete within its deadline.
    #[error("task timed out after {0:?}")]
    Timeout(Duration),

    /// The NCP rejected the task's command.
    #[error("task failed with ncp status {0}")]
    Status(SpinelStatus),

    /// The NCP reset underneath the task.
    #[error("ncp reset")]
    NcpReset,

    /// The task cannot run in the current NCP state.
    #[error("task invalid in state {0}")]
    InvalidState(NcpState),

    /// Generic task failure with a human-readable message.
    #[error("task failed: {0}")]
    Failed(String),
}

impl From<NcpError> for TaskError {
    fn from(e: NcpError) -> Self {
        match e {
            NcpError::Timeout(d) => TaskError::Timeout(d),
            NcpError::ProtocolStatus(s) => TaskError::Status(s),
            NcpError::Task(t) => t,
            other => TaskError::Failed(other.to_string()),
        }
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for NcpError {
    fn from(s: String) -> Self {
        NcpError::Other(s)
    }
}

impl From<&str> for NcpError {
    fn from(s: &str) -> Self {
        NcpError::Other(s.to_string())
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for NcpError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        NcpError::ChannelClosed
    }
}
