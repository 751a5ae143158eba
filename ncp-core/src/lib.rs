//! # ncp-core
//!
//! Host-side control core for a Spinel network co-processor.
//!
//! This crate contains:
//! - **Spinel**: headers, packed integers, commands, frames, properties, status codes
//! - **Codec**: `HdlcCodec`, the HDLC-lite link framing for `tokio_util`
//! - **Transport**: the single outbound frame slot and the `Exchange` helper
//! - **Settings**: the replay store re-applied after every reset
//! - **Task**: queued user operations (send command, deep sleep, wake)
//! - **Control**: `NcpInstance`, the init / disabled / associated / offline / resume state machine
//! - **Error**: `NcpError` and `TaskError`, typed `thiserror` errors

pub mod backoff;
pub mod codec;
pub mod config;
pub mod context;
pub mod control;
pub mod device;
pub mod error;
pub mod event;
pub mod flags;
pub mod properties;
pub mod settings;
pub mod spinel;
pub mod state;
pub mod task;
pub mod transport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use backoff::RunawayResetBackoff;
pub use codec::HdlcCodec;
pub use config::{NcpConfig, PhyDefaults, Timeouts};
pub use context::NcpContext;
pub use control::{ControlPhase, NcpInstance};
pub use device::{NcpDevice, UpgradeStatus};
pub use error::{NcpError, TaskError};
pub use event::NcpEvent;
pub use flags::NcpFlags;
pub use properties::NcpProperties;
pub use settings::{SettingEntry, SettingsStore};
pub use spinel::{
    Capabilities, Capability, CommandId, Header, MAX_FRAME_SIZE, Property, SpinelCommand,
    SpinelFrame, SpinelStatus,
};
pub use state::{DriverState, NcpState};
pub use task::{Task, TaskQueue, TaskResult, TaskStatus, await_task};
pub use transport::{CommandTransport, Exchange, Reply};
