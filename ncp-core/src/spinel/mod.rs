//! Spinel property protocol primitives.
//!
//! - **frame**: header byte, packed integers, commands, and whole frames
//! - **property**: property keys and capability identifiers
//! - **status**: `LAST_STATUS` codes, including the reset-reason range

pub mod frame;
pub mod property;
pub mod status;

pub use frame::{
    CommandId, Header, MAX_FRAME_SIZE, SpinelCommand, SpinelFrame, pack_uint, packed_uint_len,
    unpack_uint,
};
pub use property::{Capabilities, Capability, Property};
pub use status::SpinelStatus;
