//! Host-side cache of NCP-reported parameters.
//!
//! Filled from `PROP_VALUE_IS` frames as they arrive and reset to the
//! configured defaults at the start of every init.

use bytes::Bytes;

use crate::config::PhyDefaults;
use crate::error::NcpError;
use crate::spinel::{Property, unpack_uint};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NcpProperties {
    /// `(major, minor)`.
    pub protocol_version: (u32, u32),
    pub ncp_version: String,
    pub interface_type: u32,
    pub hw_addr: Option<[u8; 8]>,
    pub cca_threshold: i8,
    pub tx_power: i8,
    pub region: u8,
    pub mode_id: u8,
    pub unicast_channels: Bytes,
    pub broadcast_channels: Bytes,
    pub async_channels: Bytes,
    /// Channel spacing in kHz.
    pub ch_spacing: u16,
    /// Channel 0 center frequency as `(MHz, kHz)`.
    pub ch0_center_freq: (u16, u16),
    pub pan_id: u16,
    pub uc_dwell_interval: u8,
    pub bc_dwell_interval: u8,
    pub bc_interval: u32,
    pub uc_channel_function: u8,
    pub bc_channel_function: u8,
    pub mac_filter_list: Bytes,
    pub mac_filter_mode: u8,
    pub xpanid: Option<[u8; 8]>,
    pub if_up: bool,
    pub stack_up: bool,
    pub role: u8,
    pub network_name: String,
    pub connected_devices: Bytes,
    pub num_connected_devices: u16,
}

impl NcpProperties {
    pub fn with_defaults(defaults: &PhyDefaults) -> Self {
        Self {
            region: defaults.region,
            cca_threshold: defaults.cca_threshold,
            tx_power: defaults.tx_power,
            bc_interval: defaults.bc_interval,
            uc_channel_function: defaults.uc_channel_function,
            bc_channel_function: defaults.bc_channel_function,
            uc_dwell_interval: defaults.uc_dwell_interval,
            bc_dwell_interval: defaults.bc_dwell_interval,
            ..Self::default()
        }
    }

    /// Forget everything the NCP reported.
    pub fn reset(&mut self, defaults: &PhyDefaults) {
        *self = Self::with_defaults(defaults);
    }

    /// Store a reported value. Properties without a cache slot are ignored.
    pub fn apply(&mut self, property: Property, value: &[u8]) -> Result<(), NcpError> {
        match property {
            Property::ProtocolVersion => {
                let (major, used) = unpack_uint(value)?;
                let (minor, _) = unpack_uint(&value[used..])?;
                self.protocol_version = (major, minor);
            }
            Property::NcpVersion => self.ncp_version = read_string(value),
            Property::InterfaceType => self.interface_type = unpack_uint(value)?.0,
            Property::HwAddr => self.hw_addr = Some(read_eui64(value, "hwaddr")?),
            Property::PhyCcaThreshold => self.cca_threshold = read_u8(value, "cca threshold")? as i8,
            Property::PhyTxPower => self.tx_power = read_u8(value, "tx power")? as i8,
            Property::PhyRegion => self.region = read_u8(value, "region")?,
            Property::PhyModeId => self.mode_id = read_u8(value, "mode id")?,
            Property::PhyUnicastChannelList => self.unicast_channels = Bytes::copy_from_slice(value),
            Property::PhyBroadcastChannelList => {
                self.broadcast_channels = Bytes::copy_from_slice(value)
            }
            Property::PhyAsyncChannelList => self.async_channels = Bytes::copy_from_slice(value),
            Property::PhyChSpacing => self.ch_spacing = read_u16(value, "channel spacing")?,
            Property::PhyCh0CenterFreq => {
                let mhz = read_u16(value, "center frequency")?;
                let khz = read_u16(value.get(2..).unwrap_or_default(), "center frequency")?;
                self.ch0_center_freq = (mhz, khz);
            }
            Property::Mac154Panid => self.pan_id = read_u16(value, "panid")?,
            Property::MacUcDwellInterval => self.uc_dwell_interval = read_u8(value, "uc dwell")?,
            Property::MacBcDwellInterval => self.bc_dwell_interval = read_u8(value, "bc dwell")?,
            Property::MacBcInterval => self.bc_interval = read_u32(value, "bc interval")?,
            Property::MacUcChannelFunction => {
                self.uc_channel_function = read_u8(value, "uc channel function")?
            }
            Property::MacBcChannelFunction => {
                self.bc_channel_function = read_u8(value, "bc channel function")?
            }
            Property::MacFilterList => self.mac_filter_list = Bytes::copy_from_slice(value),
            Property::MacFilterMode => self.mac_filter_mode = read_u8(value, "filter mode")?,
            Property::NetXpanid => self.xpanid = Some(read_eui64(value, "xpanid")?),
            Property::NetIfUp => self.if_up = read_u8(value, "if up")? != 0,
            Property::NetStackUp => self.stack_up = read_u8(value, "stack up")? != 0,
            Property::NetRole => self.role = read_u8(value, "role")?,
            Property::NetNetworkName => self.network_name = read_string(value),
            Property::NetConnectedDevices => {
                self.connected_devices = Bytes::copy_from_slice(value)
            }
            Property::NetNumConnectedDevices => {
                self.num_connected_devices = read_u16(value, "connected devices")?
            }
            _ => {}
        }
        Ok(())
    }
}

// ── Value readers ────────────────────────────────────────────────

fn read_u8(value: &[u8], what: &'static str) -> Result<u8, NcpError> {
    value.first().copied().ok_or(NcpError::Truncated(what))
}

fn read_u16(value: &[u8], what: &'static str) -> Result<u16, NcpError> {
    match value {
        [a, b, ..] => Ok(u16::from_le_bytes([*a, *b])),
        _ => Err(NcpError::Truncated(what)),
    }
}

fn read_u32(value: &[u8], what: &'static str) -> Result<u32, NcpError> {
    match value {
        [a, b, c, d, ..] => Ok(u32::from_le_bytes([*a, *b, *c, *d])),
        _ => Err(NcpError::Truncated(what)),
    }
}

fn read_eui64(value: &[u8], what: &'static str) -> Result<[u8; 8], NcpError> {
    value
        .get(..8)
        .and_then(|s| s.try_into().ok())
        .ok_or(NcpError::Truncated(what))
}

/// UTF-8 up to the first NUL.
fn read_string(value: &[u8]) -> String {
    let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
    String::from_utf8_lossy(&value[..end]).into_owned()
}
