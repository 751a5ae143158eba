//! Property keys and capability identifiers.
//!
//! Standard Spinel keys keep their protocol values. The Wi-SUN radio
//! parameters are vendor properties and live in the vendor range
//! starting at `0x3C00`.

use std::collections::HashSet;
use std::fmt;

use crate::error::NcpError;
use crate::spinel::frame::unpack_uint;

const VENDOR_BASE: u32 = 0x3C00;

// ── Property ─────────────────────────────────────────────────────

/// Properties the control core reads, writes, or restores.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    // ── Core (0x00xx) ────────────────────────────────────────────
    LastStatus = 0x00,
    ProtocolVersion = 0x01,
    NcpVersion = 0x02,
    InterfaceType = 0x03,
    VendorId = 0x04,
    Caps = 0x05,
    HwAddr = 0x08,

    // ── PHY (0x2x) ───────────────────────────────────────────────
    PhyCcaThreshold = 0x24,
    PhyTxPower = 0x25,

    // ── MAC (0x3x) ───────────────────────────────────────────────
    Mac154Panid = 0x36,
    MacRawStreamEnabled = 0x37,

    // ── NET (0x4x) ───────────────────────────────────────────────
    NetIfUp = 0x41,
    NetStackUp = 0x42,
    NetRole = 0x43,
    NetNetworkName = 0x44,
    NetXpanid = 0x45,
    NetNetworkKey = 0x46,

    // ── Extended core (0x10xx) ───────────────────────────────────
    McuPowerState = 0x1000,

    // ── Wi-SUN vendor (0x3Cxx) ───────────────────────────────────
    PhyRegion = VENDOR_BASE,
    PhyModeId = VENDOR_BASE + 1,
    PhyUnicastChannelList = VENDOR_BASE + 2,
    PhyBroadcastChannelList = VENDOR_BASE + 3,
    PhyAsyncChannelList = VENDOR_BASE + 4,
    PhyChSpacing = VENDOR_BASE + 5,
    PhyCh0CenterFreq = VENDOR_BASE + 6,
    MacUcDwellInterval = VENDOR_BASE + 7,
    MacBcDwellInterval = VENDOR_BASE + 8,
    MacBcInterval = VENDOR_BASE + 9,
    MacUcChannelFunction = VENDOR_BASE + 10,
    MacBcChannelFunction = VENDOR_BASE + 11,
    MacFilterList = VENDOR_BASE + 12,
    MacFilterMode = VENDOR_BASE + 13,
    NetConnectedDevices = VENDOR_BASE + 14,
    NetNumConnectedDevices = VENDOR_BASE + 15,
}

impl Property {
    /// The numeric property key.
    pub fn key(self) -> u32 {
        self as u32
    }

    /// Whether a successful set of this property is remembered for
    /// replay after a reset, and the capability the replay requires.
    ///
    /// Returns `None` for properties that are never replayed.
    pub fn restore_capability(self) -> Option<Option<Capability>> {
        match self {
            Property::PhyCcaThreshold
            | Property::PhyTxPower
            | Property::PhyRegion
            | Property::PhyModeId
            | Property::PhyUnicastChannelList
            | Property::PhyBroadcastChannelList
            | Property::PhyAsyncChannelList
            | Property::PhyChSpacing
            | Property::PhyCh0CenterFreq
            | Property::Mac154Panid
            | Property::MacUcDwellInterval
            | Property::MacBcDwellInterval
            | Property::MacBcInterval
            | Property::MacUcChannelFunction
            | Property::MacBcChannelFunction
            | Property::NetNetworkName
            | Property::NetXpanid => Some(None),
            Property::MacFilterList | Property::MacFilterMode => {
                Some(Some(Capability::MAC_ALLOWLIST))
            }
            _ => None,
        }
    }
}

impl TryFrom<u32> for Property {
    type Error = NcpError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        use Property::*;
        const ALL: &[Property] = &[
            LastStatus,
            ProtocolVersion,
            NcpVersion,
            InterfaceType,
            VendorId,
            Caps,
            HwAddr,
            PhyCcaThreshold,
            PhyTxPower,
            Mac154Panid,
            MacRawStreamEnabled,
            NetIfUp,
            NetStackUp,
            NetRole,
            NetNetworkName,
            NetXpanid,
            NetNetworkKey,
            McuPowerState,
            PhyRegion,
            PhyModeId,
            PhyUnicastChannelList,
            PhyBroadcastChannelList,
            PhyAsyncChannelList,
            PhyChSpacing,
            PhyCh0CenterFreq,
            MacUcDwellInterval,
            MacBcDwellInterval,
            MacBcInterval,
            MacUcChannelFunction,
            MacBcChannelFunction,
            MacFilterList,
            MacFilterMode,
            NetConnectedDevices,
            NetNumConnectedDevices,
        ];
        ALL.iter()
            .copied()
            .find(|p| p.key() == value)
            .ok_or(NcpError::UnknownVariant {
                type_name: "Property",
                value: value as u64,
            })
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Property::LastStatus => "LAST_STATUS",
            Property::ProtocolVersion => "PROTOCOL_VERSION",
            Property::NcpVersion => "NCP_VERSION",
            Property::InterfaceType => "INTERFACE_TYPE",
            Property::VendorId => "VENDOR_ID",
            Property::Caps => "CAPS",
            Property::HwAddr => "HWADDR",
            Property::PhyCcaThreshold => "PHY_CCA_THRESHOLD",
            Property::PhyTxPower => "PHY_TX_POWER",
            Property::Mac154Panid => "MAC_15_4_PANID",
            Property::MacRawStreamEnabled => "MAC_RAW_STREAM_ENABLED",
            Property::NetIfUp => "NET_IF_UP",
            Property::NetStackUp => "NET_STACK_UP",
            Property::NetRole => "NET_ROLE",
            Property::NetNetworkName => "NET_NETWORK_NAME",
            Property::NetXpanid => "NET_XPANID",
            Property::NetNetworkKey => "NET_NETWORK_KEY",
            Property::McuPowerState => "MCU_POWER_STATE",
            Property::PhyRegion => "PHY_REGION",
            Property::PhyModeId => "PHY_MODE_ID",
            Property::PhyUnicastChannelList => "PHY_UNICAST_CHANNEL_LIST",
            Property::PhyBroadcastChannelList => "PHY_BROADCAST_CHANNEL_LIST",
            Property::PhyAsyncChannelList => "PHY_ASYNC_CHANNEL_LIST",
            Property::PhyChSpacing => "PHY_CH_SPACING",
            Property::PhyCh0CenterFreq => "PHY_CH0_CENTER_FREQ",
            Property::MacUcDwellInterval => "MAC_UC_DWELL_INTERVAL",
            Property::MacBcDwellInterval => "MAC_BC_DWELL_INTERVAL",
            Property::MacBcInterval => "MAC_BC_INTERVAL",
            Property::MacUcChannelFunction => "MAC_UC_CHANNEL_FUNCTION",
            Property::MacBcChannelFunction => "MAC_BC_CHANNEL_FUNCTION",
            Property::MacFilterList => "MAC_FILTER_LIST",
            Property::MacFilterMode => "MAC_FILTER_MODE",
            Property::NetConnectedDevices => "NET_CONNECTED_DEVICES",
            Property::NetNumConnectedDevices => "NET_NUM_CONNECTED_DEVICES",
        };
        f.write_str(name)
    }
}

// ── Capability ───────────────────────────────────────────────────

/// An NCP-advertised feature flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability(pub u32);

impl Capability {
    pub const LOCK: Self = Self(1);
    pub const NET_SAVE: Self = Self(2);
    pub const HBO: Self = Self(3);
    pub const POWER_SAVE: Self = Self(4);
    pub const COUNTERS: Self = Self(5);
    pub const WRITABLE_RAW_STREAM: Self = Self(8);
    pub const MCU_POWER_STATE: Self = Self(13);
    pub const MAC_ALLOWLIST: Self = Self(64);
    pub const MAC_RAW: Self = Self(65);
}

/// The set of capabilities the NCP currently advertises.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    caps: HashSet<Capability>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the value of a `CAPS` property: a sequence of packed uints.
    pub fn from_packed(mut value: &[u8]) -> Result<Self, NcpError> {
        let mut caps = HashSet::new();
        while !value.is_empty() {
            let (cap, used) = unpack_uint(value)?;
            caps.insert(Capability(cap));
            value = &value[used..];
        }
        Ok(Self { caps })
    }

    pub fn insert(&mut self, cap: Capability) {
        self.caps.insert(cap);
    }

    pub fn contains(&self, cap: Capability) -> bool {
        self.caps.contains(&cap)
    }

    /// `true` when `required` is absent or advertised.
    pub fn satisfies(&self, required: Option<Capability>) -> bool {
        required.is_none_or(|cap| self.contains(cap))
    }

    pub fn len(&self) -> usize {
        self.caps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            caps: iter.into_iter().collect(),
        }
    }
}
