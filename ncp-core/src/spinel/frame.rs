//! Spinel frame layout: header byte, packed command id, packed property
//! key, and the remaining value bytes.
//!
//! ```text
//!  ┌────────┬──────────────┬───────────────┬──────────────┐
//!  │ header │ command (pu) │ property (pu) │ value (rest) │
//!  └────────┴──────────────┴───────────────┴──────────────┘
//!  header = 1 0 i i t t t t   (flag, interface id, transaction id)
//! ```

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::NcpError;
use crate::spinel::property::Property;
use crate::spinel::status::SpinelStatus;

// ── Constants ────────────────────────────────────────────────────

/// Largest Spinel frame the NCP accepts.
pub const MAX_FRAME_SIZE: usize = 1300;

const HEADER_FLAG: u8 = 0x80;
const HEADER_FLAG_MASK: u8 = 0xC0;

// ── Packed unsigned integers ─────────────────────────────────────

/// Append `value` as a Spinel packed unsigned integer.
pub fn pack_uint(mut value: u32, dst: &mut BytesMut) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            dst.put_u8(byte);
            return;
        }
        dst.put_u8(byte | 0x80);
    }
}

/// Number of bytes `pack_uint` emits for `value`.
pub fn packed_uint_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Decode a packed unsigned integer, returning the value and the number
/// of bytes consumed.
pub fn unpack_uint(src: &[u8]) -> Result<(u32, usize), NcpError> {
    let mut value: u32 = 0;
    for (i, &byte) in src.iter().take(5).enumerate() {
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(NcpError::Truncated("packed uint"))
}

// ── Header ───────────────────────────────────────────────────────

/// The first byte of every Spinel frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header(u8);

impl Header {
    /// Header for unsolicited NCP notifications (TID 0).
    pub const UNSOLICITED: Self = Self(HEADER_FLAG);

    pub fn new(iid: u8, tid: u8) -> Self {
        Self(HEADER_FLAG | ((iid & 0x03) << 4) | (tid & 0x0F))
    }

    pub fn from_byte(byte: u8) -> Result<Self, NcpError> {
        if byte & HEADER_FLAG_MASK != HEADER_FLAG {
            return Err(NcpError::InvalidHeader(byte));
        }
        Ok(Self(byte))
    }

    pub fn tid(self) -> u8 {
        self.0 & 0x0F
    }

    pub fn iid(self) -> u8 {
        (self.0 >> 4) & 0x03
    }

    pub fn as_byte(self) -> u8 {
        self.0
    }
}

// ── CommandId ────────────────────────────────────────────────────

/// Spinel command identifiers.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    Noop = 0,
    Reset = 1,
    PropValueGet = 2,
    PropValueSet = 3,
    PropValueInsert = 4,
    PropValueRemove = 5,
    PropValueIs = 6,
    PropValueInserted = 7,
    PropValueRemoved = 8,
}

impl CommandId {
    /// Whether frames with this command carry a property key.
    pub fn has_property(self) -> bool {
        !matches!(self, CommandId::Noop | CommandId::Reset)
    }
}

impl TryFrom<u32> for CommandId {
    type Error = NcpError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CommandId::Noop),
            1 => Ok(CommandId::Reset),
            2 => Ok(CommandId::PropValueGet),
            3 => Ok(CommandId::PropValueSet),
            4 => Ok(CommandId::PropValueInsert),
            5 => Ok(CommandId::PropValueRemove),
            6 => Ok(CommandId::PropValueIs),
            7 => Ok(CommandId::PropValueInserted),
            8 => Ok(CommandId::PropValueRemoved),
            _ => Err(NcpError::UnknownVariant {
                type_name: "CommandId",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandId::Noop => "NOOP",
            CommandId::Reset => "RESET",
            CommandId::PropValueGet => "PROP_VALUE_GET",
            CommandId::PropValueSet => "PROP_VALUE_SET",
            CommandId::PropValueInsert => "PROP_VALUE_INSERT",
            CommandId::PropValueRemove => "PROP_VALUE_REMOVE",
            CommandId::PropValueIs => "PROP_VALUE_IS",
            CommandId::PropValueInserted => "PROP_VALUE_INSERTED",
            CommandId::PropValueRemoved => "PROP_VALUE_REMOVED",
        };
        f.write_str(name)
    }
}

// ── SpinelCommand ────────────────────────────────────────────────

/// A structured host → NCP command, before a header is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinelCommand {
    pub command: CommandId,
    pub property: Option<Property>,
    pub value: Bytes,
}

impl SpinelCommand {
    pub fn noop() -> Self {
        Self {
            command: CommandId::Noop,
            property: None,
            value: Bytes::new(),
        }
    }

    pub fn reset() -> Self {
        Self {
            command: CommandId::Reset,
            property: None,
            value: Bytes::new(),
        }
    }

    pub fn get(property: Property) -> Self {
        Self {
            command: CommandId::PropValueGet,
            property: Some(property),
            value: Bytes::new(),
        }
    }

    pub fn set(property: Property, value: impl Into<Bytes>) -> Self {
        Self {
            command: CommandId::PropValueSet,
            property: Some(property),
            value: value.into(),
        }
    }

    pub fn set_bool(property: Property, value: bool) -> Self {
        Self::set(property, vec![value as u8])
    }

    /// Set a property whose value is a packed unsigned integer.
    pub fn set_uint(property: Property, value: u32) -> Self {
        let mut buf = BytesMut::with_capacity(packed_uint_len(value));
        pack_uint(value, &mut buf);
        Self::set(property, buf.freeze())
    }

    /// Encoded size of the body (everything after the header byte).
    pub fn body_len(&self) -> usize {
        packed_uint_len(self.command as u32)
            + self.property.map_or(0, |p| packed_uint_len(p.key()))
            + self.value.len()
    }

    /// Encode the body: command id, property key, value.
    pub fn encode_body(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.body_len());
        pack_uint(self.command as u32, &mut buf);
        if let Some(property) = self.property {
            pack_uint(property.key(), &mut buf);
        }
        buf.extend_from_slice(&self.value);
        buf.freeze()
    }
}

impl fmt::Display for SpinelCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.property {
            Some(p) => write!(f, "{} {p}", self.command),
            None => write!(f, "{}", self.command),
        }
    }
}

// ── SpinelFrame ──────────────────────────────────────────────────

/// A complete decoded Spinel frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinelFrame {
    pub header: Header,
    pub command: CommandId,
    /// Raw property key; unknown keys are kept so the frame can be logged.
    pub key: Option<u32>,
    pub value: Bytes,
}

impl SpinelFrame {
    /// Build a `PROP_VALUE_IS` frame.
    pub fn value_is(header: Header, property: Property, value: impl Into<Bytes>) -> Self {
        Self {
            header,
            command: CommandId::PropValueIs,
            key: Some(property.key()),
            value: value.into(),
        }
    }

    /// Build a `PROP_VALUE_IS LAST_STATUS` frame.
    pub fn last_status(header: Header, status: SpinelStatus) -> Self {
        let mut buf = BytesMut::with_capacity(5);
        pack_uint(status.0, &mut buf);
        Self::value_is(header, Property::LastStatus, buf.freeze())
    }

    /// The property this frame refers to, if it is a known one.
    pub fn property(&self) -> Option<Property> {
        self.key.and_then(|k| Property::try_from(k).ok())
    }

    /// The status carried by a `PROP_VALUE_IS LAST_STATUS` frame.
    pub fn status(&self) -> Option<SpinelStatus> {
        if self.command != CommandId::PropValueIs || self.key != Some(Property::LastStatus.key()) {
            return None;
        }
        unpack_uint(&self.value)
            .ok()
            .map(|(v, _)| SpinelStatus(v))
    }

    /// Whether this frame announces an NCP reset.
    pub fn is_reset_notification(&self) -> bool {
        self.status().is_some_and(SpinelStatus::is_reset)
    }

    /// Everything after the header byte.
    pub fn body(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(12 + self.value.len());
        pack_uint(self.command as u32, &mut buf);
        if let Some(key) = self.key {
            pack_uint(key, &mut buf);
        }
        buf.extend_from_slice(&self.value);
        buf.freeze()
    }

    pub fn encode(&self) -> Bytes {
        let body = self.body();
        let mut buf = BytesMut::with_capacity(1 + body.len());
        buf.put_u8(self.header.as_byte());
        buf.extend_from_slice(&body);
        buf.freeze()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NcpError> {
        let (&first, rest) = bytes
            .split_first()
            .ok_or(NcpError::Truncated("spinel header"))?;
        let header = Header::from_byte(first)?;

        let (command, used) = unpack_uint(rest)?;
        let command = CommandId::try_from(command)?;
        let mut rest = &rest[used..];

        let key = if command.has_property() {
            let (key, used) = unpack_uint(rest)?;
            rest = &rest[used..];
            Some(key)
        } else {
            None
        };

        Ok(Self {
            header,
            command,
            key,
            value: Bytes::copy_from_slice(rest),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(value: u32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        pack_uint(value, &mut buf);
        buf.to_vec()
    }

    #[test]
    fn packed_uint_known_encodings() {
        assert_eq!(packed(0), vec![0x00]);
        assert_eq!(packed(127), vec![0x7F]);
        assert_eq!(packed(128), vec![0x80, 0x01]);
        assert_eq!(packed(0x3C00), vec![0x80, 0x78]);
        assert_eq!(packed(u32::MAX).len(), 5);
    }

    #[test]
    fn packed_uint_len_matches_encoder() {
        for value in [0, 1, 127, 128, 16383, 16384, 0x1F_FFFF, 0x20_0000, u32::MAX] {
            assert_eq!(packed(value).len(), packed_uint_len(value), "value {value}");
        }
    }

    #[test]
    fn unpack_truncated_is_error() {
        assert!(matches!(unpack_uint(&[0x80]), Err(NcpError::Truncated(_))));
        assert!(matches!(unpack_uint(&[]), Err(NcpError::Truncated(_))));
    }

    #[test]
    fn header_fields() {
        let h = Header::new(0, 5);
        assert_eq!(h.as_byte(), 0x85);
        assert_eq!(h.tid(), 5);
        assert_eq!(h.iid(), 0);
        assert!(Header::from_byte(0x41).is_err());
    }

    #[test]
    fn get_command_body() {
        let body = SpinelCommand::get(Property::ProtocolVersion).encode_body();
        assert_eq!(&body[..], &[0x02, 0x01]);

        let body = SpinelCommand::reset().encode_body();
        assert_eq!(&body[..], &[0x01]);
    }

    #[test]
    fn body_len_matches_encoding() {
        let cmd = SpinelCommand::set(Property::PhyUnicastChannelList, vec![1u8; 40]);
        assert_eq!(cmd.body_len(), cmd.encode_body().len());
    }

    #[test]
    fn decode_value_is() {
        let frame = SpinelFrame::decode(&[0x81, 0x06, 0x42, 0x01]).unwrap();
        assert_eq!(frame.header.tid(), 1);
        assert_eq!(frame.command, CommandId::PropValueIs);
        assert_eq!(frame.property(), Some(Property::NetStackUp));
        assert_eq!(&frame.value[..], &[0x01]);
    }

    #[test]
    fn reset_notification_detected() {
        let frame = SpinelFrame::last_status(Header::UNSOLICITED, SpinelStatus::RESET_SOFTWARE);
        let decoded = SpinelFrame::decode(&frame.encode()).unwrap();
        assert!(decoded.is_reset_notification());
        assert_eq!(decoded.status(), Some(SpinelStatus::RESET_SOFTWARE));
    }

    #[test]
    fn decode_noop_has_no_key() {
        let frame = SpinelFrame::decode(&[0x82, 0x00]).unwrap();
        assert_eq!(frame.command, CommandId::Noop);
        assert!(frame.key.is_none());
        assert!(frame.status().is_none());
    }
}
