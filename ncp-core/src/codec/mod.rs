//! HDLC-lite link framing for Spinel frames.
//!
//! ```text
//! 0x7E │ escaped(frame ‖ fcs_lo ‖ fcs_hi) │ 0x7E
//! ```
//!
//! Control bytes inside a frame are sent as `0x7D, byte ^ 0x20`. The
//! frame check sequence is CRC-16/X.25 over the unescaped frame.
//! Frames that fail the FCS or do not parse as Spinel are dropped with
//! a warning so one corrupted frame does not tear down the link. Input
//! that grows past any possible frame without a flag is discarded too.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{trace, warn};

use crate::error::NcpError;
use crate::spinel::{MAX_FRAME_SIZE, SpinelFrame};

const FLAG: u8 = 0x7E;
const ESCAPE: u8 = 0x7D;
const ESCAPE_XOR: u8 = 0x20;
const FCS_INIT: u16 = 0xFFFF;
const FCS_GOOD: u16 = 0xF0B8;
const FCS_POLY: u16 = 0x8408;

/// Upper bound for buffered, still-escaped input without a closing flag.
const MAX_ENCODED_SIZE: usize = 2 * (MAX_FRAME_SIZE + 2) + 2;

fn needs_escape(byte: u8) -> bool {
    matches!(byte, FLAG | ESCAPE | 0x11 | 0x13 | 0xF8)
}

fn fcs16(data: &[u8]) -> u16 {
    let mut fcs = FCS_INIT;
    for &byte in data {
        fcs ^= u16::from(byte);
        for _ in 0..8 {
            fcs = if fcs & 1 != 0 {
                (fcs >> 1) ^ FCS_POLY
            } else {
                fcs >> 1
            };
        }
    }
    fcs
}

fn put_escaped(byte: u8, dst: &mut BytesMut) {
    if needs_escape(byte) {
        dst.put_u8(ESCAPE);
        dst.put_u8(byte ^ ESCAPE_XOR);
    } else {
        dst.put_u8(byte);
    }
}

/// Frames Spinel traffic on a byte stream.
#[derive(Debug, Default)]
pub struct HdlcCodec {
    dropped: u64,
}

impl HdlcCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames discarded because of a bad FCS, unparsable content or an
    /// oversize unterminated run.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn unescape(raw: &[u8]) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(raw.len());
        let mut iter = raw.iter();
        while let Some(&byte) = iter.next() {
            if byte == ESCAPE {
                out.push(iter.next()? ^ ESCAPE_XOR);
            } else {
                out.push(byte);
            }
        }
        Some(out)
    }
}

impl tokio_util::codec::Decoder for HdlcCodec {
    type Item = SpinelFrame;
    type Error = NcpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(end) = src.iter().position(|&b| b == FLAG) else {
                if src.len() > MAX_ENCODED_SIZE {
                    self.dropped += 1;
                    warn!(len = src.len(), "discarding unterminated line noise");
                    src.clear();
                }
                return Ok(None);
            };

            let raw = src.split_to(end);
            src.advance(1);
            if raw.is_empty() {
                continue;
            }

            let Some(data) = Self::unescape(&raw) else {
                self.dropped += 1;
                warn!("dropping frame with dangling escape");
                continue;
            };
            if data.len() < 3 || fcs16(&data) != FCS_GOOD {
                self.dropped += 1;
                warn!(len = data.len(), "dropping frame with bad fcs");
                continue;
            }

            match SpinelFrame::decode(&data[..data.len() - 2]) {
                Ok(frame) => {
                    trace!(?frame, "rx");
                    return Ok(Some(frame));
                }
                Err(e) => {
                    self.dropped += 1;
                    warn!("dropping unparsable frame: {e}");
                }
            }
        }
    }
}

impl tokio_util::codec::Encoder<Bytes> for HdlcCodec {
    type Error = NcpError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > MAX_FRAME_SIZE {
            return Err(NcpError::FrameTooLarge {
                size: item.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        let fcs = !fcs16(&item);

        dst.reserve(2 * item.len() + 6);
        dst.put_u8(FLAG);
        for &byte in item.iter() {
            put_escaped(byte, dst);
        }
        for byte in fcs.to_le_bytes() {
            put_escaped(byte, dst);
        }
        dst.put_u8(FLAG);
        Ok(())
    }
}
