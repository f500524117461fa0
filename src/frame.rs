//! Wire format of data and acknowledgement frames:
//!
//! ```ascii
//! 0: start marker (0xD4)
//! 1: frame size (u8) - number of bytes *after* this field, i.e. seq + payload + checksum
//! 2: sequence number (u8)
//! 3: payload (frame size - 2 bytes)
//! *: checksum (u8), see [crate::checksum]
//! ```
//!
//! An acknowledgement is a frame with a single payload byte holding the [AckKind].

use std::fmt::{Display, Formatter};
use anyhow::bail;
use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use crate::checksum;
use crate::seq_num::SeqNum;

pub const START_MARKER: u8 = 0xD4;

pub const SIZE_POS: usize = 1;
pub const SEQ_POS: usize = 2;

pub const HEADER_LEN: usize = 3;
pub const TRAILER_LEN: usize = 1;
pub const FRAME_OVERHEAD: usize = HEADER_LEN + TRAILER_LEN;

/// The frame size field is a single byte and covers sequence number and checksum as well
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - 2;

pub const ACK_FRAME_LEN: usize = FRAME_OVERHEAD + 1;

#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
pub enum AckKind {
    Negative = 0,
    Positive = 1,
}

/// Builds a complete frame. Frames are never patched after building: a retransmission sends
///  exactly the same bytes.
///
/// NB: The caller is responsible for limiting the payload to [MAX_PAYLOAD_LEN]
pub fn build_data_frame(payload: &[u8], seq: SeqNum) -> Bytes {
    assert!(payload.len() <= MAX_PAYLOAD_LEN, "this is a bug: payload length should have been checked");

    let frame_size = (payload.len() + 2) as u8;

    let mut buf = BytesMut::with_capacity(FRAME_OVERHEAD + payload.len());
    buf.put_u8(START_MARKER);
    buf.put_u8(frame_size);
    buf.put_u8(seq.to_wire());
    buf.put_slice(payload);
    buf.put_u8(checksum::compute(payload, frame_size, seq.to_wire()));
    buf.freeze()
}

pub fn build_ack_frame(kind: AckKind, seq: SeqNum) -> Bytes {
    build_data_frame(&[kind.into()], seq)
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParsedFrame {
    /// raw sequence number byte - it is the caller's decision how to handle values that are out
    ///  of range
    pub seq: u8,
    pub payload: Bytes,
}

/// Extracts sequence number and payload from a frame that passed the checksum test. Payload
///  bytes beyond `max_payload_len` are dropped.
pub fn parse_frame(raw: &[u8], max_payload_len: usize) -> anyhow::Result<ParsedFrame> {
    if raw.len() < FRAME_OVERHEAD {
        bail!("frame of {} bytes is shorter than header and trailer", raw.len());
    }

    let payload = &raw[HEADER_LEN..raw.len() - TRAILER_LEN];
    let payload = &payload[..payload.len().min(max_payload_len)];

    Ok(ParsedFrame {
        seq: raw[SEQ_POS],
        payload: Bytes::copy_from_slice(payload),
    })
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Ack {
    pub seq: u8,
    pub kind: AckKind,
}

pub fn parse_ack(raw: &[u8]) -> anyhow::Result<Ack> {
    let parsed = parse_frame(raw, usize::MAX)?;
    if parsed.payload.len() != 1 {
        bail!("expected a single-byte acknowledgement payload, got {} bytes", parsed.payload.len());
    }

    let kind = match AckKind::try_from(parsed.payload[0]) {
        Ok(kind) => kind,
        Err(_) => bail!("unknown acknowledgement type {}", parsed.payload[0]),
    };

    Ok(Ack {
        seq: parsed.seq,
        kind,
    })
}

/// Renders frame bytes for diagnostic logging: small frames completely, big frames only
///  their first and last eight bytes
pub struct FrameDump<'a>(pub &'a [u8]);

impl FrameDump<'_> {
    const FULL_DUMP_LIMIT: usize = 40;
    const GROUP: usize = 8;

    fn write_group(f: &mut Formatter<'_>, group: &[u8]) -> std::fmt::Result {
        for b in group {
            write!(f, "{:3} ", b)?;
        }
        write!(f, ": ")?;
        for &b in group {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl Display for FrameDump<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let bytes = self.0;
        if bytes.len() <= Self::FULL_DUMP_LIMIT {
            for (i, group) in bytes.chunks(Self::GROUP).enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                Self::write_group(f, group)?;
            }
            return Ok(());
        }

        Self::write_group(f, &bytes[..Self::GROUP])?;
        writeln!(f)?;
        writeln!(f, " - - -")?;
        Self::write_group(f, &bytes[bytes.len() - Self::GROUP..])
    }
}
