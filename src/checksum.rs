use crate::frame::{HEADER_LEN, TRAILER_LEN};

/// The checksum is the sum of all covered bytes modulo this value. Staying below 256 keeps the
///  result in a single byte.
pub const CHECKSUM_MODULUS: u32 = 250;

/// Result of checking a received frame against its trailing checksum byte
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameStatus {
    Good,
    Bad,
}

/// Computes the checksum for a frame with the given header fields and payload.
///
/// NB: This is a plain additive checksum. It detects any single-byte corruption, but a
///  combination of errors that preserves the sum modulo 250 goes unnoticed.
pub fn compute(payload: &[u8], frame_size: u8, seq: u8) -> u8 {
    let sum = payload.iter()
        .fold(frame_size as u32 + seq as u32, |acc, &b| acc + b as u32);
    (sum % CHECKSUM_MODULUS) as u8
}

/// Recomputes the checksum over everything between the start marker and the trailing checksum
///  byte, and compares it to that trailing byte.
pub fn verify(frame: &[u8]) -> FrameStatus {
    if frame.len() < HEADER_LEN + TRAILER_LEN {
        return FrameStatus::Bad;
    }

    let (covered, trailer) = frame[1..].split_at(frame.len() - 1 - TRAILER_LEN);
    let sum = covered.iter()
        .fold(0u32, |acc, &b| acc + b as u32);

    if (sum % CHECKSUM_MODULUS) as u8 == trailer[0] {
        FrameStatus::Good
    }
    else {
        FrameStatus::Bad
    }
}
